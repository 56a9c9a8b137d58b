//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! The raw TOML is parsed into `toml::Value` first, its key tree is compared
//! against the known field names, and every unknown key yields a warning with
//! a "did you mean?" suggestion. Serde deserialization runs afterwards and
//! ignores unknown keys, so warnings never break an existing config.

use std::collections::HashSet;

/// A non-fatal config warning (typo, misplaced key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " - did you mean '{s}'?")?;
        }
        Ok(())
    }
}

/// Returns the complete set of valid dotted key paths for `EventLoggingConfig`.
///
/// Any new field added to the config structs must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [storage]
        "storage",
        "storage.queue_dir",
        "storage.scratch_dir",
        // [encryption]
        "encryption",
        "encryption.public_key",
        // [upload]
        "upload",
        "upload.url",
        "upload.auth_token",
        "upload.timeout_secs",
        "upload.enabled",
        // [backoff]
        "backoff",
        "backoff.min_delay_secs",
        "backoff.max_delay_secs",
    ];
    keys.iter().copied().collect()
}

/// Every dotted key path in a parsed TOML document, tables included.
///
/// `[upload]\nurl = ".."` yields `upload` and `upload.url`. Values inside
/// arrays are not descended into; the config has no array-of-table keys.
pub fn dotted_keys(document: &toml::Value) -> Vec<String> {
    let mut keys = Vec::new();
    let Some(root) = document.as_table() else {
        return keys;
    };

    let mut pending: Vec<(String, &toml::Table)> = vec![(String::new(), root)];
    while let Some((section, table)) = pending.pop() {
        for (name, value) in table {
            let key = if section.is_empty() {
                name.clone()
            } else {
                format!("{section}.{name}")
            };
            if let Some(child) = value.as_table() {
                pending.push((key.clone(), child));
            }
            keys.push(key);
        }
    }
    keys
}

/// Edit distance (insert, delete, substitute) counted in chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();
    // row[j] = distance between the prefix of `a` seen so far and target[..j]
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in target.iter().enumerate() {
            let above = row[j + 1];
            let substitute = diagonal + usize::from(ca != cb);
            row[j + 1] = substitute.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }

    row[target.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties go to the lexicographically smaller key so the output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // reported by the serde pass
    };

    let known = known_config_keys();
    dotted_keys(&value)
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
