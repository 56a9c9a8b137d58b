use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use crypto_box::{PublicKey, KEY_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-level Config
// ============================================================================

/// Complete uploader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventLoggingConfig {
    /// Queue and scratch directories
    #[serde(default)]
    pub storage: StorageConfig,

    /// Public key used to seal every uploaded log
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Collection backend endpoint
    #[serde(default)]
    pub upload: UploadConfig,

    /// Retry delay bounds
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl EventLoggingConfig {
    /// Load configuration using the standard search order:
    /// 1. `$EVENT_LOGGING_CONFIG` environment variable
    /// 2. `./event_logging.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// The public key env override is applied last. The result is not
    /// validated; call [`validate`](Self::validate) before use.
    pub fn load() -> Self {
        let mut config = Self::load_from_search_path();
        config.apply_env_overrides();
        config
    }

    fn load_from_search_path() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_PATH_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded uploader config from EVENT_LOGGING_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from EVENT_LOGGING_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "EVENT_LOGGING_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded uploader config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No uploader config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are logged as warnings; parse errors are returned.
    /// Values are not range-checked here.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML document, warning about unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        toml::from_str(contents)
    }

    /// Replace the public key with `$EVENT_LOGGING_PUBLIC_KEY` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(defaults::PUBLIC_KEY_ENV) {
            if !key.trim().is_empty() {
                self.encryption.public_key = key;
            }
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the whole config, collecting every problem.
    ///
    /// Rules:
    /// - The public key decodes to a 32-byte X25519 key
    /// - `min_delay_secs <= max_delay_secs <= 7 days`
    /// - Upload URL, when set, is http(s)
    /// - Upload timeout is non-zero
    /// - Queue and scratch directories are set and distinct
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Key errors are reported on their own: they are the one fatal
        // condition callers are expected to match on.
        decode_public_key(&self.encryption.public_key)?;

        let mut errors: Vec<String> = Vec::new();

        let b = &self.backoff;
        if b.min_delay_secs > b.max_delay_secs {
            errors.push(format!(
                "backoff.min_delay_secs ({}) must be <= backoff.max_delay_secs ({})",
                b.min_delay_secs, b.max_delay_secs
            ));
        }
        if b.max_delay_secs > defaults::BACKOFF_MAX_DELAY_LIMIT_SECS {
            errors.push(format!(
                "backoff.max_delay_secs ({}) exceeds the limit of {} seconds",
                b.max_delay_secs,
                defaults::BACKOFF_MAX_DELAY_LIMIT_SECS
            ));
        }

        let u = &self.upload;
        if !u.url.is_empty() && !(u.url.starts_with("https://") || u.url.starts_with("http://")) {
            errors.push(format!("upload.url = {:?} must be an http(s) URL", u.url));
        }
        if u.timeout_secs == 0 {
            errors.push("upload.timeout_secs must be > 0".to_string());
        }

        let s = &self.storage;
        if s.queue_dir.as_os_str().is_empty() {
            errors.push("storage.queue_dir must not be empty".to_string());
        }
        if s.scratch_dir.as_os_str().is_empty() {
            errors.push("storage.scratch_dir must not be empty".to_string());
        }
        if s.queue_dir == s.scratch_dir {
            errors.push(format!(
                "storage.scratch_dir must differ from storage.queue_dir ({})",
                s.queue_dir.display()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Decode the configured public key.
    pub fn public_key(&self) -> Result<PublicKey, ConfigError> {
        decode_public_key(&self.encryption.public_key)
    }
}

/// Decode a base64 X25519 public key.
///
/// Any failure here is a configuration defect, never a transient error.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, ConfigError> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidPublicKey(
            "encryption.public_key is not set".to_string(),
        ));
    }

    let bytes = BASE64_STANDARD
        .decode(trimmed)
        .map_err(|e| ConfigError::InvalidPublicKey(format!("not valid base64: {e}")))?;

    let raw: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        ConfigError::InvalidPublicKey(format!(
            "expected {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })?;

    Ok(PublicKey::from(raw))
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid encryption key: {0}")]
    InvalidPublicKey(String),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// One artifact per pending log; presence here means "pending"
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
    /// Ciphertext artifacts, removed after each attempt
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            queue_dir: default_queue_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from(defaults::STORAGE_DIR)
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(defaults::SCRATCH_DIR)
}

/// `[encryption]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte X25519 public key
    #[serde(default)]
    pub public_key: String,
}

/// `[upload]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Endpoint receiving the sealed log body
    #[serde(default)]
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when set
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Initial value of the upload policy switch
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
            enabled: default_enabled(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    defaults::UPLOAD_HTTP_TIMEOUT_SECS
}

fn default_enabled() -> bool {
    true
}

/// `[backoff]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure; zero retries immediately
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl BackoffConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_min_delay_secs() -> u64 {
    defaults::BACKOFF_MIN_DELAY_SECS
}

fn default_max_delay_secs() -> u64 {
    defaults::BACKOFF_MAX_DELAY_SECS
}

// ============================================================================
// Tests
// ============================================================================
