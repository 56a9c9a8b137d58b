//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

use std::time::Duration;

// ============================================================================
// Storage
// ============================================================================

/// Directory holding one artifact per pending log.
pub const STORAGE_DIR: &str = "./data/log-upload-queue";

/// Directory for short-lived ciphertext artifacts.
pub const SCRATCH_DIR: &str = "./data/encrypted-logs";

/// File extension of queued plaintext artifacts.
pub const QUEUE_FILE_EXTENSION: &str = "log";

/// File extension of sealed ciphertext artifacts.
pub const ENCRYPTED_FILE_EXTENSION: &str = "enc";

// ============================================================================
// Backoff
// ============================================================================

/// Delay after the first failed upload (seconds).
pub const BACKOFF_MIN_DELAY_SECS: u64 = 2;

/// Upper bound on the retry delay (seconds). 3 600 = 1 hour.
pub const BACKOFF_MAX_DELAY_SECS: u64 = 3_600;

/// Largest accepted `max_delay_secs` (seconds). 604 800 = 7 days.
pub const BACKOFF_MAX_DELAY_LIMIT_SECS: u64 = 604_800;

/// Seed used for doubling when `min_delay` is zero and a second failure
/// occurs in a row.
pub const BACKOFF_GROWTH_SEED: Duration = Duration::from_secs(1);

/// Minimum wait before retrying a record whose encryption failed.
pub const ENCRYPTION_RETRY_FLOOR: Duration = Duration::from_secs(1);

// ============================================================================
// Upload Transport
// ============================================================================

/// HTTP client timeout for log uploads (seconds).
pub const UPLOAD_HTTP_TIMEOUT_SECS: u64 = 30;

/// Header carrying the record id on every upload.
pub const LOG_UUID_HEADER: &str = "log-uuid";

// ============================================================================
// Orchestrator
// ============================================================================

/// Command channel buffer between handles and the orchestrator actor.
pub const COMMAND_CHANNEL_SIZE: usize = 100;

// ============================================================================
// Environment
// ============================================================================

/// Path to a TOML config file.
pub const CONFIG_PATH_ENV: &str = "EVENT_LOGGING_CONFIG";

/// Base64 public key overriding `[encryption] public_key`.
pub const PUBLIC_KEY_ENV: &str = "EVENT_LOGGING_PUBLIC_KEY";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "event_logging.toml";
