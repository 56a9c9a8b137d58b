//! Shared data structures for the log upload pipeline
//!
//! - `LogRecord`: a plaintext log artifact waiting to be uploaded
//! - `EncryptedLogRecord`: the sealed ciphertext of a `LogRecord`, same id
//! - `UploaderState` / `UploadStatus`: orchestrator state reported to callers
//!
//! The record id is a UUID assigned once when the record is created and
//! carried unchanged through encryption, so the queue entry and the uploaded
//! blob can always be correlated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Log Records
// ============================================================================

/// A plaintext log artifact identified by a stable UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    id: Uuid,
    path: PathBuf,
}

impl LogRecord {
    /// Create a record for the file at `path` with a freshly generated id.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_id(Uuid::new_v4(), path)
    }

    /// Create a record with a known id (used when reloading from storage).
    pub fn with_id(id: Uuid, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Location of the plaintext artifact
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sealed ciphertext of a [`LogRecord`].
///
/// Only produced by [`crate::encryptor::LogEncryptor::encrypt`], which
/// consumes the plaintext record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedLogRecord {
    id: Uuid,
    path: PathBuf,
}

impl EncryptedLogRecord {
    pub(crate) fn new(id: Uuid, path: PathBuf) -> Self {
        Self { id, path }
    }

    /// Same id as the plaintext record this was sealed from
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Location of the ciphertext artifact
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Orchestrator State
// ============================================================================

/// Coarse state of the upload orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploaderState {
    /// No attempts will start until `resume` or `enqueue`
    Paused,
    /// Running, waiting for the next scheduled attempt
    Idle,
    /// One record is being encrypted or uploaded
    Processing,
}

impl std::fmt::Display for UploaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploaderState::Paused => write!(f, "paused"),
            UploaderState::Idle => write!(f, "idle"),
            UploaderState::Processing => write!(f, "processing"),
        }
    }
}

/// Point-in-time snapshot of the orchestrator, taken on its own context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub state: UploaderState,
    /// The paused flag; `true` while `state` is `Paused`, and may also be
    /// `true` during `Processing` when `pause` arrived mid-attempt
    pub paused: bool,
    /// Zero when no backoff is active
    pub current_delay: Duration,
    /// `None` when `current_delay` is zero
    pub uploads_paused_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Records currently present in the durable queue
    pub pending: usize,
}

impl UploadStatus {
    pub fn is_paused(&self) -> bool {
        self.state == UploaderState::Paused
    }
}

// ============================================================================
// Tests
// ============================================================================
