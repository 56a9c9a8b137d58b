//! Log Encryptor - seals plaintext logs for upload
//!
//! Uses libsodium-compatible sealed boxes (ephemeral X25519 key +
//! XSalsa20-Poly1305): only the holder of the matching secret key can open
//! the result, and every call is independent. The ciphertext is written to a
//! scratch directory under the record's id and discarded once the upload
//! attempt is over; the queued plaintext is never touched.

use crypto_box::aead::OsRng;
use crypto_box::PublicKey;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::defaults::ENCRYPTED_FILE_EXTENSION;
use crate::config::{ConfigError, EncryptionConfig};
use crate::types::{EncryptedLogRecord, LogRecord};

/// Seals log records under a fixed public key
#[derive(Clone)]
pub struct LogEncryptor {
    public_key: PublicKey,
    scratch_dir: PathBuf,
}

impl std::fmt::Debug for LogEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEncryptor")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl LogEncryptor {
    pub fn new(public_key: PublicKey, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_key,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Build from config, rejecting a malformed key up front.
    pub fn from_config(
        encryption: &EncryptionConfig,
        scratch_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let public_key = crate::config::decode_public_key(&encryption.public_key)?;
        Ok(Self::new(public_key, scratch_dir))
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Seal `record` and return the ciphertext record with the same id.
    ///
    /// Consumes the plaintext record; its artifact stays in the queue.
    pub fn encrypt(&self, record: LogRecord) -> Result<EncryptedLogRecord, EncryptionError> {
        let plaintext = fs::read(record.path()).map_err(|source| EncryptionError::Read {
            path: record.path().to_path_buf(),
            source,
        })?;

        let sealed = self
            .public_key
            .seal(&mut OsRng, &plaintext)
            .map_err(|_| EncryptionError::Seal(record.id().to_string()))?;

        let write_err = |path: &Path, source| EncryptionError::Write {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.scratch_dir).map_err(|e| write_err(&self.scratch_dir, e))?;

        let path = self
            .scratch_dir
            .join(format!("{}.{ENCRYPTED_FILE_EXTENSION}", record.id()));
        let tmp_path = path.with_extension(format!("{ENCRYPTED_FILE_EXTENSION}.tmp"));
        if let Err(e) = fs::write(&tmp_path, &sealed).and_then(|()| fs::rename(&tmp_path, &path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(&path, e));
        }

        debug!(
            id = %record.id(),
            plaintext_bytes = plaintext.len(),
            sealed_bytes = sealed.len(),
            "Log encrypted"
        );
        Ok(EncryptedLogRecord::new(record.id(), path))
    }

    /// Delete a ciphertext artifact produced by [`encrypt`](Self::encrypt).
    pub fn discard(&self, record: &EncryptedLogRecord) {
        match fs::remove_file(record.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(id = %record.id(), path = %record.path().display(), error = %e, "Failed to discard encrypted log");
            }
        }
    }
}

/// Encryption errors. All are per-record and retryable.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("failed to read log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write encrypted log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to seal log {0}")]
    Seal(String),
}
