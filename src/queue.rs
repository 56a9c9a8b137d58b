//! Durable Upload Queue - disk-backed queue of pending log artifacts
//!
//! Each pending log is copied into the queue directory as
//! `<sequence>-<uuid>.log`. A file's presence is the only record that the log
//! is pending: there is no index or journal to get out of sync. The
//! zero-padded sequence number gives strict FIFO order regardless of how the
//! filesystem orders directory entries, and is recovered from the file names
//! when the queue is reopened after a restart.
//!
//! Writes go to a hidden temp file first and are renamed into place, so a
//! crash never leaves a half-written entry that looks pending.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::defaults::QUEUE_FILE_EXTENSION;
use crate::types::LogRecord;

/// Width of the sequence prefix; `u64::MAX` has 20 digits
const SEQUENCE_WIDTH: usize = 20;

/// Disk-backed queue of plaintext log artifacts
#[derive(Debug)]
pub struct DurableUploadQueue {
    /// Directory for queue files
    queue_dir: PathBuf,
    /// Sequence number of the newest entry
    last_sequence: u64,
}

/// A queue file name split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    sequence: u64,
    id: Uuid,
    path: PathBuf,
}

impl DurableUploadQueue {
    /// Create or open an upload queue at the given directory
    pub fn open<P: AsRef<Path>>(queue_dir: P) -> Result<Self, StorageError> {
        let queue_dir = queue_dir.as_ref().to_path_buf();
        fs::create_dir_all(&queue_dir).map_err(|source| StorageError::Io {
            path: queue_dir.clone(),
            source,
        })?;

        let mut queue = Self {
            queue_dir,
            last_sequence: 0,
        };

        let entries = queue.entries()?;
        queue.last_sequence = entries.last().map_or(0, |e| e.sequence);

        if entries.is_empty() {
            debug!(dir = %queue.queue_dir.display(), "Upload queue opened (empty)");
        } else {
            info!(
                dir = %queue.queue_dir.display(),
                pending = entries.len(),
                "Upload queue opened with pending logs"
            );
        }

        Ok(queue)
    }

    /// Persist a log artifact into the queue.
    ///
    /// The source file is copied, not moved. If a record with the same id is
    /// already queued this is a no-op.
    pub fn add(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        if let Some(existing) = self.find(record.id())? {
            debug!(id = %record.id(), path = %existing.path.display(), "Log already queued, skipping");
            return Ok(());
        }

        let sequence = self.last_sequence.saturating_add(1);
        let file_name = entry_file_name(sequence, record.id());
        let final_path = self.queue_dir.join(&file_name);
        let tmp_path = self.queue_dir.join(format!(".{file_name}.tmp"));

        let copied = fs::copy(record.path(), &tmp_path)
            .and_then(|bytes| fs::rename(&tmp_path, &final_path).map(|()| bytes));
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(source) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(StorageError::Io {
                    path: record.path().to_path_buf(),
                    source,
                });
            }
        };

        self.last_sequence = sequence;
        debug!(id = %record.id(), sequence, size_bytes = bytes, "Log queued for upload");
        Ok(())
    }

    /// The oldest pending record, or `None` when the queue is empty.
    pub fn first(&self) -> Result<Option<LogRecord>, StorageError> {
        Ok(self
            .entries()?
            .into_iter()
            .next()
            .map(|e| LogRecord::with_id(e.id, e.path)))
    }

    /// Delete the artifact for `id`.
    ///
    /// Returns [`StorageError::NotFound`] if it is already gone.
    pub fn remove(&self, id: Uuid) -> Result<(), StorageError> {
        let entry = self.find(id)?.ok_or(StorageError::NotFound(id))?;
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                debug!(id = %id, "Log removed from upload queue");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(id)),
            Err(source) => Err(StorageError::Io {
                path: entry.path,
                source,
            }),
        }
    }

    /// All pending records, oldest first
    pub fn pending(&self) -> Result<Vec<LogRecord>, StorageError> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|e| LogRecord::with_id(e.id, e.path))
            .collect())
    }

    /// Get the number of pending records
    pub fn pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.entries()?.len())
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    fn find(&self, id: Uuid) -> Result<Option<QueueEntry>, StorageError> {
        Ok(self.entries()?.into_iter().find(|e| e.id == id))
    }

    /// Scan the directory for queue files, sorted by sequence.
    fn entries(&self) -> Result<Vec<QueueEntry>, StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.queue_dir.clone(),
            source,
        };

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.queue_dir).map_err(io_err)? {
            let path = dir_entry.map_err(io_err)?.path();
            match parse_entry(&path) {
                Some((sequence, id)) => entries.push(QueueEntry { sequence, id, path }),
                None => {
                    let hidden = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with('.'));
                    if !hidden {
                        warn!(path = %path.display(), "Ignoring unrecognised file in upload queue");
                    }
                }
            }
        }

        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }
}

fn entry_file_name(sequence: u64, id: Uuid) -> String {
    format!(
        "{sequence:0width$}-{id}.{QUEUE_FILE_EXTENSION}",
        width = SEQUENCE_WIDTH
    )
}

/// Parse `<sequence>-<uuid>.log`
fn parse_entry(path: &Path) -> Option<(u64, Uuid)> {
    if path.extension().and_then(|e| e.to_str()) != Some(QUEUE_FILE_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (sequence, id) = stem.split_once('-')?;
    if sequence.len() != SEQUENCE_WIDTH {
        return None;
    }
    Some((sequence.parse().ok()?, Uuid::parse_str(id).ok()?))
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log {0} is not in the upload queue")]
    NotFound(Uuid),
}

impl StorageError {
    /// True for the "already removed" case callers may ignore
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
