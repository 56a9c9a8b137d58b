//! Handle to interact with the UploadOrchestrator

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use super::EventLoggingError;
use crate::queue::StorageError;
use crate::types::{LogRecord, UploadStatus};

// ============================================================================
// Commands
// ============================================================================

/// Commands for UploadOrchestrator
#[derive(Debug)]
pub(crate) enum Command {
    /// Persist a log and resume uploading
    Enqueue {
        record: LogRecord,
        response_tx: oneshot::Sender<Result<(), StorageError>>,
    },
    Pause,
    Resume,
    Status {
        response_tx: oneshot::Sender<Result<UploadStatus, StorageError>>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to interact with a running UploadOrchestrator
#[derive(Clone, Debug)]
pub struct EventLoggingHandle {
    tx: mpsc::Sender<Command>,
}

impl EventLoggingHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Add a log file to the upload queue.
    ///
    /// Returns once the log is durably queued; the upload itself happens in
    /// the background. Fails with [`EventLoggingError::Storage`] if the file
    /// could not be persisted.
    pub async fn enqueue_log_for_upload(&self, record: LogRecord) -> Result<(), EventLoggingError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(Command::Enqueue {
            record,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| EventLoggingError::Closed)??;
        Ok(())
    }

    /// Stop starting new attempts. An attempt already running completes.
    pub async fn pause_automatic_upload(&self) -> Result<(), EventLoggingError> {
        self.send(Command::Pause).await
    }

    /// Clear the pause flag and attempt an upload.
    ///
    /// If a backoff from earlier failures is still active, the attempt waits
    /// until the delay elapses instead of starting immediately.
    pub async fn resume_automatic_upload(&self) -> Result<(), EventLoggingError> {
        self.send(Command::Resume).await
    }

    /// Snapshot of the orchestrator state.
    ///
    /// Fails with [`EventLoggingError::Storage`] if the queue directory
    /// cannot be read, rather than reporting an empty queue.
    pub async fn status(&self) -> Result<UploadStatus, EventLoggingError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(Command::Status { response_tx }).await?;
        Ok(response_rx.await.map_err(|_| EventLoggingError::Closed)??)
    }

    /// When uploads resume after failures; `None` if no backoff is active
    pub async fn uploads_paused_until(&self) -> Result<Option<DateTime<Utc>>, EventLoggingError> {
        Ok(self.status().await?.uploads_paused_until)
    }

    pub async fn is_paused(&self) -> Result<bool, EventLoggingError> {
        Ok(self.status().await?.is_paused())
    }

    async fn send(&self, command: Command) -> Result<(), EventLoggingError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EventLoggingError::Closed)
    }
}
