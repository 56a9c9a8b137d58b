//! Error sink and lifecycle observer hooks
//!
//! Encryption failures go to an [`ErrorSink`] (by default the tracing log).
//! [`UploadObserver`] receives upload lifecycle events; every method has a
//! no-op default, and `()` implements it for callers that don't care.

use uuid::Uuid;

use crate::encryptor::EncryptionError;
use crate::transport::TransportError;

/// Process-wide diagnostic sink for errors that do not reach a caller
pub trait ErrorSink: Send + Sync {
    fn report(&self, id: Uuid, error: &EncryptionError);
}

/// Reports through `tracing::error!`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, id: Uuid, error: &EncryptionError) {
        tracing::error!(id = %id, error = %error, "Failed to encrypt log for upload");
    }
}

/// Upload lifecycle callbacks, invoked on the orchestrator's context.
///
/// Implementations must return quickly.
pub trait UploadObserver: Send + Sync {
    fn did_start_uploading(&self, _id: Uuid) {}

    fn did_finish_uploading(&self, _id: Uuid) {}

    fn upload_failed(&self, _id: Uuid, _error: &TransportError) {}

    /// The policy forbade uploading and the orchestrator paused
    fn upload_cancelled_by_policy(&self) {}
}

/// No-op observer
impl UploadObserver for () {}
