//! Upload Orchestrator - drives encrypt-then-upload of queued logs
//!
//! ## Architecture
//!
//! - **UploadOrchestrator**: actor task that owns the queue, the backoff state
//!   and the pause flag. All mutation happens on this one task.
//! - **EventLoggingHandle**: cloneable handle; every call is a message to the
//!   actor, so callers never touch shared state and never wait on an upload.
//! - **Attempt worker**: one spawned task per attempt that encrypts the queue
//!   head and calls the transport, then sends the outcome back to the actor.
//!
//! ## Attempt loop
//!
//! ```text
//! resume/enqueue ─► attempt ─► queue empty?      ─► Paused
//!                           ─► policy forbids?   ─► Paused
//!                           ─► permit taken?     ─► (in flight, wait)
//!                           ─► spawn worker ─► outcome ─► update queue/backoff
//!                                                     ─► next attempt after delay
//! ```
//!
//! Exactly one attempt is in flight: the worker holds the only permit of a
//! one-permit semaphore and hands it back inside the outcome message, so the
//! permit is released after the queue and backoff are updated, on every path.

mod actor;
mod handle;

pub use actor::UploadOrchestrator;
pub use handle::EventLoggingHandle;

use crate::config::ConfigError;
use crate::queue::StorageError;

/// Errors from constructing or talking to the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum EventLoggingError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("upload orchestrator is not running")]
    Closed,
}
