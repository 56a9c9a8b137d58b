//! Event Logging: durable, encrypted upload of device telemetry logs
//!
//! Log files handed to the pipeline are copied into an on-disk queue, sealed
//! with the collector's public key one at a time, and uploaded oldest first.
//! Failed uploads back off exponentially; a log leaves the queue only after
//! the backend has accepted it.
//!
//! ## Architecture
//!
//! - **Queue**: directory-backed FIFO that survives restarts
//! - **Encryptor**: sealed-box encryption into a scratch directory
//! - **Transport**: pluggable upload (HTTP by default)
//! - **Orchestrator**: single actor task owning queue, backoff and pause
//!   state, with at most one upload in flight
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_logging::{AlwaysAllow, EventLoggingConfig, HttpTransport, LogRecord, UploadOrchestrator};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = EventLoggingConfig::load();
//! let transport = Arc::new(HttpTransport::from_config(&config.upload)?);
//! let (orchestrator, handle) = UploadOrchestrator::new(&config, transport, Arc::new(AlwaysAllow))?;
//! orchestrator.spawn();
//!
//! handle.enqueue_log_for_upload(LogRecord::new("/var/log/device/session.log")).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod diagnostics;
pub mod encryptor;
pub mod lock;
pub mod orchestrator;
pub mod policy;
pub mod queue;
pub mod transport;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, EventLoggingConfig};

// Re-export commonly used types
pub use types::{EncryptedLogRecord, LogRecord, UploadStatus, UploaderState};

// Re-export pipeline components
pub use backoff::BackoffScheduler;
pub use encryptor::{EncryptionError, LogEncryptor};
pub use queue::{DurableUploadQueue, StorageError};
pub use transport::{HttpTransport, TransportError, UploadTransport};

// Re-export orchestration
pub use diagnostics::{ErrorSink, TracingErrorSink, UploadObserver};
pub use lock::{LockError, QueueLock};
pub use orchestrator::{EventLoggingError, EventLoggingHandle, UploadOrchestrator};
pub use policy::{AlwaysAllow, PolicySwitch, UploadPolicy};
