//! UploadOrchestrator actor - owns all upload state and runs the attempt loop

use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handle::{Command, EventLoggingHandle};
use super::EventLoggingError;
use crate::backoff::BackoffScheduler;
use crate::config::defaults::{COMMAND_CHANNEL_SIZE, ENCRYPTION_RETRY_FLOOR};
use crate::config::EventLoggingConfig;
use crate::diagnostics::{ErrorSink, TracingErrorSink, UploadObserver};
use crate::encryptor::{EncryptionError, LogEncryptor};
use crate::policy::UploadPolicy;
use crate::queue::{DurableUploadQueue, StorageError};
use crate::transport::{TransportError, UploadTransport};
use crate::types::{LogRecord, UploadStatus, UploaderState};

// ============================================================================
// Attempt Outcome
// ============================================================================

/// Terminal result of one attempt, returned by the worker task
#[derive(Debug)]
enum AttemptOutcome {
    Uploaded,
    UploadFailed(TransportError),
    EncryptionFailed(EncryptionError),
}

/// The attempt currently running on a worker task
#[derive(Debug)]
struct InFlight {
    id: Uuid,
    task: JoinHandle<AttemptOutcome>,
    /// Single-flight permit, released after the outcome has been applied
    permit: OwnedSemaphorePermit,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Upload orchestrator - serialized owner of queue, backoff and pause state
pub struct UploadOrchestrator {
    queue: DurableUploadQueue,
    backoff: BackoffScheduler,
    encryptor: Arc<LogEncryptor>,
    transport: Arc<dyn UploadTransport>,
    policy: Arc<dyn UploadPolicy>,
    error_sink: Arc<dyn ErrorSink>,
    observer: Arc<dyn UploadObserver>,
    /// Command receiver
    rx: mpsc::Receiver<Command>,
    /// One permit: held by the in-flight attempt
    flight: Arc<Semaphore>,
    in_flight: Option<InFlight>,
    paused: bool,
    /// Deadline of the next scheduled attempt
    next_attempt: Option<Instant>,
    cancel_token: CancellationToken,
    /// Counter for logging
    attempt_count: u64,
}

impl UploadOrchestrator {
    /// Validate `config`, open the queue and return the actor and its handle.
    ///
    /// A malformed public key or invalid backoff bounds fail here with
    /// [`EventLoggingError::Config`]; nothing is retried. The actor does
    /// nothing until [`run`](Self::run) is polled.
    pub fn new(
        config: &EventLoggingConfig,
        transport: Arc<dyn UploadTransport>,
        policy: Arc<dyn UploadPolicy>,
    ) -> Result<(Self, EventLoggingHandle), EventLoggingError> {
        config.validate()?;
        let encryptor = LogEncryptor::from_config(&config.encryption, &config.storage.scratch_dir)?;
        let queue = DurableUploadQueue::open(&config.storage.queue_dir)?;
        let backoff = BackoffScheduler::new(config.backoff.min_delay(), config.backoff.max_delay());

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        let orchestrator = Self {
            queue,
            backoff,
            encryptor: Arc::new(encryptor),
            transport,
            policy,
            error_sink: Arc::new(TracingErrorSink),
            observer: Arc::new(()),
            rx,
            flight: Arc::new(Semaphore::new(1)),
            in_flight: None,
            paused: true,
            next_attempt: None,
            cancel_token: CancellationToken::new(),
            attempt_count: 0,
        };

        Ok((orchestrator, EventLoggingHandle::new(tx)))
    }

    /// Replace the default tracing error sink
    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Stop the loop when `cancel_token` is cancelled.
    ///
    /// No new attempt starts after cancellation. An upload already in flight
    /// is awaited and its outcome applied before [`run`](Self::run)
    /// returns, so a record is never uploaded by two runs at once.
    pub fn with_cancellation(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the orchestrator loop until cancelled or every handle is dropped.
    ///
    /// Starts with an implicit resume, so queued logs left over from a
    /// previous run are picked up immediately.
    pub async fn run(mut self) {
        info!(
            queue_dir = %self.queue.queue_dir().display(),
            "UploadOrchestrator starting"
        );

        self.resume();

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!("UploadOrchestrator received shutdown signal");
                    break;
                }
                result = join_attempt(&mut self.in_flight) => {
                    if let Some(attempt) = self.in_flight.take() {
                        self.finish_attempt(attempt, result);
                    }
                }
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("All handles dropped, shutting down");
                        break;
                    }
                },
                () = wait_for(self.next_attempt) => {
                    self.next_attempt = None;
                    self.process_attempt();
                }
            }
        }

        self.shutdown().await;
        info!(attempts = self.attempt_count, "UploadOrchestrator stopped");
    }

    /// Stop scheduling and settle the in-flight attempt, if any
    async fn shutdown(&mut self) {
        self.paused = true;
        self.next_attempt = None;

        if let Some(mut attempt) = self.in_flight.take() {
            info!(id = %attempt.id, "Waiting for in-flight upload to finish");
            let result = (&mut attempt.task).await;
            self.finish_attempt(attempt, result);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue {
                record,
                response_tx,
            } => {
                let id = record.id();
                let result = self.queue.add(&record);
                let added = result.is_ok();
                if let Err(e) = &result {
                    warn!(id = %id, error = %e, "Failed to enqueue log");
                }
                let _ = response_tx.send(result);

                // Restart the automatic upload when logs are added
                if added {
                    self.resume();
                }
            }
            Command::Pause => self.pause("requested"),
            Command::Resume => self.resume(),
            Command::Status { response_tx } => {
                let status = self.status();
                if let Err(e) = &status {
                    warn!(error = %e, "Failed to read upload queue for status");
                }
                let _ = response_tx.send(status);
            }
        }
    }

    fn pause(&mut self, reason: &str) {
        if !self.paused {
            info!(reason, "Automatic upload paused");
        }
        self.paused = true;
        self.next_attempt = None;
    }

    /// Clear the pause flag and attempt now, or when the backoff elapses
    fn resume(&mut self) {
        if self.paused {
            debug!("Automatic upload resumed");
        }
        self.paused = false;

        let at = self.backoff.next_fire_instant();
        if at <= Instant::now() {
            self.process_attempt();
        } else {
            self.schedule_attempt(at);
        }
    }

    /// One pass of the loop body. Never blocks on encryption or upload.
    fn process_attempt(&mut self) {
        if self.paused {
            return;
        }

        let record = match self.queue.first() {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.pause("upload queue is empty");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read upload queue, will retry");
                self.schedule_retry();
                return;
            }
        };

        // A persistently negative policy must not spin the loop
        if !self.policy.uploads_allowed() {
            self.observer.upload_cancelled_by_policy();
            self.pause("upload policy forbids uploading");
            return;
        }

        let Ok(permit) = Arc::clone(&self.flight).try_acquire_owned() else {
            debug!(id = %record.id(), "Upload already in flight");
            return;
        };

        self.attempt_count += 1;
        let id = record.id();
        debug!(id = %id, attempt = self.attempt_count, "Starting upload attempt");
        self.observer.did_start_uploading(id);

        let task = tokio::spawn(run_attempt(
            record,
            Arc::clone(&self.encryptor),
            Arc::clone(&self.transport),
        ));
        self.in_flight = Some(InFlight { id, task, permit });
    }

    fn finish_attempt(&mut self, attempt: InFlight, result: Result<AttemptOutcome, JoinError>) {
        let InFlight { id, permit, .. } = attempt;

        // A worker that panicked or was cancelled counts as a failed upload
        let outcome = result.unwrap_or_else(|e| {
            error!(id = %id, error = %e, "Upload attempt did not complete");
            AttemptOutcome::UploadFailed(TransportError::Other(format!(
                "upload attempt did not complete: {e}"
            )))
        });

        match outcome {
            AttemptOutcome::Uploaded => {
                match self.queue.remove(id) {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!(id = %id, "Uploaded log was already removed from queue");
                    }
                    Err(e) => {
                        warn!(id = %id, error = %e, "Uploaded log could not be removed from queue");
                    }
                }
                // Requests are succeeding again
                self.backoff.reset();
                info!(id = %id, "Uploaded log");
                self.observer.did_finish_uploading(id);
            }
            AttemptOutcome::UploadFailed(e) => {
                self.backoff.increment();
                warn!(
                    id = %id,
                    error = %e,
                    consecutive_failures = self.backoff.consecutive_failures(),
                    next_retry_secs = self.backoff.current_delay().as_secs_f64(),
                    "Upload failed, backing off"
                );
                self.observer.upload_failed(id, &e);
            }
            AttemptOutcome::EncryptionFailed(e) => {
                // Not a network problem: retry later without growing the backoff
                self.error_sink.report(id, &e);
                drop(permit);
                self.schedule_retry();
                return;
            }
        }

        drop(permit);
        self.schedule_attempt(self.backoff.next_fire_instant());
    }

    /// Retry after the current delay, but never sooner than the retry floor
    fn schedule_retry(&mut self) {
        let delay = self.backoff.current_delay().max(ENCRYPTION_RETRY_FLOOR);
        self.schedule_attempt(Instant::now() + delay);
    }

    /// Keep the earlier deadline. No-op while paused.
    fn schedule_attempt(&mut self, at: Instant) {
        if self.paused {
            return;
        }
        self.next_attempt = Some(self.next_attempt.map_or(at, |existing| existing.min(at)));
    }

    fn state(&self) -> UploaderState {
        if self.flight.available_permits() == 0 {
            UploaderState::Processing
        } else if self.paused {
            UploaderState::Paused
        } else {
            UploaderState::Idle
        }
    }

    fn status(&self) -> Result<UploadStatus, StorageError> {
        let pending = self.queue.pending_count()?;

        Ok(UploadStatus {
            state: self.state(),
            paused: self.paused,
            current_delay: self.backoff.current_delay(),
            uploads_paused_until: self.backoff.paused_until(),
            consecutive_failures: self.backoff.consecutive_failures(),
            pending,
        })
    }
}

/// Sleep until `deadline`, or forever when nothing is scheduled
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Join the in-flight worker, or wait forever when there is none
async fn join_attempt(in_flight: &mut Option<InFlight>) -> Result<AttemptOutcome, JoinError> {
    match in_flight {
        Some(attempt) => (&mut attempt.task).await,
        None => std::future::pending().await,
    }
}

/// Encrypt and upload one record off the actor's task
async fn run_attempt(
    record: LogRecord,
    encryptor: Arc<LogEncryptor>,
    transport: Arc<dyn UploadTransport>,
) -> AttemptOutcome {
    let encrypted = match encryptor.encrypt(record) {
        Ok(encrypted) => encrypted,
        Err(e) => return AttemptOutcome::EncryptionFailed(e),
    };

    let result = transport.upload(&encrypted).await;
    encryptor.discard(&encrypted);
    match result {
        Ok(()) => AttemptOutcome::Uploaded,
        Err(e) => AttemptOutcome::UploadFailed(e),
    }
}
