//! Shared fixtures for the upload integration tests
//!
//! All orchestrator tests run on a paused tokio clock, so backoff delays of
//! seconds or hours elapse instantly and timings are exact to the millisecond.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::SecretKey;
use tempfile::TempDir;
use tokio::time::Instant;
use uuid::Uuid;

use event_logging::{
    EncryptedLogRecord, EncryptionError, ErrorSink, EventLoggingConfig, EventLoggingHandle,
    LogRecord, TransportError, UploadObserver, UploadStatus, UploadTransport,
};

/// Upper bound on simulated time any wait helper will spend
const WAIT_LIMIT: Duration = Duration::from_secs(24 * 3600);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Fixture
// ============================================================================

/// Temp directories, a valid config and the secret key matching its public key
pub struct Fixture {
    pub dir: TempDir,
    pub config: EventLoggingConfig,
    pub secret: SecretKey,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let secret = SecretKey::generate(&mut OsRng);

        let mut config = EventLoggingConfig::default();
        config.storage.queue_dir = dir.path().join("queue");
        config.storage.scratch_dir = dir.path().join("scratch");
        config.encryption.public_key = BASE64_STANDARD.encode(secret.public_key().as_bytes());
        config.upload.url = "https://collector.invalid/logs".to_string();
        config.backoff.min_delay_secs = 2;
        config.backoff.max_delay_secs = 3600;

        Self {
            dir,
            config,
            secret,
        }
    }

    /// Write a plaintext log outside the queue and return a record for it
    pub fn write_log(&self, name: &str, contents: &str) -> LogRecord {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        LogRecord::new(path)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.config.storage.scratch_dir.clone()
    }
}

// ============================================================================
// Scripted Transport
// ============================================================================

/// One observed upload call
#[derive(Debug, Clone)]
pub struct Call {
    pub id: Uuid,
    pub at: Instant,
    pub body: Vec<u8>,
}

/// Runs inside `upload` with the record id, before the outcome is returned
type UploadHook = Box<dyn Fn(Uuid) + Send + Sync>;

/// Transport whose outcomes follow a script, then a fixed default
pub struct ScriptedTransport {
    script: Mutex<VecDeque<bool>>,
    default_ok: bool,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    panics_remaining: AtomicUsize,
    panics: AtomicUsize,
    on_upload: Option<UploadHook>,
}

impl ScriptedTransport {
    /// Follow `script` (true = success), then succeed
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            default_ok: true,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            panics_remaining: AtomicUsize::new(0),
            panics: AtomicUsize::new(0),
            on_upload: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::new([])
    }

    pub fn failing() -> Self {
        Self {
            default_ok: false,
            ..Self::new([])
        }
    }

    /// Each upload takes `latency` of (simulated) time
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The first `n` uploads panic instead of returning
    pub fn panicking_first(self, n: usize) -> Self {
        self.panics_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn on_upload(mut self, hook: impl Fn(Uuid) + Send + Sync + 'static) -> Self {
        self.on_upload = Some(Box::new(hook));
        self
    }

    pub fn panic_count(&self) -> usize {
        self.panics.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_ids(&self) -> Vec<Uuid> {
        self.calls().into_iter().map(|c| c.id).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UploadTransport for ScriptedTransport {
    async fn upload(&self, record: &EncryptedLogRecord) -> Result<(), TransportError> {
        let should_panic = self
            .panics_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_panic {
            self.panics.fetch_add(1, Ordering::SeqCst);
            panic!("transport crashed uploading {}", record.id());
        }

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let body = std::fs::read(record.path())?;
        self.calls.lock().unwrap().push(Call {
            id: record.id(),
            at: Instant::now(),
            body,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_ok);
        if let Some(hook) = &self.on_upload {
            hook(record.id());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if ok {
            Ok(())
        } else {
            Err(TransportError::Other("scripted failure".to_string()))
        }
    }
}

// ============================================================================
// Recording Hooks
// ============================================================================

/// Error sink that remembers every report and when it happened
#[derive(Default)]
pub struct RecordingErrorSink {
    reports: Mutex<Vec<(Uuid, Instant)>>,
}

impl RecordingErrorSink {
    pub fn reports(&self) -> Vec<(Uuid, Instant)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, id: Uuid, _error: &EncryptionError) {
        self.reports.lock().unwrap().push((id, Instant::now()));
    }
}

/// Lifecycle event seen by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(Uuid),
    Finished(Uuid),
    Failed(Uuid),
    CancelledByPolicy,
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl UploadObserver for RecordingObserver {
    fn did_start_uploading(&self, id: Uuid) {
        self.push(Event::Started(id));
    }

    fn did_finish_uploading(&self, id: Uuid) {
        self.push(Event::Finished(id));
    }

    fn upload_failed(&self, id: Uuid, _error: &TransportError) {
        self.push(Event::Failed(id));
    }

    fn upload_cancelled_by_policy(&self) {
        self.push(Event::CancelledByPolicy);
    }
}

// ============================================================================
// Wait Helpers
// ============================================================================

/// Poll `condition` on the simulated clock until it holds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll the orchestrator until its status satisfies `predicate`
pub async fn wait_for_status(
    handle: &EventLoggingHandle,
    predicate: impl Fn(&UploadStatus) -> bool,
) -> UploadStatus {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        let status = handle.status().await.unwrap();
        if predicate(&status) {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "status never matched, last: {status:?}"
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Number of files left in a directory (missing counts as empty)
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}
