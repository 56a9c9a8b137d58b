//! event-logging - queue, encrypt and upload device log files
//!
//! # Usage
//!
//! ```bash
//! # Queue log files for upload
//! event-logging enqueue /var/log/device/session-1.log /var/log/device/session-2.log
//!
//! # Show what is still pending
//! event-logging status
//!
//! # Upload until Ctrl+C, or until the queue is empty
//! event-logging run
//! event-logging run --until-drained
//! ```
//!
//! # Environment Variables
//!
//! - `EVENT_LOGGING_CONFIG`: Path to the TOML config (default: `./event_logging.toml`)
//! - `EVENT_LOGGING_PUBLIC_KEY`: Base64 public key, overrides the config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use event_logging::{
    DurableUploadQueue, EventLoggingConfig, HttpTransport, LogRecord, PolicySwitch, QueueLock,
    UploadOrchestrator, UploaderState,
};

/// How often `run --until-drained` checks the queue
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "event-logging")]
#[command(about = "Durable encrypted upload of device telemetry logs")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides the default search order)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Copy log files into the upload queue
    Enqueue {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Print the pending queue as JSON
    Status,
    /// Upload queued logs until interrupted
    Run {
        /// Exit once the queue is empty
        #[arg(long)]
        until_drained: bool,
    },
}

// ============================================================================
// Commands
// ============================================================================

/// Load the config without validating it; `status` works without a key
fn load_config(path: Option<&PathBuf>) -> Result<EventLoggingConfig> {
    Ok(match path {
        Some(path) => {
            let mut config = EventLoggingConfig::load_from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => EventLoggingConfig::load(),
    })
}

fn validated(config: &EventLoggingConfig) -> Result<()> {
    config.validate().context("Invalid uploader configuration")
}

fn run_enqueue(config: &EventLoggingConfig, files: &[PathBuf]) -> Result<()> {
    let _lock = QueueLock::acquire(&config.storage.queue_dir)?;
    let mut queue = DurableUploadQueue::open(&config.storage.queue_dir)?;

    for file in files {
        let record = LogRecord::new(file);
        queue
            .add(&record)
            .with_context(|| format!("Failed to queue {}", file.display()))?;
        println!("{}\t{}", record.id(), file.display());
    }

    info!(queued = files.len(), pending = queue.pending_count()?, "Logs queued");
    Ok(())
}

/// Pending queue as JSON. Only the storage section is used.
fn status_report(config: &EventLoggingConfig) -> Result<serde_json::Value> {
    let queue = DurableUploadQueue::open(&config.storage.queue_dir)?;
    let pending = queue.pending()?;

    Ok(serde_json::json!({
        "queue_dir": queue.queue_dir(),
        "pending_count": pending.len(),
        "pending": pending,
    }))
}

fn run_status(config: &EventLoggingConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&status_report(config)?)?);
    Ok(())
}

async fn run_uploader(config: &EventLoggingConfig, until_drained: bool) -> Result<()> {
    let _lock = QueueLock::acquire(&config.storage.queue_dir)?;

    let transport = Arc::new(
        HttpTransport::from_config(&config.upload).context("Upload transport not configured")?,
    );
    let policy = Arc::new(PolicySwitch::new(config.upload.enabled));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let (orchestrator, handle) = UploadOrchestrator::new(config, transport, policy)?;
    let task = orchestrator.with_cancellation(cancel_token.clone()).spawn();

    if until_drained {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
            let status = handle.status().await?;
            if status.pending == 0 && status.state != UploaderState::Processing {
                info!("Upload queue drained");
                cancel_token.cancel();
                break;
            }
            if status.paused && status.pending > 0 {
                warn!(pending = status.pending, "Uploads are disabled; queue cannot drain");
                cancel_token.cancel();
                break;
            }
        }
    }

    task.await.context("Upload orchestrator task failed")?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(args.config.as_ref())?;

    match args.command {
        SubCommand::Enqueue { files } => {
            validated(&config)?;
            run_enqueue(&config, &files)
        }
        SubCommand::Status => run_status(&config),
        SubCommand::Run { until_drained } => {
            validated(&config)?;
            run_uploader(&config, until_drained).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_report_without_public_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = EventLoggingConfig::default();
        config.storage.queue_dir = tmp.path().join("queue");
        config.storage.scratch_dir = tmp.path().join("scratch");
        assert!(config.validate().is_err());

        let log = tmp.path().join("session.log");
        std::fs::write(&log, "boot").unwrap();
        let record = LogRecord::new(&log);
        DurableUploadQueue::open(&config.storage.queue_dir)
            .unwrap()
            .add(&record)
            .unwrap();

        let report = status_report(&config).unwrap();
        assert_eq!(report["pending_count"], 1);
        assert_eq!(report["pending"][0]["id"], record.id().to_string());
    }
}
