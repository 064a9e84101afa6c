//! Background sync worker.
//!
//! A sync runs as a spawned `tokio` task. The caller gets a [`SyncJob`] with
//! a progress receiver, a cancel flag, and a handle resolving to the
//! [`SyncReport`] exactly once. Only one job runs at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::pipeline::{SyncOrchestrator, SyncReport};

/// Cooperative cancellation shared between a job and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress event published while a sync runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    /// 0-100
    pub percent: u8,
    pub message: String,
}

/// Sending side of the progress channel; a no-op when nobody listens.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<SyncProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let progress = SyncProgress {
            percent: percent.min(100),
            message: message.into(),
        };
        log::debug!("[{:>3}%] {}", progress.percent, progress.message);
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(progress);
        }
    }
}

/// A running sync.
pub struct SyncJob {
    cancel: CancelFlag,
    progress: mpsc::UnboundedReceiver<SyncProgress>,
    handle: JoinHandle<Result<SyncReport>>,
}

impl SyncJob {
    /// Request cancellation; takes effect at the next fetch or before commit.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Next progress event, or `None` once the job has finished.
    pub async fn next_progress(&mut self) -> Option<SyncProgress> {
        self.progress.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome.
    pub async fn wait(self) -> Result<SyncReport> {
        self.handle
            .await
            .map_err(|e| AppError::Worker(e.to_string()))?
    }
}

/// Starts sync jobs, at most one at a time.
#[derive(Clone)]
pub struct SyncWorker {
    orchestrator: Arc<SyncOrchestrator>,
    in_flight: Arc<Mutex<()>>,
}

impl SyncWorker {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            orchestrator,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Whether a job is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Spawn a sync against the committed catalog.
    ///
    /// Fails with [`AppError::SyncInProgress`] while another job runs.
    pub fn start(&self) -> Result<SyncJob> {
        let guard = Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| AppError::SyncInProgress)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let orchestrator = Arc::clone(&self.orchestrator);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let progress = ProgressReporter::new(tx);
            let current = orchestrator.load_current().await?;
            let result = orchestrator
                .run_sync(current.as_ref(), &flag, &progress)
                .await;
            if let Err(e) = &result {
                log::error!("Sync failed: {e}");
            }
            result
        });

        log::info!("Sync job started");
        Ok(SyncJob {
            cancel,
            progress: rx,
            handle,
        })
    }
}
