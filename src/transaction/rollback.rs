// src/transaction/rollback.rs

//! Compensation ledger
//!
//! Each transformation owns one ledger. Compensating actions are pushed as
//! steps complete and popped in reverse when the ledger runs. A ledger runs
//! on one of two paths:
//!
//! - the pipeline hit an error and calls [`RollbackLedger::run`] itself
//! - the process-wide cancellation token fired while the ledger was being
//!   watched (between [`RollbackLedger::wait`] and [`RollbackLedger::close`])
//!
//! Both paths may race. Runs are serialized and every action is popped
//! before it executes, so each action runs at most once in total.
//!
//! Runs also exclude steps: a step holds a [`StepGuard`] from its
//! checkpoint until it returns, and a cancel-triggered run waits for it. A
//! step is never undone while it is still creating what it undoes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedMutexGuard, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::TransformState;
use crate::error::{Error, Result};

type CompensationFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;
type Compensation = Box<dyn FnOnce() -> CompensationFuture + Send + 'static>;

struct Entry {
    description: String,
    action: Compensation,
}

/// Watch states; the first transition away from `WATCH_OPEN` wins
const WATCH_OPEN: u8 = 0;
const WATCH_CLOSED: u8 = 1;
const WATCH_INTERRUPTED: u8 = 2;

struct LedgerInner {
    id: String,
    entries: Mutex<Vec<Entry>>,
    executed: AtomicBool,
    watch: AtomicU8,
    /// Serializes runs with each other and with steps in flight
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl LedgerInner {
    /// Leave the open watch state; false if something else left it first
    fn claim(&self, to: u8) -> bool {
        self.watch
            .compare_exchange(WATCH_OPEN, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn run(&self, reason: &str) {
        let _guard = self.run_lock.lock().await;
        if !self.executed.swap(true, Ordering::SeqCst) {
            info!("rollback: {} transformation of container {}", reason, self.id);
        }

        loop {
            // The lock is released before the action is awaited
            let entry = self.entries.lock().pop();
            let Some(entry) = entry else { break };

            info!("rollback: {} of container {}", entry.description, self.id);
            if let Err(e) = (entry.action)().await {
                warn!(
                    "rollback: {} of container {} failed: {}",
                    entry.description, self.id, e
                );
            }
        }
    }
}

/// Held for the duration of one step; rollback waits until it is dropped
#[must_use = "the step is only protected while the guard is held"]
pub struct StepGuard {
    _run: OwnedMutexGuard<()>,
}

/// Stack of compensating actions for one container
pub struct RollbackLedger {
    inner: Arc<LedgerInner>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    close_tx: Option<oneshot::Sender<()>>,
}

impl RollbackLedger {
    /// Create a ledger for container `id`
    ///
    /// `cancel` is the process-wide token; listeners are spawned on
    /// `tracker` so the orchestrator can wait for in-flight rollbacks.
    pub fn new(id: impl Into<String>, cancel: CancellationToken, tracker: TaskTracker) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                id: id.into(),
                entries: Mutex::new(Vec::new()),
                executed: AtomicBool::new(false),
                watch: AtomicU8::new(WATCH_OPEN),
                run_lock: Arc::new(tokio::sync::Mutex::new(())),
            }),
            cancel,
            tracker,
            close_tx: None,
        }
    }

    /// Start watching the cancellation token
    ///
    /// Must be paired with exactly one [`close`](Self::close). Dropping the
    /// ledger also releases the listener.
    pub fn wait(&mut self) {
        if self.close_tx.is_some() {
            warn!("rollback ledger of {} is already being watched", self.inner.id);
            return;
        }

        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        self.close_tx = Some(close_tx);

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                // Fires on close() and when the ledger is dropped
                _ = &mut close_rx => {}
                _ = cancel.cancelled() => {
                    if inner.claim(WATCH_INTERRUPTED) {
                        inner.run("cancel").await;
                    }
                }
            }
            debug!("rollback listener of {} exited", inner.id);
        });
    }

    /// Push a compensating action
    pub fn register<F, Fut>(&self, description: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let action: Compensation = Box::new(move || Box::pin(action()));
        self.inner.entries.lock().push(Entry {
            description: description.into(),
            action,
        });
    }

    /// Run every pending action, newest first
    ///
    /// Safe to call from several paths. A call that starts after another run
    /// finished only executes actions registered in between.
    pub async fn run(&self) {
        self.inner.run("abort").await;
    }

    /// Stop watching the cancellation token; never runs the actions itself
    pub fn close(&mut self) {
        self.inner.claim(WATCH_CLOSED);
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Returns Cancelled before entering `next` if cancellation was requested
    pub fn checkpoint(&self, next: TransformState) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled(format!(
                "transformation of {} interrupted before {}",
                self.inner.id, next
            )))
        } else {
            Ok(())
        }
    }

    /// Enter step `next`
    ///
    /// Waits for any rollback in progress, then fails like
    /// [`checkpoint`](Self::checkpoint). The guard must be dropped before
    /// the next step is entered or the ledger is run.
    pub async fn begin(&self, next: TransformState) -> Result<StepGuard> {
        let run = Arc::clone(&self.inner.run_lock).lock_owned().await;
        self.checkpoint(next)?;
        Ok(StepGuard { _run: run })
    }

    /// Returns true if the cancellation listener claimed the ledger
    ///
    /// Settled once [`close`](Self::close) has returned: a transformation
    /// that finished but was claimed here is being undone.
    pub fn is_interrupted(&self) -> bool {
        self.inner.watch.load(Ordering::SeqCst) == WATCH_INTERRUPTED
    }

    /// Returns true once any run has started
    pub fn is_executed(&self) -> bool {
        self.inner.executed.load(Ordering::SeqCst)
    }

    /// Number of actions not yet executed
    pub fn pending(&self) -> usize {
        self.inner.entries.lock().len()
    }
}

impl Drop for RollbackLedger {
    fn drop(&mut self) {
        self.inner.claim(WATCH_CLOSED);
    }
}
