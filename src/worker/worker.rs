//! Per-cluster worker.
//!
//! Each worker owns the passes for one cluster and runs them one at a time,
//! which gives the per-cluster mutual exclusion the reconciler relies on.
//! Different clusters have different workers and reconcile concurrently.
//!
//! # Event Loop
//!
//! The worker waits for the first of:
//! - a shutdown signal (token or message)
//! - a `Reconcile` message; every other trigger already queued is drained and
//!   folded into the same pass
//! - the retry timer, armed after a failed pass
//! - the resync timer, re-armed after every successful pass
//!
//! A pass that finds the cluster gone ends the worker, unless triggers queued
//! meanwhile show it was recreated. Those get passes of their own, retried on
//! failure like any other.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::reconcile::{PassOutcome, ReconcileError, Reconciler};
use crate::store::ObjectStore;
use crate::types::ObjectKey;

use super::message::{Trigger, WorkerMessage};
use super::poll::ResyncConfig;
use super::retry::RetryConfig;

/// Errors that can occur during worker operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A reconciliation pass failed. The worker retries it after backoff.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Why a worker's event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown,
    ChannelClosed,
    ClusterGone,
}

/// Timing configuration shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub resync: ResyncConfig,
    pub retry: RetryConfig,
}

impl WorkerConfig {
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync = self.resync.with_interval(interval);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Outcome of one pass as seen by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Done,
    Failed,
    Gone,
}

/// The worker for one cluster.
pub struct ClusterWorker<S> {
    key: ObjectKey,
    reconciler: Reconciler<S>,
    config: WorkerConfig,

    /// Consecutive failed passes.
    failures: u32,

    /// When to retry after a failure, if a retry is pending.
    retry_at: Option<Instant>,
    next_resync: Instant,
}

impl<S: ObjectStore> ClusterWorker<S> {
    pub fn new(key: ObjectKey, reconciler: Reconciler<S>, config: WorkerConfig) -> Self {
        let next_resync = Instant::now() + config.resync.initial_delay(&key);
        ClusterWorker {
            key,
            reconciler,
            config,
            failures: 0,
            retry_at: None,
            next_resync,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// Runs the worker's event loop until shutdown, channel closure, or the
    /// cluster disappearing.
    #[instrument(skip_all, fields(cluster = %self.key))]
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        shutdown: CancellationToken,
    ) -> WorkerExit {
        info!("Worker event loop started");

        // Set once the channel is closed on the way out. Passes still run
        // for triggers that were queued before the close.
        let mut closed = false;
        let mut queued: Option<Trigger> = None;

        let exit = loop {
            let trigger = match queued.take() {
                Some(trigger) => trigger,
                None => {
                    let wakeup = match self.retry_at {
                        Some(retry_at) => retry_at.min(self.next_resync),
                        None => self.next_resync,
                    };

                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!("Shutdown signal received, stopping worker");
                            break WorkerExit::Shutdown;
                        }

                        msg = rx.recv(), if !closed => match msg {
                            Some(WorkerMessage::Reconcile(trigger)) => {
                                match drain_triggers(&mut rx) {
                                    Drained::Shutdown => break WorkerExit::Shutdown,
                                    Drained::Triggers(0) => {}
                                    Drained::Triggers(n) => debug!(coalesced = n, "Coalesced queued triggers"),
                                }
                                trigger
                            }
                            Some(WorkerMessage::Shutdown) => {
                                info!("Shutdown message received");
                                break WorkerExit::Shutdown;
                            }
                            None => {
                                info!("Message channel closed");
                                break WorkerExit::ChannelClosed;
                            }
                        },

                        _ = tokio::time::sleep_until(wakeup) => {
                            if self.retry_at.is_some_and(|at| at <= Instant::now()) {
                                Trigger::Retry
                            } else {
                                Trigger::Periodic
                            }
                        }
                    }
                }
            };

            match self.pass(trigger).await {
                Settled::Gone if closed => break WorkerExit::ClusterGone,
                Settled::Gone => {
                    // Triggers that raced with the read may be for a
                    // recreated cluster, so they get a pass of their own.
                    match drain_triggers(&mut rx) {
                        Drained::Shutdown => break WorkerExit::Shutdown,
                        Drained::Triggers(0) => {}
                        Drained::Triggers(_) => {
                            queued = Some(Trigger::ClusterChanged);
                            continue;
                        }
                    }

                    // New senders see the closed channel and respawn.
                    rx.close();
                    closed = true;
                    match drain_triggers(&mut rx) {
                        Drained::Shutdown => break WorkerExit::Shutdown,
                        Drained::Triggers(0) => break WorkerExit::ClusterGone,
                        Drained::Triggers(_) => queued = Some(Trigger::ClusterChanged),
                    }
                }
                // A failed pass keeps its retry timer even after the close.
                Settled::Done if closed => break WorkerExit::ChannelClosed,
                Settled::Done | Settled::Failed => {}
            }
        };

        info!(?exit, "Worker event loop stopped");
        exit
    }

    /// Runs one pass and schedules the next timer accordingly.
    async fn pass(&mut self, trigger: Trigger) -> Settled {
        debug!(%trigger, "Starting pass");
        match self.reconcile().await {
            Ok(PassOutcome::Missing) => {
                info!("Cluster is gone, stopping worker");
                Settled::Gone
            }
            Ok(outcome) => {
                debug!(?outcome, "Pass complete");
                self.failures = 0;
                self.retry_at = None;
                self.next_resync =
                    Instant::now() + self.config.resync.interval_with_jitter(&self.key);
                Settled::Done
            }
            Err(e) => {
                let delay = self.config.retry.delay_for_attempt(self.failures);
                self.failures = self.failures.saturating_add(1);
                self.retry_at = Some(Instant::now() + delay);

                let WorkerError::Reconcile(inner) = &e;
                if inner.is_conflict() {
                    debug!(error = %e, ?delay, "Pass lost a write race, retrying");
                } else if self.failures > 1 {
                    error!(error = %e, failures = self.failures, ?delay, "Pass failed again");
                } else {
                    warn!(error = %e, ?delay, "Pass failed, retrying");
                }
                Settled::Failed
            }
        }
    }

    async fn reconcile(&self) -> Result<PassOutcome> {
        Ok(self.reconciler.reconcile(&self.key).await?)
    }
}

enum Drained {
    Triggers(usize),
    Shutdown,
}

/// Takes every message already queued without waiting.
fn drain_triggers(rx: &mut mpsc::Receiver<WorkerMessage>) -> Drained {
    let mut count = 0;
    loop {
        match rx.try_recv() {
            Ok(WorkerMessage::Reconcile(_)) => count += 1,
            Ok(WorkerMessage::Shutdown) => return Drained::Shutdown,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                return Drained::Triggers(count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::store::{FileStore, MemoryStore, get_cluster};
    use crate::test_utils::*;
    use crate::types::Object;

    fn fast_config() -> WorkerConfig {
        WorkerConfig::default()
            .with_resync_interval(Duration::from_secs(3600))
            .with_retry(RetryConfig::new(
                Duration::from_millis(10),
                Duration::from_millis(50),
                2.0,
            ))
    }

    fn worker(store: &Arc<MemoryStore>) -> ClusterWorker<MemoryStore> {
        ClusterWorker::new(
            cluster_key(),
            Reconciler::new(Arc::clone(store)),
            fast_config(),
        )
    }

    async fn wait_for<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn reconciles_on_trigger_and_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        create_cluster(&*store, &cluster_key(), single_controller_spec()).await;

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(worker(&store).run(rx, CancellationToken::new()));

        tx.send(WorkerMessage::Reconcile(Trigger::ClusterChanged))
            .await
            .unwrap();
        wait_for(|| {
            let store = Arc::clone(&store);
            async move {
                get_cluster(&*store, &cluster_key())
                    .await
                    .unwrap()
                    .is_some_and(|c| c.status.kubeadm_config.is_some())
            }
        })
        .await;

        tx.send(WorkerMessage::Shutdown).await.unwrap();
        assert_eq!(handle.await.unwrap(), WorkerExit::Shutdown);
    }

    #[tokio::test]
    async fn exits_when_cluster_is_gone() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(worker(&store).run(rx, CancellationToken::new()));

        tx.send(WorkerMessage::Reconcile(Trigger::Resync)).await.unwrap();

        assert_eq!(handle.await.unwrap(), WorkerExit::ClusterGone);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn cancellation_stops_idle_worker() {
        let store = Arc::new(MemoryStore::new());
        let (_tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = tokio::spawn(worker(&store).run(rx, token.clone()));

        token.cancel();

        assert_eq!(handle.await.unwrap(), WorkerExit::Shutdown);
    }

    #[tokio::test]
    async fn dropped_senders_stop_worker() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(worker(&store).run(rx, CancellationToken::new()));

        drop(tx);

        assert_eq!(handle.await.unwrap(), WorkerExit::ChannelClosed);
    }

    #[tokio::test]
    async fn queued_triggers_collapse_into_one_pass() {
        let store = Arc::new(MemoryStore::new());
        create_cluster(&*store, &cluster_key(), single_controller_spec()).await;

        let (tx, rx) = mpsc::channel(16);
        for _ in 0..10 {
            tx.send(WorkerMessage::Reconcile(Trigger::ClusterChanged))
                .await
                .unwrap();
        }
        tx.send(WorkerMessage::Shutdown).await.unwrap();

        let exit = worker(&store).run(rx, CancellationToken::new()).await;

        // The shutdown queued behind the triggers is seen while draining.
        assert_eq!(exit, WorkerExit::Shutdown);
        let cluster = get_cluster(&*store, &cluster_key()).await.unwrap().unwrap();
        assert!(cluster.status.kubeadm_config.is_none());
    }

    #[tokio::test]
    async fn failed_pass_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        // A member name that cannot be stored makes every pass fail.
        let spec = cluster_spec(&[("bad/name", "10.0.0.1")], &[]);
        create_cluster(&*store, &cluster_key(), spec).await;

        let mut w = ClusterWorker::new(
            cluster_key(),
            Reconciler::new(Arc::clone(&store)),
            fast_config(),
        );
        assert_eq!(w.pass(Trigger::ClusterChanged).await, Settled::Failed);
        assert_eq!(w.failures, 1);
        assert!(w.retry_at.is_some());

        let mut cluster = read_cluster(&*store, &cluster_key()).await;
        cluster.spec.controllers[0].name = "c1".to_string();
        store.update(Object::from(cluster)).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(w.run(rx, CancellationToken::new()));
        wait_for(|| {
            let store = Arc::clone(&store);
            async move {
                get_cluster(&*store, &cluster_key())
                    .await
                    .unwrap()
                    .is_some_and(|c| c.status.kubeadm_config.is_some())
            }
        })
        .await;

        tx.send(WorkerMessage::Shutdown).await.unwrap();
        assert_eq!(handle.await.unwrap(), WorkerExit::Shutdown);
    }

    #[tokio::test]
    async fn recreated_cluster_is_retried_after_failed_pass() {
        let store = Arc::new(FaultyStore::new());
        create_cluster(&store.inner, &cluster_key(), single_controller_spec()).await;

        let (tx, rx) = mpsc::channel(8);
        // The first read misses the cluster and a trigger for its
        // recreation arrives. The pass for that trigger then fails once.
        store.hidden_cluster_reads.store(1, Ordering::SeqCst);
        *store.on_hidden_read.lock().unwrap() = Some(tx.clone());
        store.failing_creates.store(1, Ordering::SeqCst);

        let w = ClusterWorker::new(
            cluster_key(),
            Reconciler::new(Arc::clone(&store)),
            fast_config(),
        );
        let handle = tokio::spawn(w.run(rx, CancellationToken::new()));
        tx.send(WorkerMessage::Reconcile(Trigger::ClusterChanged))
            .await
            .unwrap();

        wait_for(|| {
            let store = Arc::clone(&store);
            async move {
                get_cluster(&store.inner, &cluster_key())
                    .await
                    .unwrap()
                    .is_some_and(|c| c.status.kubeadm_config.is_some())
            }
        })
        .await;
        assert!(store.create_attempts.load(Ordering::SeqCst) > 1);
        assert!(!handle.is_finished());
        assert!(!tx.is_closed());

        tx.send(WorkerMessage::Shutdown).await.unwrap();
        assert_eq!(handle.await.unwrap(), WorkerExit::Shutdown);
    }

    #[tokio::test]
    async fn success_resets_backoff() {
        let store = Arc::new(MemoryStore::new());
        create_cluster(&*store, &cluster_key(), single_controller_spec()).await;
        let mut w = worker(&store);
        w.failures = 3;
        w.retry_at = Some(Instant::now());

        assert_eq!(w.pass(Trigger::Retry).await, Settled::Done);

        assert_eq!(w.failures, 0);
        assert!(w.retry_at.is_none());
        assert!(w.next_resync > Instant::now() + Duration::from_secs(3000));
    }
}
