//! Routing of reconcile triggers to per-cluster workers.
//!
//! The dispatcher creates workers on demand when the first trigger for a
//! cluster arrives. Different clusters reconcile concurrently; passes for one
//! cluster are strictly serialized by its worker.
//!
//! ```text
//!                                   ┌──────────────────┐
//!                              ┌──► │ infra/prod queue │ ──► worker
//! ┌────────────┐  ┌──────────┐ │    └──────────────────┘
//! │ controller │─►│ dispatch │─┤
//! │  (watch)   │  │by cluster│ │    ┌──────────────────┐
//! └────────────┘  └──────────┘ └──► │ infra/dev queue  │ ──► worker
//!                                   └──────────────────┘
//! ```
//!
//! # Worker Lifecycle
//!
//! A worker ends when its cluster is gone. Its handle stays in the map with a
//! closed channel until the next trigger for that key, which replaces it with
//! a fresh worker.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::reconcile::Reconciler;
use crate::store::ObjectStore;
use crate::types::ObjectKey;

use super::message::{Trigger, WorkerMessage};
use super::worker::{ClusterWorker, WorkerConfig, WorkerExit};

/// Errors that can occur during dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The freshly spawned worker for a cluster went away immediately.
    #[error("failed to send message to worker for {0}: channel closed")]
    ChannelClosed(ObjectKey),

    /// The dispatcher is shutting down and spawns no new workers.
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Channel buffer size for worker messages.
///
/// A full buffer means the worker already has a pass queued, which covers
/// any further trigger, so sends never wait.
const WORKER_CHANNEL_BUFFER: usize = 16;

struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    task: JoinHandle<WorkerExit>,
    cancel: CancellationToken,
}

/// Routes triggers to per-cluster workers.
pub struct Dispatcher<S> {
    reconciler: Reconciler<S>,
    config: WorkerConfig,

    /// Workers keyed by cluster.
    workers: RwLock<HashMap<ObjectKey, WorkerHandle>>,

    /// Global shutdown token; each worker gets a child token.
    shutdown: CancellationToken,
}

impl<S: ObjectStore> Dispatcher<S> {
    pub fn new(reconciler: Reconciler<S>, config: WorkerConfig) -> Self {
        Self::new_with_shutdown(reconciler, config, CancellationToken::new())
    }

    pub fn new_with_shutdown(
        reconciler: Reconciler<S>,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        info!(
            resync_interval = ?config.resync.interval,
            "Creating dispatcher"
        );

        Dispatcher {
            reconciler,
            config,
            workers: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests a pass for `cluster`, spawning its worker if needed.
    #[instrument(skip(self, cluster, trigger), fields(cluster = %cluster, %trigger))]
    pub async fn trigger(&self, cluster: &ObjectKey, trigger: Trigger) -> Result<()> {
        let tx = self.get_or_spawn_worker(cluster).await?;
        match tx.try_send(WorkerMessage::Reconcile(trigger)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!("Worker already has triggers queued");
                Ok(())
            }
            Err(TrySendError::Closed(WorkerMessage::Reconcile(trigger))) => {
                debug!("Worker has exited, respawning");
                let tx = self.respawn_worker(cluster).await?;
                tx.try_send(WorkerMessage::Reconcile(trigger))
                    .map_err(|_| DispatchError::ChannelClosed(cluster.clone()))
            }
            Err(TrySendError::Closed(_)) => Err(DispatchError::ChannelClosed(cluster.clone())),
        }
    }

    /// Gets a live worker's sender or spawns a new worker task.
    async fn get_or_spawn_worker(
        &self,
        cluster: &ObjectKey,
    ) -> Result<mpsc::Sender<WorkerMessage>> {
        {
            let workers = self.workers.read().await;
            if let Some(handle) = workers.get(cluster)
                && !handle.tx.is_closed()
            {
                return Ok(handle.tx.clone());
            }
        }

        let mut workers = self.workers.write().await;

        // Double-check after acquiring write lock
        if let Some(handle) = workers.get(cluster)
            && !handle.tx.is_closed()
        {
            return Ok(handle.tx.clone());
        }

        self.spawn_worker(&mut workers, cluster)
    }

    /// Replaces the worker for `cluster` unless another caller already did.
    async fn respawn_worker(
        &self,
        cluster: &ObjectKey,
    ) -> Result<mpsc::Sender<WorkerMessage>> {
        let mut workers = self.workers.write().await;
        if let Some(handle) = workers.get(cluster)
            && !handle.tx.is_closed()
        {
            return Ok(handle.tx.clone());
        }
        self.spawn_worker(&mut workers, cluster)
    }

    fn spawn_worker(
        &self,
        workers: &mut HashMap<ObjectKey, WorkerHandle>,
        cluster: &ObjectKey,
    ) -> Result<mpsc::Sender<WorkerMessage>> {
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }

        debug!(%cluster, "Spawning new worker task");
        let worker = ClusterWorker::new(
            cluster.clone(),
            self.reconciler.clone(),
            self.config.clone(),
        );

        // Use the same token for the worker task and the handle so that
        // remove_worker() cancels the right worker.
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_BUFFER);
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(worker.run(rx, cancel.clone()));

        let previous = workers.insert(
            cluster.clone(),
            WorkerHandle {
                tx: tx.clone(),
                task,
                cancel,
            },
        );
        if let Some(previous) = previous {
            // The channel is closed, so the task has ended or is ending.
            previous.cancel.cancel();
        }

        Ok(tx)
    }

    /// Returns the number of workers with an open channel.
    pub async fn worker_count(&self) -> usize {
        self.workers
            .read()
            .await
            .values()
            .filter(|handle| !handle.tx.is_closed())
            .count()
    }

    /// Checks if a live worker exists for `cluster`.
    pub async fn has_worker(&self, cluster: &ObjectKey) -> bool {
        self.workers
            .read()
            .await
            .get(cluster)
            .is_some_and(|handle| !handle.tx.is_closed())
    }

    /// Stops and forgets the worker for `cluster`.
    pub async fn remove_worker(&self, cluster: &ObjectKey) -> bool {
        let mut workers = self.workers.write().await;
        if let Some(handle) = workers.remove(cluster) {
            handle.cancel.cancel();
            let _ = handle.tx.try_send(WorkerMessage::Shutdown);
            true
        } else {
            false
        }
    }

    /// Drops handles of workers that have exited.
    pub async fn prune(&self) -> usize {
        let mut workers = self.workers.write().await;
        let before = workers.len();
        workers.retain(|_, handle| !handle.tx.is_closed());
        before - workers.len()
    }

    /// Signals every worker to stop and waits for them to finish their
    /// current pass.
    pub async fn shutdown_all(&self) {
        info!("Shutting down all workers");
        self.shutdown.cancel();

        let handles: Vec<_> = self.workers.write().await.drain().collect();
        for (cluster, handle) in handles {
            trace!(%cluster, "Waiting for worker");
            let _ = handle.tx.try_send(WorkerMessage::Shutdown);
            if let Err(e) = handle.task.await {
                warn!(%cluster, error = %e, "Worker task panicked");
            }
        }
    }
}
