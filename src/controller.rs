//! Watch-driven trigger source.
//!
//! The controller subscribes to every kind in the store and turns each change
//! into a trigger for the owning cluster: cluster events trigger that cluster,
//! task events trigger the cluster named in the task's owner. Tasks without
//! an owner belong to no cluster and are ignored.
//!
//! On start, and whenever the watch reports that events were missed, every
//! cluster is triggered once.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::store::{self, ObjectStore, StoreError, WatchEvent};
use crate::types::{Kind, ObjectKey};
use crate::worker::{DispatchError, Dispatcher, Trigger};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("listing clusters for resync: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

/// Maps a store event to the cluster it concerns and why.
///
/// `Lagged` maps to nothing; it calls for a full resync instead.
pub fn route(event: &WatchEvent) -> Option<(ObjectKey, Trigger)> {
    let (kind, key, owner) = match event {
        WatchEvent::Applied { kind, key, owner } | WatchEvent::Deleted { kind, key, owner } => {
            (*kind, key, owner)
        }
        WatchEvent::Lagged(_) => return None,
    };

    match kind {
        Kind::Cluster => Some((key.clone(), Trigger::ClusterChanged)),
        kind => owner.clone().map(|owner| {
            (
                owner,
                Trigger::TaskChanged {
                    kind,
                    name: key.name.clone(),
                },
            )
        }),
    }
}

/// Feeds store changes to the dispatcher.
pub struct Controller<S> {
    store: Arc<S>,
    dispatcher: Arc<Dispatcher<S>>,
}

impl<S: ObjectStore> Controller<S> {
    pub fn new(store: Arc<S>, dispatcher: Arc<Dispatcher<S>>) -> Self {
        Controller { store, dispatcher }
    }

    /// Runs until `shutdown` fires or the store goes away.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        // Subscribe before listing so nothing between the two is missed.
        let mut watch = self.store.watch(&Kind::ALL);
        let count = self.resync_all().await?;
        info!(clusters = count, "Controller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping controller");
                    break;
                }
                event = watch.next() => match event {
                    Some(event) => self.handle(event).await?,
                    None => {
                        warn!("Store watch closed, stopping controller");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Reacts to one store event.
    pub async fn handle(&self, event: WatchEvent) -> Result<()> {
        if let WatchEvent::Lagged(missed) = event {
            warn!(missed, "Watch fell behind, resyncing every cluster");
            self.resync_all().await?;
            return Ok(());
        }

        match route(&event) {
            Some((cluster, trigger)) => self.dispatch(&cluster, trigger).await,
            None => trace!(?event, "Event concerns no cluster"),
        }
        Ok(())
    }

    /// Triggers every cluster once. Returns how many were triggered.
    pub async fn resync_all(&self) -> Result<usize> {
        let keys = store::list_cluster_keys(&*self.store).await?;
        for key in &keys {
            self.dispatch(key, Trigger::Resync).await;
        }
        Ok(keys.len())
    }

    async fn dispatch(&self, cluster: &ObjectKey, trigger: Trigger) {
        match self.dispatcher.trigger(cluster, trigger).await {
            Ok(()) => {}
            Err(DispatchError::ShuttingDown) => debug!(%cluster, "Dropping trigger during shutdown"),
            Err(e) => warn!(%cluster, error = %e, "Failed to dispatch trigger"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::reconcile::Reconciler;
    use crate::store::{MemoryStore, get_cluster};
    use crate::test_utils::*;
    use crate::worker::WorkerConfig;

    fn setup() -> (Arc<MemoryStore>, Arc<Dispatcher<MemoryStore>>, Controller<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Reconciler::new(Arc::clone(&store)),
            WorkerConfig::default().with_resync_interval(Duration::from_secs(3600)),
        ));
        let controller = Controller::new(Arc::clone(&store), Arc::clone(&dispatcher));
        (store, dispatcher, controller)
    }

    async fn eventually<F, Fut>(mut check: F)
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

    #[test]
    fn cluster_events_route_to_the_cluster() {
        let event = WatchEvent::Applied {
            kind: Kind::Cluster,
            key: cluster_key(),
            owner: None,
        };
        assert_eq!(route(&event), Some((cluster_key(), Trigger::ClusterChanged)));
    }

    #[test]
    fn task_events_route_to_the_owner() {
        let event = WatchEvent::Deleted {
            kind: Kind::FactFile,
            key: cluster_key().sibling("prod-adminconf"),
            owner: Some(cluster_key()),
        };
        assert_eq!(
            route(&event),
            Some((
                cluster_key(),
                Trigger::TaskChanged {
                    kind: Kind::FactFile,
                    name: "prod-adminconf".to_string(),
                }
            ))
        );
    }

    #[test]
    fn unowned_tasks_and_lag_route_nowhere() {
        let event = WatchEvent::Applied {
            kind: Kind::Node,
            key: ObjectKey::new("infra", "stray"),
            owner: None,
        };
        assert_eq!(route(&event), None);
        assert_eq!(route(&WatchEvent::Lagged(12)), None);
    }

    #[tokio::test]
    async fn lagged_watch_resyncs_every_cluster() {
        let (store, dispatcher, controller) = setup();
        let prod = ObjectKey::new("infra", "prod");
        let dev = ObjectKey::new("infra", "dev");
        create_cluster(&*store, &prod, single_controller_spec()).await;
        create_cluster(&*store, &dev, single_controller_spec()).await;

        controller.handle(WatchEvent::Lagged(100)).await.unwrap();

        assert!(dispatcher.has_worker(&prod).await);
        assert!(dispatcher.has_worker(&dev).await);
        dispatcher.shutdown_all().await;
    }

    #[tokio::test]
    async fn drives_a_cluster_to_fully_bootstrapped() {
        let (store, dispatcher, controller) = setup();
        let shutdown = CancellationToken::new();
        let controller = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { controller.run(shutdown).await }
        });

        create_cluster(&*store, &cluster_key(), single_controller_spec()).await;
        eventually(|| async { all_tasks(&*store).await.len() == 13 }).await;

        complete_bootstrap(&*store).await;
        eventually(|| async {
            get_cluster(&*store, &cluster_key())
                .await
                .unwrap()
                .is_some_and(|c| {
                    c.status.join_token == TOKEN
                        && c.status.pki.etcd_key == "content of /etc/kubernetes/pki/etcd/ca.key"
                })
        })
        .await;

        shutdown.cancel();
        controller.await.unwrap().unwrap();
        dispatcher.shutdown_all().await;
    }

    #[tokio::test]
    async fn existing_clusters_are_reconciled_on_start() {
        let (store, dispatcher, controller) = setup();
        create_cluster(&*store, &cluster_key(), single_controller_spec()).await;

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { controller.run(shutdown).await }
        });

        eventually(|| async {
            get_cluster(&*store, &cluster_key())
                .await
                .unwrap()
                .is_some_and(|c| c.status.kubeadm_config.is_some())
        })
        .await;

        shutdown.cancel();
        handle.await.unwrap().unwrap();
        dispatcher.shutdown_all().await;
    }
}
