//! The reconciliation loop.
//!
//! A pass loads the cluster, runs every step in [`PIPELINE`] order, and writes
//! the status back once if any step changed it. The write is a
//! compare-and-write against the version read at the start of the pass, so
//! overlapping passes cannot silently lose each other's updates.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::error::{ReconcileError, Result};
use super::graph::{PIPELINE, Step};
use super::pass::Pass;
use super::status::StepOutcome;
use super::steps;
use crate::store::{self, ObjectStore};
use crate::types::{ClusterStatus, Object, ObjectKey, ResourceVersion};

/// What a completed pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The cluster does not exist (any more).
    Missing,
    /// The cluster declares no controllers, so there is nothing to bootstrap.
    NoControllers,
    /// Every step ran and no status field changed.
    Unchanged,
    /// Status was written; the cluster is now at this version.
    StatusUpdated(ResourceVersion),
}

/// Runs reconciliation passes against a store.
#[derive(Debug)]
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Reconciler {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Reconciler { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs one pass for the cluster at `key`.
    ///
    /// Safe to call repeatedly: with no external change, a pass after the
    /// first writes nothing. Callers must not run two passes for the same
    /// cluster at once.
    #[instrument(skip(self, key), fields(cluster = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome> {
        let store = &*self.store;
        let cluster = store::get_cluster(store, key)
            .await
            .map_err(|e| ReconcileError::store(format!("reading cluster {key}"), e))?;

        let Some(cluster) = cluster else {
            debug!("Cluster is gone");
            return Ok(PassOutcome::Missing);
        };

        let Some(mut pass) = Pass::new(store, &cluster) else {
            warn!("Cluster declares no controllers; nothing to bootstrap");
            return Ok(PassOutcome::NoControllers);
        };

        let mut outcome = StepOutcome::unchanged(cluster.status.clone());
        for &step in PIPELINE.iter() {
            let next = run_step(step, &mut pass, outcome.status.clone()).await?;
            if next.changed {
                debug!(%step, "Step changed status");
            }
            outcome = outcome.fold(next);
        }

        if !outcome.changed {
            debug!("Status unchanged");
            return Ok(PassOutcome::Unchanged);
        }

        let mut updated = cluster.clone();
        updated.status = outcome.status;
        let stored = store
            .update(Object::from(updated))
            .await
            .map_err(|e| ReconcileError::store(format!("writing status of cluster {key}"), e))?;

        info!(version = %stored.resource_version(), "Updated cluster status");
        Ok(PassOutcome::StatusUpdated(stored.resource_version()))
    }
}

async fn run_step<S: ObjectStore + ?Sized>(
    step: Step,
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    match step {
        Step::Nodes => steps::nodes::run(pass, status).await,
        Step::KubeadmConfig => steps::kubeadm_config::run(pass, status).await,
        Step::InitCommand => steps::init::run(pass, status).await,
        Step::AdminConf => steps::facts::admin_conf(pass, status).await,
        Step::Pki => steps::facts::pki(pass, status).await,
        Step::JoinToken => steps::join_token::run(pass, status).await,
        Step::Networking => steps::networking::run(pass, status).await,
    }
}
