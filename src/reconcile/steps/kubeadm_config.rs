use tracing::instrument;

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::materialize::{derive_config, render_config};
use crate::reconcile::names;
use crate::reconcile::pass::Pass;
use crate::reconcile::status::StepOutcome;
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, ConfigFileSpec};

/// Records the derived kubeadm configuration and converges the ConfigFile
/// that writes it to the bootstrap controller.
///
/// The file has no `Requires`; it is the root of the task graph.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn run<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::unchanged(status);
    if let Some(config) = derive_config(pass.cluster) {
        outcome.record_kubeadm_config(config);
    }

    let Some(config) = outcome.status.kubeadm_config.as_ref() else {
        return Ok(outcome);
    };
    let content = render_config(config).map_err(|source| ReconcileError::Render {
        cluster: pass.cluster.key(),
        source,
    })?;

    let task = pass.task(
        names::kubeadm_config_task(pass.cluster),
        ConfigFileSpec {
            host: pass.bootstrap.name.clone(),
            path: names::KUBEADM_CONFIG_PATH.to_string(),
            content,
            requires: None,
        },
    );
    pass.converge(task).await?;

    Ok(outcome)
}
