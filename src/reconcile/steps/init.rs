use tracing::instrument;

use crate::reconcile::error::Result;
use crate::reconcile::names;
use crate::reconcile::pass::{Ensured, Pass};
use crate::reconcile::status::StepOutcome;
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, CommandSpec, Requires, TaskResult};

/// Requests `kubeadm init` on the bootstrap controller once.
///
/// Once the executor reports the command done, the bootstrap controller is
/// marked ready.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn run<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::unchanged(status);

    let task = pass.task(
        names::init_command_task(pass.cluster, pass.bootstrap),
        CommandSpec {
            host: pass.bootstrap.name.clone(),
            command: names::init_command(),
            requires: Some(Requires::ConfigFile(names::kubeadm_config_task(
                pass.cluster,
            ))),
            result: TaskResult::default(),
        },
    );

    if let Ensured::Existing(existing) = pass.ensure(task).await?
        && existing.is_done()
    {
        outcome.mark_controller_ready(&pass.bootstrap.name);
    }

    Ok(outcome)
}
