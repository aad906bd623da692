use tracing::instrument;

use crate::reconcile::error::Result;
use crate::reconcile::names;
use crate::reconcile::pass::Pass;
use crate::reconcile::status::StepOutcome;
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, CommandSpec, Requires, TaskResult};

/// Converges the pod network add-on command on the bootstrap controller.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn run<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let task = pass.task(
        names::networking_task(pass.cluster),
        CommandSpec {
            host: pass.bootstrap.name.clone(),
            command: names::NETWORKING_COMMAND.to_string(),
            requires: Some(Requires::Command(names::init_command_task(
                pass.cluster,
                pass.bootstrap,
            ))),
            result: TaskResult::default(),
        },
    );
    pass.converge(task).await?;

    Ok(StepOutcome::unchanged(status))
}
