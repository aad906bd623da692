use tracing::instrument;

use crate::reconcile::error::Result;
use crate::reconcile::names;
use crate::reconcile::pass::Pass;
use crate::reconcile::status::StepOutcome;
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, NodeSpec, SSH_PORT};

/// Ensures every member, controllers first, has a Node task.
///
/// Existing Node tasks are not corrected: a changed address is expected to
/// come in as a new member.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn run<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let cluster = pass.cluster;
    for member in cluster.spec.members() {
        let task = pass.task(
            names::node_task(member),
            NodeSpec {
                address: member.ip.clone(),
                port: SSH_PORT,
                ssh_key_secret: cluster.spec.default_ssh_key_secret.clone(),
            },
        );
        pass.ensure(task).await?;
    }

    Ok(StepOutcome::unchanged(status))
}
