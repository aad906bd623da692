use tracing::{instrument, warn};

use crate::reconcile::error::Result;
use crate::reconcile::names;
use crate::reconcile::parse::parse_init_output;
use crate::reconcile::pass::Pass;
use crate::reconcile::status::{Fact, StepOutcome};
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, Kind, TaskSpec};

/// Records the join token and discovery hash printed by `kubeadm init`.
///
/// Only reads the init command; an absent or unfinished command is the normal
/// state while initialization runs.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn run<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::unchanged(status);

    let name = names::init_command_task(pass.cluster, pass.bootstrap);
    let Some(task) = pass.read(Kind::Command, &name).await? else {
        return Ok(outcome);
    };
    let TaskSpec::Command(command) = task.spec else {
        return Ok(outcome);
    };
    if !command.result.done {
        return Ok(outcome);
    }

    let creds = parse_init_output(&command.result.output);
    if creds.is_empty() {
        warn!(task = %name, "No join instruction found in init output");
        return Ok(outcome);
    }

    outcome.record(Fact::JoinToken, &creds.token);
    outcome.record(Fact::DiscoveryHash, &creds.discovery_hash);
    Ok(outcome)
}
