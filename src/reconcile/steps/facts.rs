//! Harvesting of file contents from the bootstrap controller.
//!
//! Each fact has its own FactFile task, gated on `kubeadm init`. A fact is
//! recorded only once its task is done; until then the previous value stays.

use tracing::{debug, instrument};

use crate::reconcile::error::Result;
use crate::reconcile::names;
use crate::reconcile::pass::{Ensured, Pass};
use crate::reconcile::status::{Fact, PkiArtifact, StepOutcome};
use crate::store::ObjectStore;
use crate::types::{ClusterStatus, FactFileSpec, Requires, TaskResult, TaskSpec};

#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn admin_conf<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::unchanged(status);
    let name = names::admin_conf_task(pass.cluster);
    harvest(pass, &mut outcome, name, names::ADMIN_CONF_PATH, Fact::AdminConf).await?;
    Ok(outcome)
}

/// Harvests every PKI artifact independently; some may be done while others
/// are still pending.
#[instrument(skip_all, fields(cluster = %pass.cluster.key()))]
pub(crate) async fn pki<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    status: ClusterStatus,
) -> Result<StepOutcome> {
    let mut outcome = StepOutcome::unchanged(status);
    for artifact in PkiArtifact::ALL {
        let name = names::pki_task(pass.cluster, artifact.suffix());
        harvest(pass, &mut outcome, name, artifact.path(), Fact::Pki(artifact)).await?;
    }
    Ok(outcome)
}

async fn harvest<S: ObjectStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    outcome: &mut StepOutcome,
    name: String,
    path: &str,
    fact: Fact,
) -> Result<()> {
    let task = pass.task(
        name,
        FactFileSpec {
            host: pass.bootstrap.name.clone(),
            path: path.to_string(),
            requires: Some(Requires::Command(names::init_command_task(
                pass.cluster,
                pass.bootstrap,
            ))),
            result: TaskResult::default(),
        },
    );

    let Ensured::Existing(existing) = pass.ensure(task).await? else {
        return Ok(());
    };
    match existing.spec {
        TaskSpec::FactFile(file) if file.result.done => {
            outcome.record(fact, &file.result.output);
        }
        _ => debug!(task = %existing.metadata.name, "Fact not captured yet"),
    }
    Ok(())
}
