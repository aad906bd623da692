//! Per-pass context shared by the steps, and the two task-writing patterns.
//!
//! - [`Pass::ensure`] is create-if-absent: an existing task is never touched.
//!   An existing task owned by another cluster fails the pass.
//! - [`Pass::converge`] is create-or-overwrite of the operator-owned fields.
//!
//! Both record the task as derived in this pass. A task whose `Requires`
//! names a task not yet derived is a bug in the step graph and panics.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::error::{ReconcileError, Result};
use crate::store::{self, ObjectStore};
use crate::types::{Cluster, ClusterMember, Kind, Object, ObjectMeta, Task, TaskSpec};

/// Outcome of [`Pass::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured {
    Created,
    /// The task already existed; this is its stored state.
    Existing(Task),
    /// Another writer created it between our read and our create.
    Raced,
}

/// Outcome of [`Pass::converge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converged {
    Created,
    Updated,
    Unchanged,
    Raced,
}

pub(crate) struct Pass<'a, S: ?Sized> {
    pub store: &'a S,
    pub cluster: &'a Cluster,
    pub bootstrap: &'a ClusterMember,
    derived: BTreeSet<(Kind, String)>,
}

impl<'a, S: ObjectStore + ?Sized> Pass<'a, S> {
    /// Starts a pass. `None` if the cluster has no controller to bootstrap.
    pub fn new(store: &'a S, cluster: &'a Cluster) -> Option<Self> {
        Some(Pass {
            store,
            cluster,
            bootstrap: cluster.bootstrap_controller()?,
            derived: BTreeSet::new(),
        })
    }

    /// Builds a task owned by this pass's cluster.
    pub fn task(&self, name: String, spec: impl Into<TaskSpec>) -> Task {
        Task::new(ObjectMeta::owned_by(&self.cluster.key(), name), spec)
    }

    /// Reads a task of this cluster without deriving it.
    pub async fn read(&self, kind: Kind, name: &str) -> Result<Option<Task>> {
        let key = self.cluster.key().sibling(name);
        store::get_task(self.store, kind, &key)
            .await
            .map_err(|e| ReconcileError::store(format!("reading {kind} {key}"), e))
    }

    /// Creates `task` unless a task with its kind and name already exists.
    pub async fn ensure(&mut self, task: Task) -> Result<Ensured> {
        self.note_derived(&task);
        let (kind, key) = (task.kind(), task.key());

        if let Some(existing) = self.read(kind, task.name()).await? {
            let owner = existing.metadata.owner_key();
            if owner.as_ref() != Some(&self.cluster.key()) {
                return Err(ReconcileError::ForeignTask {
                    kind,
                    key,
                    cluster: self.cluster.key(),
                    owner,
                });
            }
            return Ok(Ensured::Existing(existing));
        }

        match self.store.create(Object::from(task)).await {
            Ok(_) => {
                info!(cluster = %self.cluster.key(), %kind, task = %key.name, "Created task");
                Ok(Ensured::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(%kind, task = %key.name, "Task created concurrently");
                Ok(Ensured::Raced)
            }
            Err(e) => Err(ReconcileError::store(format!("creating {kind} {key}"), e)),
        }
    }

    /// Makes the stored task's declarative fields equal to `task`'s.
    ///
    /// An unchanged task keeps its result. A drifted task is overwritten and
    /// its result cleared, since the result described different work.
    pub async fn converge(&mut self, task: Task) -> Result<Converged> {
        let existing = match self.ensure(task.clone()).await? {
            Ensured::Created => return Ok(Converged::Created),
            Ensured::Raced => return Ok(Converged::Raced),
            Ensured::Existing(existing) => existing,
        };

        if existing.spec.declarative() == task.spec.declarative() {
            return Ok(Converged::Unchanged);
        }

        let (kind, key) = (task.kind(), task.key());
        let updated = Task {
            metadata: existing.metadata,
            spec: task.spec.declarative(),
        };
        self.store
            .update(Object::from(updated))
            .await
            .map_err(|e| ReconcileError::store(format!("overwriting drifted {kind} {key}"), e))?;

        info!(cluster = %self.cluster.key(), %kind, task = %key.name, "Restored drifted task");
        Ok(Converged::Updated)
    }

    fn note_derived(&mut self, task: &Task) {
        if let Some(requires) = task.requires() {
            assert!(
                self.derived
                    .contains(&(requires.kind(), requires.name().to_string())),
                "{} {} requires {} {} which has not been derived",
                task.kind(),
                task.name(),
                requires.kind(),
                requires.name(),
            );
        }
        self.derived.insert((task.kind(), task.name().to_string()));
    }
}
