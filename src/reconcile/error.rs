use thiserror::Error;

use crate::store::StoreError;
use crate::types::{Kind, ObjectKey};

/// Failure of a reconciliation pass.
///
/// Any of these aborts the remaining steps of the pass. Writes already made by
/// earlier steps are kept; the whole pass is retried later.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store operation failed. `context` names what was being processed.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    /// The kubeadm configuration could not be rendered.
    #[error("rendering kubeadm config for {cluster}: {source}")]
    Render {
        cluster: ObjectKey,
        #[source]
        source: serde_yaml::Error,
    },

    /// A task this cluster derives already exists under another owner.
    /// Adopting it would point this cluster's work at someone else's node.
    #[error("{kind} {key} is needed by cluster {cluster} but owned by {}", owner_name(.owner))]
    ForeignTask {
        kind: Kind,
        key: ObjectKey,
        cluster: ObjectKey,
        owner: Option<ObjectKey>,
    },
}

fn owner_name(owner: &Option<ObjectKey>) -> String {
    owner
        .as_ref()
        .map_or_else(|| "no cluster".to_string(), ToString::to_string)
}

impl ReconcileError {
    pub(crate) fn store(context: impl Into<String>, source: StoreError) -> Self {
        ReconcileError::Store {
            context: context.into(),
            source,
        }
    }

    /// True if the pass lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store { source, .. } if source.is_conflict())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
