//! Messages sent to a per-cluster worker.

use std::fmt;

use crate::types::Kind;

/// Why a pass was requested. Only used for logging; every pass does the same
/// work regardless of its trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The cluster object itself changed.
    ClusterChanged,
    /// A task owned by the cluster changed or was deleted.
    TaskChanged { kind: Kind, name: String },
    /// Full resync (controller start or a lagged watch).
    Resync,
    /// Retry of a failed pass after backoff.
    Retry,
    /// Periodic resync by the worker's own timer.
    Periodic,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::ClusterChanged => f.write_str("cluster changed"),
            Trigger::TaskChanged { kind, name } => write!(f, "{kind} {name} changed"),
            Trigger::Resync => f.write_str("resync"),
            Trigger::Retry => f.write_str("retry"),
            Trigger::Periodic => f.write_str("periodic"),
        }
    }
}

/// Messages a worker receives over its channel.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run a pass. Triggers queued while a pass runs collapse into one pass.
    Reconcile(Trigger),

    /// Stop after the current pass.
    Shutdown,
}
