//! Cluster reconciliation.
//!
//! A pass derives the tasks that bootstrap a cluster from its spec, creates
//! the missing ones, and folds completed task results back into the
//! cluster's status. Passes are level-triggered: they never wait for remote
//! work, they only read results the executor has already written.
//!
//! # Module Organization
//!
//! - `engine`: the loop ([`Reconciler::reconcile`])
//! - `graph`: step dependencies and the order steps run in
//! - `steps`: one module per step
//! - `pass`: per-pass context and the create-if-absent / converge patterns
//! - `status`: folding of per-step status outcomes
//! - `materialize`: the kubeadm configuration document
//! - `parse`: join credentials from `kubeadm init` output
//! - `names`: task names, paths, and command lines

pub mod engine;
pub mod error;
pub mod graph;
pub mod materialize;
pub mod names;
pub mod parse;
pub(crate) mod pass;
pub mod status;
mod steps;

pub use engine::{PassOutcome, Reconciler};
pub use error::ReconcileError;
pub use graph::{PIPELINE, Step};
pub use parse::{JoinCredentials, parse_init_output};
pub use status::{Fact, PkiArtifact, StepOutcome};
