//! kubeadm operator: bootstraps Kubernetes clusters by converging declarative
//! remote tasks.
//!
//! Each cluster object names its controllers and workers. On every pass the
//! operator derives the tasks that bootstrap the cluster (node registration,
//! kubeadm configuration, `kubeadm init`, artifact harvesting, networking),
//! creates whatever is missing, restores whatever drifted, and copies the
//! facts reported by completed tasks onto the cluster's status. Executing the
//! tasks is someone else's job: a separate executor reads them from the same
//! object store and writes results back.

pub mod config;
pub mod controller;
pub mod manifest;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
mod test_utils;
