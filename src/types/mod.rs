//! Core domain types for the operator.
//!
//! Clusters describe desired members and carry observed bootstrap facts;
//! tasks are the declarative units of remote work derived from them.

pub mod cluster;
pub mod ids;
pub mod kubeadm;
pub mod meta;
pub mod object;
pub mod task;

// Re-export commonly used types at the module level
pub use cluster::{
    Cluster, ClusterMember, ClusterSpec, ClusterStatus, ControllerStatus, PkiStatus, WorkerStatus,
};
pub use ids::{Kind, ObjectKey, ResourceVersion, UnknownKind};
pub use kubeadm::ClusterConfiguration;
pub use meta::ObjectMeta;
pub use object::Object;
pub use task::{
    CommandSpec, ConfigFileSpec, FactFileSpec, NodeSpec, Requires, SSH_PORT, Task, TaskResult,
    TaskSpec,
};
