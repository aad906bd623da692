//! The unit of storage: a cluster or a task.

use serde::{Deserialize, Serialize};

use super::cluster::Cluster;
use super::ids::{Kind, ObjectKey, ResourceVersion};
use super::meta::ObjectMeta;
use super::task::Task;

/// Anything the object store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Object {
    Cluster(Cluster),
    Task(Task),
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Cluster(_) => Kind::Cluster,
            Object::Task(task) => task.kind(),
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Cluster(cluster) => &cluster.metadata,
            Object::Task(task) => &task.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Cluster(cluster) => &mut cluster.metadata,
            Object::Task(task) => &mut task.metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata().key()
    }

    pub fn resource_version(&self) -> ResourceVersion {
        self.metadata().resource_version
    }

    pub fn into_cluster(self) -> Option<Cluster> {
        match self {
            Object::Cluster(cluster) => Some(cluster),
            Object::Task(_) => None,
        }
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            Object::Task(task) => Some(task),
            Object::Cluster(_) => None,
        }
    }
}

impl From<Cluster> for Object {
    fn from(cluster: Cluster) -> Self {
        Object::Cluster(cluster)
    }
}

impl From<Task> for Object {
    fn from(task: Task) -> Self {
        Object::Task(task)
    }
}
