//! The `Cluster` root object: desired members and observed bootstrap state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::ObjectKey;
use super::kubeadm::ClusterConfiguration;
use super::meta::ObjectMeta;

/// A cluster to bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub metadata: ObjectMeta,
    pub spec: ClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Cluster {
    pub fn new(key: &ObjectKey, spec: ClusterSpec) -> Self {
        Cluster {
            metadata: ObjectMeta::new(key),
            spec,
            status: ClusterStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The controller that runs `kubeadm init` and hosts every bootstrap task.
    ///
    /// Always the first declared controller; `None` if there are no controllers.
    pub fn bootstrap_controller(&self) -> Option<&ClusterMember> {
        self.spec.controllers.first()
    }
}

/// Desired state of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub controllers: Vec<ClusterMember>,
    #[serde(default)]
    pub workers: Vec<ClusterMember>,

    /// Name of the secret holding the SSH key used to reach every node.
    #[serde(rename = "defaultsshkeysecret")]
    pub default_ssh_key_secret: String,

    /// Target Kubernetes version.
    #[serde(default)]
    pub version: String,
}

impl ClusterSpec {
    /// Controllers first, then workers, each in declared order.
    pub fn members(&self) -> impl Iterator<Item = &ClusterMember> {
        self.controllers.iter().chain(self.workers.iter())
    }
}

/// A node taking part in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Logical name, unique within the cluster. Also names the node's task.
    pub name: String,
    pub ip: String,
}

impl ClusterMember {
    pub fn new(name: impl Into<String>, ip: impl Into<String>) -> Self {
        ClusterMember {
            name: name.into(),
            ip: ip.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub ready: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub ready: bool,
}

/// Contents of the PKI files harvested from the bootstrap controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkiStatus {
    #[serde(rename = "cacert")]
    pub ca_cert: String,
    #[serde(rename = "cakey")]
    pub ca_key: String,
    #[serde(rename = "saprivate")]
    pub sa_private: String,
    #[serde(rename = "sapublic")]
    pub sa_public: String,
    #[serde(rename = "frontproxykey")]
    pub front_proxy_key: String,
    #[serde(rename = "frontproxycert")]
    pub front_proxy_cert: String,
    #[serde(rename = "etcdcert")]
    pub etcd_cert: String,
    #[serde(rename = "etcdkey")]
    pub etcd_key: String,
}

/// Observed state of a cluster.
///
/// Every fact is kept until a completed task reports a different value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStatus {
    pub controllers: BTreeMap<String, ControllerStatus>,
    pub workers: BTreeMap<String, WorkerStatus>,

    /// The last materialized kubeadm configuration.
    #[serde(rename = "kubeadmconfig")]
    pub kubeadm_config: Option<ClusterConfiguration>,

    #[serde(rename = "jointoken")]
    pub join_token: String,
    #[serde(rename = "discoverytokencacerthash")]
    pub discovery_token_ca_cert_hash: String,

    /// Content of `admin.conf` from the bootstrap controller.
    #[serde(rename = "adminconf")]
    pub admin_conf: String,

    pub pki: PkiStatus,
}
