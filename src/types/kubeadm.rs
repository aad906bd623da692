//! The kubeadm `ClusterConfiguration` document.
//!
//! Field names and omission rules follow `kubeadm.k8s.io/v1beta1`, since
//! kubeadm reads the rendered document directly. Maps are `BTreeMap` so the
//! rendered text is stable across passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const KUBEADM_API_VERSION: &str = "kubeadm.k8s.io/v1beta1";
pub const CLUSTER_CONFIGURATION_KIND: &str = "ClusterConfiguration";

/// Cluster-wide configuration for `kubeadm init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    pub api_version: String,
    pub kind: String,

    pub etcd: Etcd,
    pub networking: Networking,
    pub kubernetes_version: String,

    /// Stable address of the control plane, with optional port.
    pub control_plane_endpoint: String,

    #[serde(default)]
    pub api_server: ApiServer,
    #[serde(default)]
    pub controller_manager: ControlPlaneComponent,
    #[serde(default)]
    pub scheduler: ControlPlaneComponent,

    pub dns: Dns,
    pub certificates_dir: String,
    pub image_repository: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_hyper_kube_image: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
}

impl Default for ClusterConfiguration {
    fn default() -> Self {
        ClusterConfiguration {
            api_version: KUBEADM_API_VERSION.to_string(),
            kind: CLUSTER_CONFIGURATION_KIND.to_string(),
            etcd: Etcd::default(),
            networking: Networking::default(),
            kubernetes_version: String::new(),
            control_plane_endpoint: String::new(),
            api_server: ApiServer::default(),
            controller_manager: ControlPlaneComponent::default(),
            scheduler: ControlPlaneComponent::default(),
            dns: Dns::default(),
            certificates_dir: String::new(),
            image_repository: String::new(),
            use_hyper_kube_image: false,
            feature_gates: BTreeMap::new(),
            cluster_name: String::new(),
        }
    }
}

/// Settings common to control plane components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneComponent {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_volumes: Vec<HostPathMount>,
}

/// API server settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServer {
    #[serde(flatten)]
    pub component: ControlPlaneComponent,

    /// Extra Subject Alternative Names for the API server signing cert.
    #[serde(default, rename = "certSANs", skip_serializing_if = "Vec::is_empty")]
    pub cert_sans: Vec<String>,

    /// Duration string such as `4m0s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_for_control_plane: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsAddOnType {
    #[default]
    #[serde(rename = "")]
    Unset,
    CoreDNS,
    #[serde(rename = "kube-dns")]
    KubeDns,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dns {
    #[serde(rename = "type")]
    pub addon: DnsAddOnType,

    #[serde(flatten)]
    pub image: ImageMeta,
}

/// Image overrides for components outside the Kubernetes release process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_repository: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_tag: String,
}

/// Networking topology. Empty strings let kubeadm apply its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    pub service_subnet: String,
    pub pod_subnet: String,
    pub dns_domain: String,
}

/// Etcd topology. `local` and `external` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etcd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalEtcd>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalEtcd>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEtcd {
    #[serde(flatten)]
    pub image: ImageMeta,

    pub data_dir: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,

    #[serde(default, rename = "serverCertSANs", skip_serializing_if = "Vec::is_empty")]
    pub server_cert_sans: Vec<String>,

    #[serde(default, rename = "peerCertSANs", skip_serializing_if = "Vec::is_empty")]
    pub peer_cert_sans: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEtcd {
    pub endpoints: Vec<String>,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPathMount {
    pub name: String,
    pub host_path: String,
    pub mount_path: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path_type: String,
}
