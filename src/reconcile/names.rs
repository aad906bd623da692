//! Deterministic task names, well-known paths, and fixed command lines.
//!
//! Every task name is a function of the cluster name and the task's purpose,
//! so re-deriving a task on any pass yields the same identity.

use crate::types::{Cluster, ClusterMember};

/// Where the rendered kubeadm configuration is written.
pub const KUBEADM_CONFIG_PATH: &str = "/root/kubeadm-config.yaml";

/// The admin kubeconfig written by `kubeadm init`.
pub const ADMIN_CONF_PATH: &str = "/etc/kubernetes/admin.conf";

/// Pod network add-on, applied with the admin kubeconfig.
pub const NETWORKING_COMMAND: &str = "KUBECONFIG=/etc/kubernetes/admin.conf kubectl apply -f https://cloud.weave.works/k8s/v1.10/net.yaml";

/// `kubeadm init` against the rendered configuration.
pub fn init_command() -> String {
    format!("kubeadm init --config={KUBEADM_CONFIG_PATH} --ignore-preflight-errors=all")
}

/// Node tasks are named after the member itself.
pub fn node_task(member: &ClusterMember) -> String {
    member.name.clone()
}

pub fn kubeadm_config_task(cluster: &Cluster) -> String {
    format!("{}-kubeadm-config", cluster.name())
}

pub fn init_command_task(cluster: &Cluster, bootstrap: &ClusterMember) -> String {
    format!("{}-kubeadm-{}", cluster.name(), bootstrap.name)
}

pub fn admin_conf_task(cluster: &Cluster) -> String {
    format!("{}-adminconf", cluster.name())
}

pub fn pki_task(cluster: &Cluster, suffix: &str) -> String {
    format!("{}-pki-{}", cluster.name(), suffix)
}

pub fn networking_task(cluster: &Cluster) -> String {
    format!("{}-networking", cluster.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterSpec, ObjectKey};

    fn cluster() -> Cluster {
        Cluster::new(&ObjectKey::new("infra", "prod"), ClusterSpec::default())
    }

    #[test]
    fn task_names_embed_cluster_name() {
        let c = cluster();
        let bootstrap = ClusterMember::new("c1", "10.0.0.1");

        assert_eq!(kubeadm_config_task(&c), "prod-kubeadm-config");
        assert_eq!(init_command_task(&c, &bootstrap), "prod-kubeadm-c1");
        assert_eq!(admin_conf_task(&c), "prod-adminconf");
        assert_eq!(pki_task(&c, "cacert"), "prod-pki-cacert");
        assert_eq!(networking_task(&c), "prod-networking");
        assert_eq!(node_task(&bootstrap), "c1");
    }

    #[test]
    fn init_command_uses_config_path() {
        assert_eq!(
            init_command(),
            "kubeadm init --config=/root/kubeadm-config.yaml --ignore-preflight-errors=all"
        );
    }
}
