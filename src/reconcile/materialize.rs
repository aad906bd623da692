//! Derivation and rendering of the kubeadm configuration document.

use serde_yaml::{Mapping, Value};

use crate::types::{Cluster, ClusterConfiguration};

/// Derives the kubeadm configuration for a cluster.
///
/// The control-plane endpoint is the bootstrap controller's address; there is
/// no load-balanced endpoint. Everything kubeadm can default is left empty.
/// Returns `None` for a cluster without controllers.
pub fn derive_config(cluster: &Cluster) -> Option<ClusterConfiguration> {
    let bootstrap = cluster.bootstrap_controller()?;
    Some(ClusterConfiguration {
        control_plane_endpoint: bootstrap.ip.clone(),
        kubernetes_version: cluster.spec.version.clone(),
        ..ClusterConfiguration::default()
    })
}

/// Renders a configuration to the YAML text written to the bootstrap
/// controller. Equal configurations always render to identical text.
///
/// Mapping keys are sorted at every level, so the text does not depend on
/// field declaration order.
pub fn render_config(config: &ClusterConfiguration) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&sort_keys(serde_yaml::to_value(config)?))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(Value, Value)> = mapping
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(&b.as_str()));
            Value::Mapping(entries.into_iter().collect::<Mapping>())
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterMember, ClusterSpec, ObjectKey};

    fn cluster(controllers: Vec<ClusterMember>) -> Cluster {
        Cluster::new(
            &ObjectKey::new("infra", "prod"),
            ClusterSpec {
                controllers,
                workers: vec![ClusterMember::new("w1", "10.0.1.1")],
                default_ssh_key_secret: "ssh-key".to_string(),
                version: "v1.13.1".to_string(),
            },
        )
    }

    #[test]
    fn endpoint_is_first_controller() {
        let config = derive_config(&cluster(vec![
            ClusterMember::new("c1", "192.168.0.200"),
            ClusterMember::new("c2", "192.168.0.201"),
        ]))
        .unwrap();

        assert_eq!(config.control_plane_endpoint, "192.168.0.200");
        assert_eq!(config.kubernetes_version, "v1.13.1");
    }

    #[test]
    fn no_controllers_derives_nothing() {
        assert!(derive_config(&cluster(vec![])).is_none());
    }

    #[test]
    fn derivation_is_deterministic() {
        let c = cluster(vec![ClusterMember::new("c1", "192.168.0.200")]);
        assert_eq!(derive_config(&c), derive_config(&c));
    }

    #[test]
    fn renders_kubeadm_document() {
        let config =
            derive_config(&cluster(vec![ClusterMember::new("c1", "192.168.0.200")])).unwrap();

        let yaml = render_config(&config).unwrap();

        assert_eq!(
            yaml,
            "\
apiServer: {}
apiVersion: kubeadm.k8s.io/v1beta1
certificatesDir: ''
controlPlaneEndpoint: 192.168.0.200
controllerManager: {}
dns:
  type: ''
etcd: {}
imageRepository: ''
kind: ClusterConfiguration
kubernetesVersion: v1.13.1
networking:
  dnsDomain: ''
  podSubnet: ''
  serviceSubnet: ''
scheduler: {}
"
        );
    }

    #[test]
    fn rendered_document_parses_back() {
        let config =
            derive_config(&cluster(vec![ClusterMember::new("c1", "192.168.0.200")])).unwrap();

        let yaml = render_config(&config).unwrap();
        let back: ClusterConfiguration = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value: Value = serde_yaml::from_str(
            "zeta: 1\nalpha:\n  - {mid: x, beta: y}\n  - plain\nmid: {z: 1, a: 2}\n",
        )
        .unwrap();

        let sorted = serde_yaml::to_string(&sort_keys(value)).unwrap();

        assert_eq!(
            sorted,
            "\
alpha:
- beta: y
  mid: x
- plain
mid:
  a: 2
  z: 1
zeta: 1
"
        );
    }
}
