//! Accumulation of status changes across the steps of one pass.
//!
//! Every step receives the status as left by the previous step and returns a
//! [`StepOutcome`]. The loop folds the outcomes; if any step reported a change
//! the final status is written back once.

use crate::types::{ClusterConfiguration, ClusterStatus, PkiStatus};

/// Status after a step, and whether any field differs from before the step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: ClusterStatus,
    pub changed: bool,
}

impl StepOutcome {
    /// An outcome that leaves `status` as it is.
    pub fn unchanged(status: ClusterStatus) -> Self {
        StepOutcome {
            status,
            changed: false,
        }
    }

    /// Combines this outcome with the outcome of the step that ran after it.
    pub fn fold(self, next: StepOutcome) -> StepOutcome {
        StepOutcome {
            status: next.status,
            changed: self.changed || next.changed,
        }
    }

    /// Sets a fact, marking the outcome changed only if the value differs.
    pub fn record(&mut self, fact: Fact, value: &str) {
        let slot = fact.slot(&mut self.status);
        if slot != value {
            *slot = value.to_string();
            self.changed = true;
        }
    }

    /// Records the materialized kubeadm configuration, compared structurally.
    pub fn record_kubeadm_config(&mut self, config: ClusterConfiguration) {
        if self.status.kubeadm_config.as_ref() != Some(&config) {
            self.status.kubeadm_config = Some(config);
            self.changed = true;
        }
    }

    pub fn mark_controller_ready(&mut self, name: &str) {
        let entry = self
            .status
            .controllers
            .entry(name.to_string())
            .or_default();
        if !entry.ready {
            entry.ready = true;
            self.changed = true;
        }
    }
}

/// A string fact harvested from the bootstrap controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fact {
    JoinToken,
    DiscoveryHash,
    AdminConf,
    Pki(PkiArtifact),
}

impl Fact {
    fn slot(self, status: &mut ClusterStatus) -> &mut String {
        match self {
            Fact::JoinToken => &mut status.join_token,
            Fact::DiscoveryHash => &mut status.discovery_token_ca_cert_hash,
            Fact::AdminConf => &mut status.admin_conf,
            Fact::Pki(artifact) => artifact.field_mut(&mut status.pki),
        }
    }
}

/// One of the PKI files copied off the bootstrap controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkiArtifact {
    CaCert,
    CaKey,
    SaPrivate,
    SaPublic,
    FrontProxyKey,
    FrontProxyCert,
    EtcdCert,
    EtcdKey,
}

impl PkiArtifact {
    pub const ALL: [PkiArtifact; 8] = [
        PkiArtifact::CaCert,
        PkiArtifact::CaKey,
        PkiArtifact::SaPrivate,
        PkiArtifact::SaPublic,
        PkiArtifact::FrontProxyKey,
        PkiArtifact::FrontProxyCert,
        PkiArtifact::EtcdCert,
        PkiArtifact::EtcdKey,
    ];

    /// Suffix of the FactFile task name, `<cluster>-pki-<suffix>`.
    pub fn suffix(self) -> &'static str {
        match self {
            PkiArtifact::CaCert => "cacert",
            PkiArtifact::CaKey => "cakey",
            PkiArtifact::SaPrivate => "sakey",
            PkiArtifact::SaPublic => "sapub",
            PkiArtifact::FrontProxyKey => "frontproxykey",
            PkiArtifact::FrontProxyCert => "frontproxycert",
            PkiArtifact::EtcdCert => "etcdcert",
            PkiArtifact::EtcdKey => "etcdkey",
        }
    }

    /// Location of the file on the bootstrap controller.
    pub fn path(self) -> &'static str {
        match self {
            PkiArtifact::CaCert => "/etc/kubernetes/pki/ca.crt",
            PkiArtifact::CaKey => "/etc/kubernetes/pki/ca.key",
            PkiArtifact::SaPrivate => "/etc/kubernetes/pki/sa.key",
            PkiArtifact::SaPublic => "/etc/kubernetes/pki/sa.pub",
            PkiArtifact::FrontProxyKey => "/etc/kubernetes/pki/front-proxy-ca.key",
            PkiArtifact::FrontProxyCert => "/etc/kubernetes/pki/front-proxy-ca.crt",
            PkiArtifact::EtcdCert => "/etc/kubernetes/pki/etcd/ca.crt",
            PkiArtifact::EtcdKey => "/etc/kubernetes/pki/etcd/ca.key",
        }
    }

    pub fn field(self, pki: &PkiStatus) -> &str {
        match self {
            PkiArtifact::CaCert => &pki.ca_cert,
            PkiArtifact::CaKey => &pki.ca_key,
            PkiArtifact::SaPrivate => &pki.sa_private,
            PkiArtifact::SaPublic => &pki.sa_public,
            PkiArtifact::FrontProxyKey => &pki.front_proxy_key,
            PkiArtifact::FrontProxyCert => &pki.front_proxy_cert,
            PkiArtifact::EtcdCert => &pki.etcd_cert,
            PkiArtifact::EtcdKey => &pki.etcd_key,
        }
    }

    pub fn field_mut(self, pki: &mut PkiStatus) -> &mut String {
        match self {
            PkiArtifact::CaCert => &mut pki.ca_cert,
            PkiArtifact::CaKey => &mut pki.ca_key,
            PkiArtifact::SaPrivate => &mut pki.sa_private,
            PkiArtifact::SaPublic => &mut pki.sa_public,
            PkiArtifact::FrontProxyKey => &mut pki.front_proxy_key,
            PkiArtifact::FrontProxyCert => &mut pki.front_proxy_cert,
            PkiArtifact::EtcdCert => &mut pki.etcd_cert,
            PkiArtifact::EtcdKey => &mut pki.etcd_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn record_same_value_is_not_a_change() {
        let mut outcome = StepOutcome::unchanged(ClusterStatus {
            admin_conf: "kubeconfig".to_string(),
            ..ClusterStatus::default()
        });

        outcome.record(Fact::AdminConf, "kubeconfig");

        assert!(!outcome.changed);
    }

    #[test]
    fn record_new_value_is_a_change() {
        let mut outcome = StepOutcome::unchanged(ClusterStatus::default());

        outcome.record(Fact::Pki(PkiArtifact::EtcdKey), "KEY");

        assert!(outcome.changed);
        assert_eq!(outcome.status.pki.etcd_key, "KEY");
    }

    #[test]
    fn fold_keeps_latest_status_and_any_change() {
        let mut first = StepOutcome::unchanged(ClusterStatus::default());
        first.record(Fact::JoinToken, "abc.def");
        let second = StepOutcome::unchanged(first.status.clone());

        let folded = first.fold(second);

        assert!(folded.changed);
        assert_eq!(folded.status.join_token, "abc.def");
    }

    #[test]
    fn config_is_compared_structurally() {
        let config = ClusterConfiguration {
            control_plane_endpoint: "10.0.0.1".to_string(),
            ..ClusterConfiguration::default()
        };
        let mut outcome = StepOutcome::unchanged(ClusterStatus {
            kubeadm_config: Some(config.clone()),
            ..ClusterStatus::default()
        });

        outcome.record_kubeadm_config(config);
        assert!(!outcome.changed);

        outcome.record_kubeadm_config(ClusterConfiguration::default());
        assert!(outcome.changed);
    }

    #[test]
    fn controller_ready_changes_once() {
        let mut outcome = StepOutcome::unchanged(ClusterStatus::default());
        outcome.mark_controller_ready("c1");
        assert!(outcome.changed);

        let mut again = StepOutcome::unchanged(outcome.status);
        again.mark_controller_ready("c1");
        assert!(!again.changed);
    }

    #[test]
    fn pki_artifacts_are_distinct() {
        let suffixes: HashSet<_> = PkiArtifact::ALL.iter().map(|a| a.suffix()).collect();
        let paths: HashSet<_> = PkiArtifact::ALL.iter().map(|a| a.path()).collect();
        assert_eq!(suffixes.len(), 8);
        assert_eq!(paths.len(), 8);
    }

    #[test]
    fn pki_field_accessors_agree() {
        let mut pki = PkiStatus::default();
        for artifact in PkiArtifact::ALL {
            *artifact.field_mut(&mut pki) = artifact.suffix().to_string();
        }
        for artifact in PkiArtifact::ALL {
            assert_eq!(artifact.field(&pki), artifact.suffix());
        }
        assert_eq!(pki.sa_private, "sakey");
    }
}
