//! Operator configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `KUBEADM_OPERATOR_LISTEN_ADDR` | `0.0.0.0:3000` |
//! | `KUBEADM_OPERATOR_STATE_DIR` | unset: in-memory store |
//! | `KUBEADM_OPERATOR_MANIFEST_DIR` | unset: no manifests |
//! | `KUBEADM_OPERATOR_RESYNC_INTERVAL_SECS` | `600` |
//!
//! Empty values count as unset. Values that are set but malformed are
//! errors rather than silently falling back to the default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const LISTEN_ADDR_VAR: &str = "KUBEADM_OPERATOR_LISTEN_ADDR";
pub const STATE_DIR_VAR: &str = "KUBEADM_OPERATOR_STATE_DIR";
pub const MANIFEST_DIR_VAR: &str = "KUBEADM_OPERATOR_MANIFEST_DIR";
pub const RESYNC_INTERVAL_VAR: &str = "KUBEADM_OPERATOR_RESYNC_INTERVAL_SECS";

const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    3000,
);
const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a socket address like 0.0.0.0:3000, got {value:?}")]
    InvalidAddr { name: &'static str, value: String },

    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime configuration of the operator binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    pub listen_addr: SocketAddr,

    /// Root of the durable store; `None` keeps everything in memory.
    pub state_dir: Option<PathBuf>,

    /// Directory of cluster manifests applied at startup.
    pub manifest_dir: Option<PathBuf>,

    pub resync_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            listen_addr: DEFAULT_LISTEN_ADDR,
            state_dir: None,
            manifest_dir: None,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
        }
    }
}

impl OperatorConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(value) = var(LISTEN_ADDR_VAR) {
            config.listen_addr = value.parse().map_err(|_| ConfigError::InvalidAddr {
                name: LISTEN_ADDR_VAR,
                value,
            })?;
        }
        config.state_dir = var(STATE_DIR_VAR).map(PathBuf::from);
        config.manifest_dir = var(MANIFEST_DIR_VAR).map(PathBuf::from);
        if let Some(value) = var(RESYNC_INTERVAL_VAR) {
            config.resync_interval = match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidSeconds {
                        name: RESYNC_INTERVAL_VAR,
                        value,
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dir = Some(dir.into());
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<OperatorConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OperatorConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.resync_interval, Duration::from_secs(600));
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = from_vars(&[
            (LISTEN_ADDR_VAR, "127.0.0.1:8080"),
            (STATE_DIR_VAR, "/var/lib/kubeadm-operator"),
            (MANIFEST_DIR_VAR, " /etc/kubeadm-operator/clusters "),
            (RESYNC_INTERVAL_VAR, "30"),
        ])
        .unwrap();

        assert_eq!(
            config,
            OperatorConfig::default()
                .with_listen_addr("127.0.0.1:8080".parse().unwrap())
                .with_state_dir("/var/lib/kubeadm-operator")
                .with_manifest_dir("/etc/kubeadm-operator/clusters")
                .with_resync_interval(Duration::from_secs(30))
        );
    }

    #[test]
    fn empty_values_are_unset() {
        let config = from_vars(&[(STATE_DIR_VAR, "  "), (LISTEN_ADDR_VAR, "")]).unwrap();
        assert_eq!(config, OperatorConfig::default());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert_eq!(
            from_vars(&[(LISTEN_ADDR_VAR, "localhost")]).unwrap_err(),
            ConfigError::InvalidAddr {
                name: LISTEN_ADDR_VAR,
                value: "localhost".to_string(),
            }
        );
        for bad in ["0", "-5", "ten"] {
            let err = from_vars(&[(RESYNC_INTERVAL_VAR, bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidSeconds { .. }), "{bad}");
        }
    }
}
