//! Newtype wrappers for object identities.
//!
//! These types keep namespaces, names, and resource versions from being mixed
//! up with each other and make store signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A namespaced object name, unique per [`Kind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns a key for another object in the same namespace.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        ObjectKey::new(self.namespace.clone(), name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Monotonic version assigned by the store on every successful write.
///
/// Zero means "never persisted". Updates carry the version they were read at
/// and are rejected if the stored object has moved on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl ResourceVersion {
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Cluster,
    Node,
    ConfigFile,
    Command,
    FactFile,
}

impl Kind {
    pub const ALL: [Kind; 5] = [
        Kind::Cluster,
        Kind::Node,
        Kind::ConfigFile,
        Kind::Command,
        Kind::FactFile,
    ];

    /// Task kinds, i.e. everything the executor consumes.
    pub const TASKS: [Kind; 4] = [Kind::Node, Kind::ConfigFile, Kind::Command, Kind::FactFile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Cluster => "cluster",
            Kind::Node => "node",
            Kind::ConfigFile => "config_file",
            Kind::Command => "command",
            Kind::FactFile => "fact_file",
        }
    }

    pub fn is_task(&self) -> bool {
        !matches!(self, Kind::Cluster)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object kind: {0:?}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod object_key {
        use super::*;

        #[test]
        fn display_is_namespace_slash_name() {
            let key = ObjectKey::new("default", "prod");
            assert_eq!(key.to_string(), "default/prod");
        }

        #[test]
        fn sibling_keeps_namespace() {
            let key = ObjectKey::new("infra", "prod");
            assert_eq!(key.sibling("prod-networking"), ObjectKey::new("infra", "prod-networking"));
        }

        #[test]
        fn serde_roundtrip() {
            let key = ObjectKey::new("infra", "prod");
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, r#"{"namespace":"infra","name":"prod"}"#);
        }
    }

    mod kind {
        use super::*;

        #[test]
        fn parses_every_display_name() {
            for kind in Kind::ALL {
                assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
            }
        }

        #[test]
        fn rejects_unknown_names() {
            let err = "host".parse::<Kind>().unwrap_err();
            assert_eq!(err, UnknownKind("host".to_string()));
        }

        #[test]
        fn only_cluster_is_not_a_task() {
            assert!(!Kind::Cluster.is_task());
            assert!(Kind::TASKS.iter().all(Kind::is_task));
        }
    }

    #[test]
    fn resource_version_zero_is_unset() {
        assert!(ResourceVersion::default().is_unset());
        assert!(!ResourceVersion(3).is_unset());
    }
}
