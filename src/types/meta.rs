//! Metadata shared by every stored object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ObjectKey, ResourceVersion};

/// Identity, version, and ownership of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,

    /// Assigned by the store; zero until the object is first created.
    #[serde(default)]
    pub resource_version: ResourceVersion,

    /// Name of the owning cluster in the same namespace, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Set by the store on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(key: &ObjectKey) -> Self {
        ObjectMeta {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            resource_version: ResourceVersion::default(),
            owner: None,
            created_at: None,
        }
    }

    /// Metadata for an object owned by `owner` in the owner's namespace.
    pub fn owned_by(owner: &ObjectKey, name: impl Into<String>) -> Self {
        ObjectMeta {
            owner: Some(owner.name.clone()),
            ..ObjectMeta::new(&owner.sibling(name))
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Key of the owning object, if any.
    pub fn owner_key(&self) -> Option<ObjectKey> {
        self.owner
            .as_ref()
            .map(|owner| ObjectKey::new(self.namespace.clone(), owner.clone()))
    }
}
