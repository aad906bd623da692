//! Cluster manifests loaded at startup.
//!
//! A manifest is a YAML document naming a cluster and its desired spec:
//!
//! ```yaml
//! metadata:
//!   namespace: infra
//!   name: prod
//! spec:
//!   controllers:
//!     - name: c1
//!       ip: 192.168.0.200
//!   defaultsshkeysecret: ssh-key
//!   version: v1.13.1
//! ```
//!
//! Manifests only create clusters. A cluster that already exists is left as
//! it is, so restarting the operator never clobbers edits or status.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::store::{ObjectStore, StoreError};
use crate::types::{Cluster, ClusterSpec, ObjectKey};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("applying cluster {key}: {source}")]
    Store {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub namespace: String,
    pub name: String,
}

/// Desired state of one cluster as written by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterManifest {
    pub metadata: ManifestMetadata,
    pub spec: ClusterSpec,
}

impl ClusterManifest {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn into_cluster(self) -> Cluster {
        Cluster::new(&self.key(), self.spec)
    }
}

/// What [`apply`] did with each manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: Vec<ObjectKey>,
    pub existing: Vec<ObjectKey>,
}

/// Parses one manifest file.
pub fn load_file(path: &Path) -> Result<ClusterManifest> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ManifestError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses every `.yaml` / `.yml` file directly under `dir`, in file name
/// order. Other entries are ignored.
pub fn load_dir(dir: &Path) -> Result<Vec<ClusterManifest>> {
    let io_err = |source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths.iter().map(|path| load_file(path)).collect()
}

/// Creates each manifest's cluster unless one with that key already exists.
#[instrument(skip_all, fields(manifests = manifests.len()))]
pub async fn apply<S: ObjectStore + ?Sized>(
    store: &S,
    manifests: Vec<ClusterManifest>,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    for manifest in manifests {
        let key = manifest.key();
        match store.create(manifest.into_cluster().into()).await {
            Ok(_) => {
                info!(cluster = %key, "Created cluster from manifest");
                summary.created.push(key);
            }
            Err(e) if e.is_already_exists() => {
                debug!(cluster = %key, "Cluster already exists, leaving it alone");
                summary.existing.push(key);
            }
            Err(source) => return Err(ManifestError::Store { key, source }),
        }
    }

    Ok(summary)
}
