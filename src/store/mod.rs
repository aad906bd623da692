//! Object store boundary.
//!
//! The operator persists nothing of its own: clusters and tasks live in an
//! object store that offers versioned CRUD and change notifications. The
//! executor shares the same store, reading tasks and writing results back.
//!
//! # Semantics
//!
//! - `get` returns `Ok(None)` for a missing object. Absence is an expected
//!   state, not an error.
//! - `create` fails with [`StoreError::AlreadyExists`] if the key is taken.
//! - `update` is a compare-and-write: it succeeds only if the object's
//!   `resource_version` still matches the stored one, and fails with
//!   [`StoreError::Conflict`] otherwise.
//! - Every successful write bumps the resource version and publishes a
//!   [`WatchEvent`].
//!
//! Two implementations are provided: [`MemoryStore`] and the durable
//! [`FileStore`]. Both share the versioning rules in `table`.

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{Cluster, Kind, Object, ObjectKey, ResourceVersion, Task};

pub mod file;
pub mod memory;
mod table;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors returned by an object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` on a key that is already taken.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    /// `update` on an object that does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    /// `update` against a stale resource version.
    #[error("{kind} {key} was modified: expected version {expected}, found {actual}")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: ResourceVersion,
        actual: ResourceVersion,
    },

    /// The stored object under a kind does not decode as that kind.
    #[error("object {key} stored under {kind} has unexpected shape")]
    UnexpectedKind { kind: Kind, key: ObjectKey },

    /// A namespace or name that cannot be used as a path component.
    #[error("invalid object key {0}: components must be non-empty and free of path separators")]
    InvalidKey(ObjectKey),

    /// IO error in a durable backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error in a durable backend.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An object was created or updated.
    Applied {
        kind: Kind,
        key: ObjectKey,
        owner: Option<ObjectKey>,
    },

    /// An object was deleted.
    Deleted {
        kind: Kind,
        key: ObjectKey,
        owner: Option<ObjectKey>,
    },

    /// The subscriber fell behind and missed this many events. Anything may
    /// have changed; consumers should resync everything they care about.
    Lagged(u64),
}

impl WatchEvent {
    pub(crate) fn applied(object: &Object) -> Self {
        WatchEvent::Applied {
            kind: object.kind(),
            key: object.key(),
            owner: object.metadata().owner_key(),
        }
    }

    pub(crate) fn deleted(object: &Object) -> Self {
        WatchEvent::Deleted {
            kind: object.kind(),
            key: object.key(),
            owner: object.metadata().owner_key(),
        }
    }

    /// Kind of the object this event is about, if it is about one.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            WatchEvent::Applied { kind, .. } | WatchEvent::Deleted { kind, .. } => Some(*kind),
            WatchEvent::Lagged(_) => None,
        }
    }
}

/// A filtered subscription to store changes.
#[derive(Debug)]
pub struct Watch {
    rx: broadcast::Receiver<WatchEvent>,
    kinds: Vec<Kind>,
}

impl Watch {
    pub(crate) fn new(rx: broadcast::Receiver<WatchEvent>, kinds: &[Kind]) -> Self {
        Watch {
            rx,
            kinds: kinds.to_vec(),
        }
    }

    /// Waits for the next event matching this watch's kinds.
    ///
    /// `Lagged` is always delivered. Returns `None` once the store is dropped.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => match event.kind() {
                    Some(kind) if !self.kinds.contains(&kind) => continue,
                    _ => return Some(event),
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(WatchEvent::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// A versioned object store with change notifications.
///
/// Implementations must be cheap to share across tasks (`Send + Sync`); the
/// operator holds them behind an `Arc`.
pub trait ObjectStore: Send + Sync + 'static {
    /// Reads an object. Missing objects are `Ok(None)`.
    fn get(
        &self,
        kind: Kind,
        key: &ObjectKey,
    ) -> impl Future<Output = Result<Option<Object>>> + Send;

    /// Lists every object of a kind, in key order.
    fn list(&self, kind: Kind) -> impl Future<Output = Result<Vec<Object>>> + Send;

    /// Creates an object and returns it as stored (with version and timestamp).
    fn create(&self, object: Object) -> impl Future<Output = Result<Object>> + Send;

    /// Replaces an object if its resource version is current.
    fn update(&self, object: Object) -> impl Future<Output = Result<Object>> + Send;

    /// Deletes an object. Returns `false` if it did not exist.
    fn delete(&self, kind: Kind, key: &ObjectKey) -> impl Future<Output = Result<bool>> + Send;

    /// Subscribes to changes of the given kinds.
    fn watch(&self, kinds: &[Kind]) -> Watch;
}

/// Reads a cluster.
pub async fn get_cluster<S: ObjectStore + ?Sized>(
    store: &S,
    key: &ObjectKey,
) -> Result<Option<Cluster>> {
    match store.get(Kind::Cluster, key).await? {
        Some(object) => object
            .into_cluster()
            .map(Some)
            .ok_or_else(|| StoreError::UnexpectedKind {
                kind: Kind::Cluster,
                key: key.clone(),
            }),
        None => Ok(None),
    }
}

/// Reads a task of the given kind.
pub async fn get_task<S: ObjectStore + ?Sized>(
    store: &S,
    kind: Kind,
    key: &ObjectKey,
) -> Result<Option<Task>> {
    let Some(object) = store.get(kind, key).await? else {
        return Ok(None);
    };

    match object.into_task() {
        Some(task) if task.kind() == kind => Ok(Some(task)),
        _ => Err(StoreError::UnexpectedKind {
            kind,
            key: key.clone(),
        }),
    }
}

/// Lists every cluster key.
pub async fn list_cluster_keys<S: ObjectStore + ?Sized>(store: &S) -> Result<Vec<ObjectKey>> {
    Ok(store
        .list(Kind::Cluster)
        .await?
        .iter()
        .map(Object::key)
        .collect())
}
