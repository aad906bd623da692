//! Durable object store backed by one JSON file per object.
//!
//! # File Layout
//!
//! ```text
//! <root>/<kind>/<namespace>/<name>.json
//! ```
//!
//! # Atomic Writes
//!
//! Every write goes through write-to-temp-then-rename:
//! 1. Write to `<name>.json.tmp`
//! 2. fsync the file
//! 3. Rename to `<name>.json`
//! 4. fsync the directory
//!
//! The object is committed in memory (and published to watchers) only after
//! the rename is durable, so a crash never exposes a write that was lost.
//! Leftover `.tmp` files from an interrupted write are removed on open.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::memory::WATCH_CHANNEL_CAPACITY;
use super::table::Table;
use super::{ObjectStore, Result, StoreError, Watch, WatchEvent};
use crate::types::{Kind, Object, ObjectKey};

/// A versioned store persisted under a root directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    table: Mutex<Table>,
    events: broadcast::Sender<WatchEvent>,
}

impl FileStore {
    /// Opens (or initializes) a store rooted at `root`, loading every object.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut objects = Vec::new();
        for kind in Kind::ALL {
            objects.extend(load_kind(&root.join(kind.as_str()), kind)?);
        }
        info!(root = %root.display(), objects = objects.len(), "Opened file store");

        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Ok(FileStore {
            root,
            table: Mutex::new(Table::from_objects(objects)),
            events,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file an object of this kind and key is stored in.
    pub fn object_path(&self, kind: Kind, key: &ObjectKey) -> Result<PathBuf> {
        if !is_path_component(&key.namespace) || !is_path_component(&key.name) {
            return Err(StoreError::InvalidKey(key.clone()));
        }
        Ok(self
            .root
            .join(kind.as_str())
            .join(&key.namespace)
            .join(format!("{}.json", key.name)))
    }

    async fn persist(&self, object: &Object) -> Result<()> {
        let path = self.object_path(object.kind(), &object.key())?;
        let bytes = serde_json::to_vec_pretty(object)?;
        blocking(move || write_atomic(&path, &bytes)).await
    }

    fn publish(&self, event: WatchEvent) {
        let _ = self.events.send(event);
    }
}

impl ObjectStore for FileStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<Object>> {
        Ok(self.table.lock().await.get(kind, key).cloned())
    }

    async fn list(&self, kind: Kind) -> Result<Vec<Object>> {
        Ok(self.table.lock().await.list(kind))
    }

    async fn create(&self, object: Object) -> Result<Object> {
        let mut table = self.table.lock().await;
        let stored = table.prepare_create(object)?;
        self.persist(&stored).await?;
        table.commit(stored.clone());
        drop(table);

        self.publish(WatchEvent::applied(&stored));
        Ok(stored)
    }

    async fn update(&self, object: Object) -> Result<Object> {
        let mut table = self.table.lock().await;
        let stored = table.prepare_update(object)?;
        self.persist(&stored).await?;
        table.commit(stored.clone());
        drop(table);

        self.publish(WatchEvent::applied(&stored));
        Ok(stored)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<bool> {
        let mut table = self.table.lock().await;
        if table.get(kind, key).is_none() {
            return Ok(false);
        }

        let path = self.object_path(kind, key)?;
        blocking(move || {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            match path.parent() {
                Some(parent) => fsync_dir(parent),
                None => Ok(()),
            }
        })
        .await?;

        let removed = table.remove(kind, key);
        drop(table);

        if let Some(object) = removed {
            self.publish(WatchEvent::deleted(&object));
        }
        Ok(true)
    }

    fn watch(&self, kinds: &[Kind]) -> Watch {
        Watch::new(self.events.subscribe(), kinds)
    }
}

/// Runs filesystem work on the blocking pool. The table lock stays held by
/// the caller, so writes still land on disk in version order.
async fn blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)??;
    Ok(())
}

/// Loads every object stored under `<root>/<kind>/`.
fn load_kind(kind_dir: &Path, kind: Kind) -> Result<Vec<Object>> {
    let namespaces = match fs::read_dir(kind_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut objects = Vec::new();
    for namespace in namespaces {
        let namespace = namespace?;
        if !namespace.file_type()?.is_dir() {
            continue;
        }

        for entry in fs::read_dir(namespace.path())? {
            let path = entry?.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => {}
                Some("tmp") => {
                    debug!(path = %path.display(), "Removing interrupted write");
                    fs::remove_file(&path)?;
                    continue;
                }
                _ => continue,
            }

            let object: Object = serde_json::from_slice(&fs::read(&path)?)?;
            if object.kind() != kind {
                warn!(path = %path.display(), %kind, found = %object.kind(), "Skipping misfiled object");
                continue;
            }
            objects.push(object);
        }
    }

    Ok(objects)
}

/// Writes `bytes` to `path` so that readers see either the old or the new
/// content, never a partial write.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    fsync_dir(parent)
}

/// Makes directory entries (creations, renames, removals) durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

fn is_path_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\', '\0'])
}
