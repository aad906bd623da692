//! In-memory object store.

use tokio::sync::{Mutex, broadcast};
use tracing::trace;

use super::table::Table;
use super::{ObjectStore, Result, Watch, WatchEvent};
use crate::types::{Kind, Object, ObjectKey};

/// Capacity of the change-notification channel.
pub(crate) const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// A versioned store held entirely in memory.
///
/// Used for tests and for running the operator without a state directory.
#[derive(Debug)]
pub struct MemoryStore {
    table: Mutex<Table>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        MemoryStore {
            table: Mutex::new(Table::default()),
            events,
        }
    }

    fn publish(&self, event: WatchEvent) {
        trace!(?event, "Publishing watch event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl ObjectStore for MemoryStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<Object>> {
        Ok(self.table.lock().await.get(kind, key).cloned())
    }

    async fn list(&self, kind: Kind) -> Result<Vec<Object>> {
        Ok(self.table.lock().await.list(kind))
    }

    async fn create(&self, object: Object) -> Result<Object> {
        let mut table = self.table.lock().await;
        let stored = table.prepare_create(object)?;
        table.commit(stored.clone());
        drop(table);

        self.publish(WatchEvent::applied(&stored));
        Ok(stored)
    }

    async fn update(&self, object: Object) -> Result<Object> {
        let mut table = self.table.lock().await;
        let stored = table.prepare_update(object)?;
        table.commit(stored.clone());
        drop(table);

        self.publish(WatchEvent::applied(&stored));
        Ok(stored)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<bool> {
        let removed = self.table.lock().await.remove(kind, key);
        match removed {
            Some(object) => {
                self.publish(WatchEvent::deleted(&object));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn watch(&self, kinds: &[Kind]) -> Watch {
        Watch::new(self.events.subscribe(), kinds)
    }
}
