//! Versioning rules shared by the store backends.
//!
//! A `Table` validates a write and computes the object to store without
//! touching its map, so a durable backend can persist the prepared object
//! before committing it in memory.

use std::collections::BTreeMap;

use chrono::Utc;

use super::{Result, StoreError};
use crate::types::{Kind, Object, ObjectKey, ResourceVersion};

#[derive(Debug, Default)]
pub(crate) struct Table {
    objects: BTreeMap<(Kind, ObjectKey), Object>,
    last_version: u64,
}

impl Table {
    /// Builds a table from already-persisted objects.
    pub(crate) fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let mut table = Table::default();
        for object in objects {
            table.last_version = table.last_version.max(object.resource_version().0);
            table.objects.insert((object.kind(), object.key()), object);
        }
        table
    }

    pub(crate) fn get(&self, kind: Kind, key: &ObjectKey) -> Option<&Object> {
        self.objects.get(&(kind, key.clone()))
    }

    pub(crate) fn list(&self, kind: Kind) -> Vec<Object> {
        self.objects
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Validates a create and returns the object as it will be stored.
    pub(crate) fn prepare_create(&self, mut object: Object) -> Result<Object> {
        let kind = object.kind();
        let key = object.key();
        if self.objects.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        let metadata = object.metadata_mut();
        metadata.resource_version = self.next_version();
        metadata.created_at = Some(Utc::now());
        Ok(object)
    }

    /// Validates an update and returns the object as it will be stored.
    ///
    /// The creation timestamp always comes from the stored object.
    pub(crate) fn prepare_update(&self, mut object: Object) -> Result<Object> {
        let kind = object.kind();
        let key = object.key();
        let current = self
            .objects
            .get(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

        let expected = object.resource_version();
        let actual = current.resource_version();
        if expected != actual {
            return Err(StoreError::Conflict {
                kind,
                key,
                expected,
                actual,
            });
        }

        let created_at = current.metadata().created_at;
        let metadata = object.metadata_mut();
        metadata.resource_version = self.next_version();
        metadata.created_at = created_at;
        Ok(object)
    }

    /// Stores a prepared object.
    pub(crate) fn commit(&mut self, object: Object) {
        self.last_version = self.last_version.max(object.resource_version().0);
        self.objects.insert((object.kind(), object.key()), object);
    }

    pub(crate) fn remove(&mut self, kind: Kind, key: &ObjectKey) -> Option<Object> {
        self.objects.remove(&(kind, key.clone()))
    }

    fn next_version(&self) -> ResourceVersion {
        ResourceVersion(self.last_version + 1)
    }
}
