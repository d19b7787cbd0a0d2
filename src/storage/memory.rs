use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::storage::{FieldValue, ItemStore, StorageError, StorageResult, StoredItem};
use crate::vector::ItemId;

/// Concurrent in-memory item store.
///
/// Ids are handed out densely starting at zero. Deleting an item keeps its
/// slot and clears the liveness flag, matching the tombstone semantics of the
/// external document store.
#[derive(Clone, Debug)]
pub struct MemoryItemStore {
    items: Arc<DashMap<ItemId, StoredItem>>,
    next_id: Arc<AtomicU32>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Adds an item and returns its id.
    pub fn add(&self, global: Option<Vec<f64>>, local: Vec<Vec<f64>>) -> ItemId {
        let id = ItemId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.items.insert(
            id,
            StoredItem {
                id,
                live: true,
                global,
                local,
                fields: Default::default(),
            },
        );
        id
    }

    /// Convenience for corpora that only carry a global descriptor.
    pub fn add_global(&self, vector: Vec<f64>) -> ItemId {
        self.add(Some(vector), Vec::new())
    }

    /// Convenience for corpora that only carry local descriptors.
    pub fn add_local(&self, features: Vec<Vec<f64>>) -> ItemId {
        self.add(None, features)
    }

    /// Replaces the descriptors of an existing item.
    ///
    /// Index fields are dropped, since they were derived from the old
    /// descriptors and must be recomputed.
    pub fn update(
        &self,
        id: ItemId,
        global: Option<Vec<f64>>,
        local: Vec<Vec<f64>>,
    ) -> StorageResult<()> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(StorageError::ItemNotFound(id))?;
        if !item.live {
            return Err(StorageError::ItemDeleted(id));
        }
        item.global = global;
        item.local = local;
        item.fields.clear();
        Ok(())
    }

    /// Marks an item as deleted. Returns `false` if the id is unknown.
    pub fn delete(&self, id: ItemId) -> bool {
        match self.items.get_mut(&id) {
            Some(mut item) => {
                item.live = false;
                true
            }
            None => false,
        }
    }

    /// Removes a field from an item, returning the previous value.
    pub fn remove_field(&self, id: ItemId, field: &str) -> Option<FieldValue> {
        self.items
            .get_mut(&id)
            .and_then(|mut item| item.fields.remove(field))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.items.iter().filter(|entry| entry.live).count()
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for MemoryItemStore {
    fn max_id(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    fn get(&self, id: ItemId) -> Option<StoredItem> {
        self.items.get(&id).map(|entry| entry.clone())
    }

    fn put_field(&self, id: ItemId, field: &str, value: FieldValue) -> StorageResult<()> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(StorageError::ItemNotFound(id))?;
        if !item.live {
            return Err(StorageError::ItemDeleted(id));
        }
        item.fields.insert(field.to_string(), value);
        Ok(())
    }

    fn field(&self, id: ItemId, field: &str) -> Option<FieldValue> {
        self.items
            .get(&id)
            .and_then(|item| item.fields.get(field).cloned())
    }

    fn is_live(&self, id: ItemId) -> bool {
        self.items.get(&id).is_some_and(|item| item.live)
    }

    fn live_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .items
            .iter()
            .filter(|entry| entry.live)
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn feature_vector(&self, id: ItemId) -> Option<Vec<f64>> {
        self.items
            .get(&id)
            .filter(|item| item.live)
            .and_then(|item| item.global.clone())
    }

    fn local_features(&self, id: ItemId) -> Option<Vec<Vec<f64>>> {
        self.items
            .get(&id)
            .filter(|item| item.live)
            .map(|item| item.local.clone())
    }
}
