//! Item store contract and on-disk encodings.
//!
//! The document store that owns corpus items lives outside this crate. The
//! indexes only need random access by id, a liveness flag for deleted items,
//! and the ability to attach opaque byte or token fields, which is what
//! [`ItemStore`] captures. [`MemoryItemStore`] is the in-process
//! implementation used by the CLI and the tests.

pub mod binary;
mod error;
mod memory;
mod metadata;

pub use error::{CodecError, StorageError, StorageResult};
pub use memory::MemoryItemStore;
pub use metadata::{IndexMetadata, get_utc_timestamp, load_json, save_json};

use std::collections::HashMap;

use crate::vector::ItemId;

/// Opaque payload attached to an item for the store to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Raw bytes, e.g. a quantized VLAD vector.
    Bytes(Vec<u8>),
    /// Whitespace-free tokens for exact-match retrieval.
    Tokens(Vec<String>),
}

impl FieldValue {
    #[must_use]
    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            Self::Tokens(tokens) => Some(tokens),
            Self::Bytes(_) => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Tokens(_) => None,
        }
    }
}

/// A corpus item as seen by the indexes.
#[derive(Debug, Clone, Default)]
pub struct StoredItem {
    pub id: ItemId,
    /// `false` once the item has been deleted from the corpus.
    pub live: bool,
    /// Global descriptor of the item, if one was extracted.
    pub global: Option<Vec<f64>>,
    /// Ordered local descriptors of the item.
    pub local: Vec<Vec<f64>>,
    /// Fields written back by the indexes.
    pub fields: HashMap<String, FieldValue>,
}

/// Keyed access to corpus items.
///
/// Ids are dense: every id below [`ItemStore::max_id`] may be looked up, and
/// deleted items either return `None` or an item with `live == false`.
pub trait ItemStore: Send + Sync {
    /// Upper bound (exclusive) of the id space.
    fn max_id(&self) -> usize;

    /// Returns a snapshot of the item, if the id was ever assigned.
    fn get(&self, id: ItemId) -> Option<StoredItem>;

    /// Attaches or replaces a field on an existing item.
    fn put_field(&self, id: ItemId, field: &str, value: FieldValue) -> StorageResult<()>;

    /// Reads a single field without cloning the whole item.
    fn field(&self, id: ItemId, field: &str) -> Option<FieldValue> {
        self.get(id).and_then(|item| item.fields.get(field).cloned())
    }

    /// Returns the item only if it exists and is live.
    fn get_live(&self, id: ItemId) -> Option<StoredItem> {
        self.get(id).filter(|item| item.live)
    }

    /// Whether the id was assigned and the item has not been deleted.
    fn is_live(&self, id: ItemId) -> bool {
        self.get(id).is_some_and(|item| item.live)
    }

    /// Ids of every live item, in ascending order.
    fn live_ids(&self) -> Vec<ItemId> {
        (0..self.max_id())
            .map(ItemId::from)
            .filter(|id| self.is_live(*id))
            .collect()
    }

    /// Global descriptor of a live item.
    fn feature_vector(&self, id: ItemId) -> Option<Vec<f64>> {
        self.get_live(id).and_then(|item| item.global)
    }

    /// Local descriptors of a live item.
    fn local_features(&self, id: ItemId) -> Option<Vec<Vec<f64>>> {
        self.get_live(id).map(|item| item.local)
    }
}
