//! Metric-space indexing with rank lists over reference objects.
//!
//! A generation samples a fixed set of reference objects from the corpus.
//! Every item is then described by the ordered list of its nearest
//! references (its rank list), stored as tokens in the item store and kept
//! in memory as inverted lists from reference to `(item, position)`. Queries
//! are ranked by the footrule distance between rank lists, which
//! approximates proximity in the original space without touching the corpus
//! vectors at query time.

mod index;
mod rank_list;
mod reference;

pub use index::{IndexState, MetricSpacesIndex, MetricSpacesOptions};
pub use rank_list::{RANK_LIST_FIELD, RankList, footrule, footrule_score, max_footrule};
pub use reference::{REFERENCE_FILE, ReferenceObjectSet};

use thiserror::Error;

use crate::storage::StorageError;
use crate::vector::{ItemId, VectorError};

/// Errors that can occur in the metric-space index.
#[derive(Error, Debug)]
pub enum MetricIndexError {
    #[error(
        "Corpus has {items} indexable items but {required} reference objects were requested\nSuggestion: Add items or lower metric_spaces.num_reference_objects"
    )]
    CorpusTooSmall { items: usize, required: usize },

    #[error(
        "Invalid reference object counts: {used} used out of {total}\nSuggestion: num_reference_objects_used must be between 1 and num_reference_objects"
    )]
    InvalidReferenceCounts { used: usize, total: usize },

    #[error("Index is not ready (state: {0:?})\nSuggestion: Run create_index or open an existing index first")]
    NotReady(IndexState),

    #[error("Item {0} has no feature vector")]
    MissingFeature(ItemId),

    #[error("Item {0} has no rank list\nSuggestion: Run update_index to index new items")]
    NotIndexed(ItemId),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("Query does not match the reference objects: {0}")]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
