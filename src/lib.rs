//! Vocabulary building, feature aggregation and approximate similarity
//! indexing for content-based retrieval.

pub mod aggregate;
pub mod clustering;
pub mod config;
pub mod error;
pub mod features;
pub mod hashing;
pub mod logging;
pub mod metric;
pub mod storage;
pub mod vector;

// Explicit exports for better API clarity
pub use aggregate::{AggregatedFeature, AggregationError, Aggregator, Bovw, CorpusAggregator, Vlad};
pub use clustering::{
    Clusterer, ClusteringError, Codebook, ConvergencePolicy, KMeans, ParallelKMeans,
    TrainingReport, VocabularyBuilder, train,
};
pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use features::{ExtractorRegistry, FeatureError, FeatureKind};
pub use hashing::{BitSamplingBank, HashBank, HashSearcher, HashingError, LshBank};
pub use metric::{IndexState, MetricIndexError, MetricSpacesIndex, RankList};
pub use storage::{
    CodecError, FieldValue, ItemStore, MemoryItemStore, StorageError, StorageResult,
};
pub use vector::{ClusterId, ItemId, SearchHit, VectorDimension, VectorError};
