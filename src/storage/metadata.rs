//! JSON metadata written next to persisted index structures.
//!
//! Tracks what produced an index generation and when, so a reload can refuse
//! files written by a newer format version.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::storage::{StorageError, StorageResult};

/// Seconds since the Unix epoch.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Metadata for an index generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Kind of index, e.g. `"metric_spaces"`.
    pub kind: String,

    /// Dimension of the indexed vectors.
    pub dimension: usize,

    /// Number of entries in the persisted structure.
    pub entry_count: usize,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Unix timestamp when last updated
    pub updated_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl IndexMetadata {
    /// Current metadata version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(kind: impl Into<String>, dimension: usize, entry_count: usize) -> Self {
        let now = get_utc_timestamp();
        Self {
            kind: kind.into(),
            dimension,
            entry_count,
            created_at: now,
            updated_at: now,
            version: Self::CURRENT_VERSION,
        }
    }

    /// Rejects metadata written by a newer format version.
    pub fn check_version(&self) -> StorageResult<()> {
        if self.version > Self::CURRENT_VERSION {
            return Err(StorageError::Metadata {
                message: format!(
                    "Metadata version {} is newer than supported version {}",
                    self.version,
                    Self::CURRENT_VERSION
                ),
                suggestion: "Rebuild the index with this version".to_string(),
            });
        }
        Ok(())
    }
}

/// Serializes `value` as pretty JSON to `path`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Reads a JSON document written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let json = std::fs::read_to_string(path).map_err(|e| StorageError::Metadata {
        message: format!("Failed to read {}: {e}", path.display()),
        suggestion: "Check that the index exists at the specified path".to_string(),
    })?;
    serde_json::from_str(&json).map_err(|e| StorageError::Metadata {
        message: format!("Failed to parse {}: {e}", path.display()),
        suggestion: "The file may be corrupted. Try rebuilding the index.".to_string(),
    })
}
