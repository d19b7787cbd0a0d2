//! Static registry of feature extractors.
//!
//! Maps a kind tag to a constructor function. Extractors are built on demand
//! so each caller owns its instance; lookups for unregistered tags fail with
//! [`FeatureError::UnknownKind`] instead of loading anything dynamically.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IndexError, IndexResult};
use crate::features::{
    FeatureError, FeatureKind, GlobalFeatureExtractor, LocalFeatureExtractor, TextLinesExtractor,
    TextVectorExtractor,
};

/// Constructor for a global extractor.
pub type GlobalConstructor = fn() -> Box<dyn GlobalFeatureExtractor>;

/// Constructor for a local extractor.
pub type LocalConstructor = fn() -> Box<dyn LocalFeatureExtractor>;

/// Registry of the extractors compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    global: BTreeMap<FeatureKind, GlobalConstructor>,
    local: BTreeMap<FeatureKind, LocalConstructor>,
}

impl ExtractorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in text extractors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_global(TextVectorExtractor::KIND, || Box::new(TextVectorExtractor));
        registry.register_local(TextLinesExtractor::KIND, || Box::new(TextLinesExtractor));
        registry
    }

    pub fn register_global(&mut self, kind: FeatureKind, constructor: GlobalConstructor) {
        self.global.insert(kind, constructor);
    }

    pub fn register_local(&mut self, kind: FeatureKind, constructor: LocalConstructor) {
        self.local.insert(kind, constructor);
    }

    pub fn global(&self, tag: &str) -> Result<Box<dyn GlobalFeatureExtractor>, FeatureError> {
        self.global
            .iter()
            .find(|(kind, _)| kind.as_str() == tag)
            .map(|(_, constructor)| constructor())
            .ok_or_else(|| FeatureError::UnknownKind(tag.to_string()))
    }

    pub fn local(&self, tag: &str) -> Result<Box<dyn LocalFeatureExtractor>, FeatureError> {
        self.local
            .iter()
            .find(|(kind, _)| kind.as_str() == tag)
            .map(|(_, constructor)| constructor())
            .ok_or_else(|| FeatureError::UnknownKind(tag.to_string()))
    }

    /// Reads `path` and extracts its local features with the `tag` extractor.
    pub fn extract_local_file(&self, tag: &str, path: &Path) -> IndexResult<Vec<Vec<f64>>> {
        let extractor = self.local(tag)?;
        let content = std::fs::read(path).map_err(|source| IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(extractor.extract(&content)?)
    }

    /// Registered global kinds in tag order.
    pub fn global_kinds(&self) -> Vec<FeatureKind> {
        self.global.keys().copied().collect()
    }

    /// Registered local kinds in tag order.
    pub fn local_kinds(&self) -> Vec<FeatureKind> {
        self.local.keys().copied().collect()
    }
}
