//! Reference objects of a metric-space index generation.

use std::cmp::Ordering;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metric::{MetricIndexError, RankList};
use crate::storage::{IndexMetadata, ItemStore, load_json, save_json};
use crate::vector::{FeatureDistance, ItemId};

/// File name of the persisted reference set inside an index directory.
pub const REFERENCE_FILE: &str = "reference_objects.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReferenceObject {
    item: u32,
    vector: Vec<f64>,
}

/// Sampled corpus items used as fixed landmarks.
///
/// Immutable once selected; every rank list of a generation refers to
/// positions in this set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceObjectSet {
    metadata: IndexMetadata,
    objects: Vec<ReferenceObject>,
}

impl ReferenceObjectSet {
    /// Draws `count` distinct items uniformly from `candidates`.
    pub fn select<S, R>(
        store: &S,
        candidates: &[ItemId],
        count: usize,
        rng: &mut R,
    ) -> Result<Self, MetricIndexError>
    where
        S: ItemStore + ?Sized,
        R: Rng + ?Sized,
    {
        if candidates.len() < count {
            return Err(MetricIndexError::CorpusTooSmall {
                items: candidates.len(),
                required: count,
            });
        }
        let picks = rand::seq::index::sample(rng, candidates.len(), count);
        let mut objects = Vec::with_capacity(count);
        for index in picks.iter() {
            let id = candidates[index];
            let vector = store
                .feature_vector(id)
                .ok_or(MetricIndexError::MissingFeature(id))?;
            objects.push(ReferenceObject {
                item: id.get(),
                vector,
            });
        }
        let dimension = objects.first().map_or(0, |object| object.vector.len());
        debug!("selected {count} reference objects of dimension {dimension}");
        Ok(Self {
            metadata: IndexMetadata::new("metric_spaces", dimension, count),
            objects,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.metadata.dimension
    }

    #[must_use]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Corpus item behind a reference position.
    #[must_use]
    pub fn item(&self, reference: u32) -> Option<ItemId> {
        self.objects
            .get(reference as usize)
            .map(|object| ItemId::new(object.item))
    }

    /// Exact search over the reference set: the `used` nearest references
    /// to `vector`, ascending by distance, ties by reference position.
    pub fn rank<D: FeatureDistance + ?Sized>(
        &self,
        vector: &[f64],
        used: usize,
        distance: &D,
    ) -> RankList {
        let mut distances: Vec<(u32, f64)> = self
            .objects
            .iter()
            .enumerate()
            .map(|(position, object)| (position as u32, distance.distance(vector, &object.vector)))
            .collect();
        distances.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        RankList::new(
            distances
                .into_iter()
                .take(used)
                .map(|(position, _)| position)
                .collect(),
        )
    }

    pub fn save(&self, dir: &Path) -> Result<(), MetricIndexError> {
        save_json(&dir.join(REFERENCE_FILE), self)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, MetricIndexError> {
        let set: Self = load_json(&dir.join(REFERENCE_FILE))?;
        set.metadata.check_version()?;
        Ok(set)
    }
}
