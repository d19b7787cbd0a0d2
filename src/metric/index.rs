use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::metric::{
    MetricIndexError, RANK_LIST_FIELD, RankList, ReferenceObjectSet, max_footrule,
};
use crate::storage::{FieldValue, ItemStore};
use crate::vector::{FeatureDistance, ItemId, L2Distance, SearchHit, VectorError};

/// Lifecycle of an index generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    ReferenceObjectSelection,
    ReferenceObjectIndexing,
    RankListIndexing,
    Ready,
}

/// Sizes of a generation and of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpacesOptions {
    pub num_reference_objects: usize,
    /// Length of every rank list.
    pub num_reference_objects_used: usize,
    pub num_hits: usize,
    /// Worker threads for rank-list construction.
    pub parallel_threads: usize,
    /// Seed for reference selection; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for MetricSpacesOptions {
    fn default() -> Self {
        Self {
            num_reference_objects: 500,
            num_reference_objects_used: 50,
            num_hits: 100,
            parallel_threads: num_cpus::get(),
            seed: None,
        }
    }
}

impl MetricSpacesOptions {
    pub fn validate(&self) -> Result<(), MetricIndexError> {
        let used = self.num_reference_objects_used;
        if used == 0 || used > self.num_reference_objects {
            return Err(MetricIndexError::InvalidReferenceCounts {
                used,
                total: self.num_reference_objects,
            });
        }
        Ok(())
    }
}

/// Inverted-list index over rank lists.
///
/// The reference set is persisted in the index directory; rank lists live in
/// the item store under [`RANK_LIST_FIELD`] and are mirrored here as inverted
/// lists for scoring.
pub struct MetricSpacesIndex {
    dir: PathBuf,
    options: MetricSpacesOptions,
    state: IndexState,
    distance: Arc<dyn FeatureDistance>,
    references: Option<ReferenceObjectSet>,
    rank_lists: HashMap<ItemId, RankList>,
    /// reference position -> (item, position of the reference in its list)
    postings: HashMap<u32, Vec<(ItemId, usize)>>,
}

impl MetricSpacesIndex {
    pub fn new(dir: impl Into<PathBuf>, options: MetricSpacesOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
            state: IndexState::Uninitialized,
            distance: Arc::new(L2Distance),
            references: None,
            rank_lists: HashMap::new(),
            postings: HashMap::new(),
        }
    }

    /// Replaces the exact distance used against the reference objects.
    #[must_use]
    pub fn with_distance(mut self, distance: Arc<dyn FeatureDistance>) -> Self {
        self.distance = distance;
        self
    }

    /// Reopens a generation written by [`MetricSpacesIndex::create_index`].
    ///
    /// The reference set is read from `dir`; inverted lists are rebuilt from
    /// the rank-list fields of the live items in `store`.
    pub fn open<S: ItemStore + ?Sized>(
        dir: impl Into<PathBuf>,
        options: MetricSpacesOptions,
        store: &S,
    ) -> Result<Self, MetricIndexError> {
        let mut index = Self::new(dir, options);
        let references = ReferenceObjectSet::load(&index.dir)?;
        if index.options.num_reference_objects_used > references.len() {
            return Err(MetricIndexError::InvalidReferenceCounts {
                used: index.options.num_reference_objects_used,
                total: references.len(),
            });
        }
        index.references = Some(references);

        for id in store.live_ids() {
            let Some(FieldValue::Tokens(tokens)) = store.field(id, RANK_LIST_FIELD) else {
                continue;
            };
            match RankList::from_tokens(&tokens) {
                Some(list) => index.remember(id, list),
                None => warn!("ignoring malformed rank list of item {id}"),
            }
        }
        index.state = IndexState::Ready;
        info!(
            "opened metric index at {} with {} rank lists",
            index.dir.display(),
            index.rank_lists.len()
        );
        Ok(index)
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn references(&self) -> Option<&ReferenceObjectSet> {
        self.references.as_ref()
    }

    /// Number of items with a rank list.
    pub fn len(&self) -> usize {
        self.rank_lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rank_lists.is_empty()
    }

    pub fn rank_list(&self, id: ItemId) -> Option<&RankList> {
        self.rank_lists.get(&id)
    }

    fn transition(&mut self, state: IndexState) {
        debug!("metric index: {:?} -> {state:?}", self.state);
        self.state = state;
    }

    fn remember(&mut self, id: ItemId, list: RankList) {
        for (position, &reference) in list.references().iter().enumerate() {
            self.postings
                .entry(reference)
                .or_default()
                .push((id, position));
        }
        self.rank_lists.insert(id, list);
    }

    /// Starts a new generation: selects reference objects, persists them and
    /// ranks every live item. Returns the number of indexed items.
    ///
    /// On failure the index is left uninitialized.
    pub fn create_index<S: ItemStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<usize, MetricIndexError> {
        let result = self.build_generation(store);
        if result.is_err() {
            self.references = None;
            self.rank_lists.clear();
            self.postings.clear();
            self.state = IndexState::Uninitialized;
        }
        result
    }

    fn build_generation<S: ItemStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<usize, MetricIndexError> {
        self.options.validate()?;
        self.transition(IndexState::ReferenceObjectSelection);
        let candidates: Vec<ItemId> = store
            .live_ids()
            .into_iter()
            .filter(|id| store.feature_vector(*id).is_some())
            .collect();
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let references = ReferenceObjectSet::select(
            store,
            &candidates,
            self.options.num_reference_objects,
            &mut rng,
        )?;

        self.transition(IndexState::ReferenceObjectIndexing);
        references.save(&self.dir)?;
        self.references = Some(references);

        self.transition(IndexState::RankListIndexing);
        self.rank_lists.clear();
        self.postings.clear();
        let indexed = self.index_missing(store)?;

        self.transition(IndexState::Ready);
        info!(
            "created metric index with {} reference objects and {indexed} rank lists",
            self.options.num_reference_objects
        );
        Ok(indexed)
    }

    /// Brings the index in line with `store`. Idempotent.
    ///
    /// Rank lists of deleted items, and of items whose rank-list field was
    /// cleared by an update, are dropped first; every live item without a
    /// rank list is then ranked. Returns the number of items ranked.
    pub fn update_index<S: ItemStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<usize, MetricIndexError> {
        self.ensure_ready()?;
        let dropped = self.prune_stale(store);
        let indexed = self.index_missing(store)?;
        info!("updated metric index: {indexed} rank lists computed, {dropped} stale dropped");
        Ok(indexed)
    }

    fn prune_stale<S: ItemStore + ?Sized>(&mut self, store: &S) -> usize {
        let stale: Vec<ItemId> = self
            .rank_lists
            .keys()
            .copied()
            .filter(|&id| !store.is_live(id) || store.field(id, RANK_LIST_FIELD).is_none())
            .collect();
        for &id in &stale {
            debug!("dropping stale rank list of item {id}");
            self.forget(id);
        }
        stale.len()
    }

    fn forget(&mut self, id: ItemId) {
        let Some(list) = self.rank_lists.remove(&id) else {
            return;
        };
        for reference in list.references() {
            if let Some(postings) = self.postings.get_mut(reference) {
                postings.retain(|(item, _)| *item != id);
                if postings.is_empty() {
                    self.postings.remove(reference);
                }
            }
        }
    }

    fn index_missing<S: ItemStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<usize, MetricIndexError> {
        let Some(references) = self.references.as_ref() else {
            return Err(MetricIndexError::NotReady(self.state));
        };
        let dimension = references.dimension();

        let mut pending = Vec::new();
        for id in store.live_ids() {
            if self.rank_lists.contains_key(&id) {
                continue;
            }
            let Some(vector) = store.feature_vector(id) else {
                continue;
            };
            if vector.len() != dimension {
                warn!(
                    "skipping item {id}: dimension {} does not match reference dimension {dimension}",
                    vector.len()
                );
                continue;
            }
            pending.push((id, vector));
        }

        let lists = self.rank_in_parallel(references, pending)?;
        let indexed = lists.len();
        for (id, list) in lists {
            store.put_field(id, RANK_LIST_FIELD, list.to_field())?;
            self.remember(id, list);
        }
        Ok(indexed)
    }

    fn rank_in_parallel(
        &self,
        references: &ReferenceObjectSet,
        items: Vec<(ItemId, Vec<f64>)>,
    ) -> Result<Vec<(ItemId, RankList)>, MetricIndexError> {
        let used = self.options.num_reference_objects_used;
        let distance = &*self.distance;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallel_threads.max(1))
            .thread_name(|i| format!("rank-list-{i}"))
            .build()
            .map_err(|e| MetricIndexError::ThreadPool(e.to_string()))?;

        Ok(pool.install(|| {
            items
                .into_par_iter()
                .map(|(id, vector)| (id, references.rank(&vector, used, distance)))
                .collect()
        }))
    }

    fn ensure_ready(&self) -> Result<&ReferenceObjectSet, MetricIndexError> {
        match (&self.references, self.state) {
            (Some(references), IndexState::Ready) => Ok(references),
            _ => Err(MetricIndexError::NotReady(self.state)),
        }
    }

    /// Rank list of an arbitrary query vector.
    pub fn query_rank_list(&self, query: &[f64]) -> Result<RankList, MetricIndexError> {
        let references = self.ensure_ready()?;
        if query.len() != references.dimension() {
            return Err(VectorError::DimensionMismatch {
                expected: references.dimension(),
                actual: query.len(),
            }
            .into());
        }
        Ok(references.rank(
            query,
            self.options.num_reference_objects_used,
            &*self.distance,
        ))
    }

    /// Top `num_hits` items for a query vector.
    ///
    /// Only items known at the last create or update are scored; deletions
    /// in the store take effect on the next [`MetricSpacesIndex::update_index`].
    pub fn search(&self, query: &[f64]) -> Result<Vec<SearchHit>, MetricIndexError> {
        let list = self.query_rank_list(query)?;
        Ok(self.score(&list))
    }

    /// Top `num_hits` items for an indexed item, reusing its stored rank list.
    pub fn search_item(&self, id: ItemId) -> Result<Vec<SearchHit>, MetricIndexError> {
        self.ensure_ready()?;
        let list = self
            .rank_lists
            .get(&id)
            .ok_or(MetricIndexError::NotIndexed(id))?;
        Ok(self.score(list))
    }

    /// Scores every indexed item by footrule similarity to `query`.
    ///
    /// Every item starts with the footrule of a list that shares no
    /// reference with the query; the inverted lists then correct it for the
    /// references the item does share. Hits are ordered by descending score,
    /// ties by ascending item id.
    fn score(&self, query: &RankList) -> Vec<SearchHit> {
        let used = self.options.num_reference_objects_used;
        let max = max_footrule(used) as i64;
        let disjoint: i64 = (0..query.len()).map(|p| used.abs_diff(p) as i64).sum();

        let mut corrections: HashMap<ItemId, i64> = HashMap::new();
        for (p, reference) in query.references().iter().enumerate() {
            let Some(postings) = self.postings.get(reference) else {
                continue;
            };
            let absent = used.abs_diff(p) as i64;
            for &(item, q) in postings {
                *corrections.entry(item).or_default() += p.abs_diff(q) as i64 - absent;
            }
        }

        let mut hits: Vec<(ItemId, i64)> = self
            .rank_lists
            .keys()
            .map(|&item| {
                let footrule = disjoint + corrections.get(&item).copied().unwrap_or(0);
                (item, (max - footrule).max(0))
            })
            .collect();
        hits.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(self.options.num_hits);
        hits.into_iter()
            .map(|(item, score)| SearchHit::new(item, score as f64))
            .collect()
    }
}
