use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::hashing::{HashBank, HashingError, hash_tokens};
use crate::storage::{FieldValue, ItemStore};
use crate::vector::{ItemId, SearchHit, l2_distance};

/// Limits applied by [`HashSearcher::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSearchOptions {
    /// Candidates kept after collision counting.
    pub max_candidates: usize,
    /// Hits returned after exact re-ranking.
    pub num_hits: usize,
}

impl Default for HashSearchOptions {
    fn default() -> Self {
        Self {
            max_candidates: 500,
            num_hits: 100,
        }
    }
}

/// Indexes global features by their hash tokens and answers queries by
/// collision counting followed by exact re-ranking.
pub struct HashSearcher<'a, B: HashBank + ?Sized> {
    bank: &'a B,
    field: String,
    options: HashSearchOptions,
}

impl<'a, B: HashBank + ?Sized> HashSearcher<'a, B> {
    /// Tokens are stored in `"<kind>_<bank name>"`, e.g. `"color_lsh"`.
    pub fn new(bank: &'a B, kind: &str, options: HashSearchOptions) -> Self {
        Self {
            field: format!("{kind}_{}", bank.name()),
            bank,
            options,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Hashes one item's global feature into its token field.
    pub fn index_item<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        id: ItemId,
    ) -> Result<bool, HashingError> {
        let Some(vector) = store.feature_vector(id) else {
            return Ok(false);
        };
        let tokens = hash_tokens(&self.bank.hash(&vector)?);
        store.put_field(id, &self.field, FieldValue::Tokens(tokens))?;
        Ok(true)
    }

    /// Hashes every live item with a global feature.
    ///
    /// Items whose vector the bank rejects are logged and skipped; store
    /// failures abort the pass. Returns the number of indexed items.
    pub fn index_all<S: ItemStore + ?Sized>(&self, store: &S) -> Result<usize, HashingError> {
        let mut indexed = 0;
        for id in store.live_ids() {
            match self.index_item(store, id) {
                Ok(true) => indexed += 1,
                Ok(false) => {}
                Err(HashingError::Storage(e)) => return Err(HashingError::Storage(e)),
                Err(e) => warn!("could not hash item {id}: {e}"),
            }
        }
        info!("hashed {indexed} items into field '{}'", self.field);
        Ok(indexed)
    }

    /// Items sharing at least one token with `query`, most collisions first.
    ///
    /// Ties are broken by ascending item id. At most `max_candidates` are
    /// returned.
    pub fn candidates<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        query: &[f64],
    ) -> Result<Vec<(ItemId, usize)>, HashingError> {
        let query_tokens: HashSet<String> =
            hash_tokens(&self.bank.hash(query)?).into_iter().collect();

        let mut collisions: HashMap<ItemId, usize> = HashMap::new();
        for id in store.live_ids() {
            let Some(FieldValue::Tokens(tokens)) = store.field(id, &self.field) else {
                continue;
            };
            let shared = tokens
                .iter()
                .filter(|token| query_tokens.contains(*token))
                .count();
            if shared > 0 {
                collisions.insert(id, shared);
            }
        }

        let mut ranked: Vec<(ItemId, usize)> = collisions.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.options.max_candidates);
        debug!("{} hash candidates for query", ranked.len());
        Ok(ranked)
    }

    /// Shortlists candidates by hash collisions, then re-ranks them by exact
    /// L2 distance. Scores are negated distances, so the best hit scores
    /// highest.
    pub fn search<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        query: &[f64],
    ) -> Result<Vec<SearchHit>, HashingError> {
        let mut hits: Vec<SearchHit> = self
            .candidates(store, query)?
            .into_iter()
            .filter_map(|(id, _)| {
                store
                    .feature_vector(id)
                    .map(|vector| SearchHit::new(id, -l2_distance(query, &vector)))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.item.cmp(&b.item))
        });
        hits.truncate(self.options.num_hits);
        Ok(hits)
    }
}
