use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregate::{AggregationError, Aggregator};
use crate::clustering::Codebook;
use crate::storage::{ItemStore, StorageResult};
use crate::vector::ItemId;

/// Store field holding the output of `aggregator` for a vocabulary of
/// `num_clusters`, e.g. `"sift_vlad_512"`.
#[must_use]
pub fn aggregate_field_name(kind: &str, aggregator: &str, num_clusters: usize) -> String {
    format!("{kind}_{aggregator}_{num_clusters}")
}

/// Summary of a corpus aggregation pass.
#[derive(Debug, Default)]
pub struct AggregationReport {
    /// Items whose fields were written.
    pub aggregated: usize,
    /// Live items without local features.
    pub skipped: usize,
    /// Items that could not be aggregated, with the reason.
    pub failed: Vec<(ItemId, AggregationError)>,
}

/// Writes aggregated fields for every live item of a store.
pub struct CorpusAggregator<'a, S: ItemStore + ?Sized> {
    store: &'a S,
    kind: String,
    codebooks: Vec<Arc<Codebook>>,
    aggregators: Vec<Box<dyn Aggregator>>,
}

impl<'a, S: ItemStore + ?Sized> CorpusAggregator<'a, S> {
    /// `kind` names the local feature in field names.
    pub fn new(store: &'a S, kind: impl Into<String>, codebooks: Vec<Arc<Codebook>>) -> Self {
        Self {
            store,
            kind: kind.into(),
            codebooks,
            aggregators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_aggregator(mut self, aggregator: impl Aggregator + 'static) -> Self {
        self.aggregators.push(Box::new(aggregator));
        self
    }

    /// Aggregates a single item and writes its fields.
    ///
    /// Nothing is written unless every aggregator succeeds for every codebook.
    pub fn aggregate_item(
        &self,
        id: ItemId,
        features: &[Vec<f64>],
    ) -> StorageResult<Result<(), AggregationError>> {
        let mut fields = Vec::with_capacity(self.aggregators.len() * self.codebooks.len());
        for aggregator in &self.aggregators {
            let outputs = match aggregator.aggregate_all(&self.codebooks, features) {
                Ok(outputs) => outputs,
                Err(e) => return Ok(Err(e)),
            };
            for (codebook, output) in self.codebooks.iter().zip(outputs) {
                let name = aggregate_field_name(&self.kind, aggregator.name(), codebook.len());
                fields.push((name, output.to_field()));
            }
        }
        for (name, value) in fields {
            self.store.put_field(id, &name, value)?;
        }
        Ok(Ok(()))
    }

    /// Aggregates every live item.
    ///
    /// Per-item aggregation failures are collected in the report; store
    /// failures abort the pass.
    pub fn run(&self) -> StorageResult<AggregationReport> {
        let mut report = AggregationReport::default();
        for id in self.store.live_ids() {
            let features = match self.store.local_features(id) {
                Some(features) if !features.is_empty() => features,
                _ => {
                    debug!("item {id} has no local features, skipping");
                    report.skipped += 1;
                    continue;
                }
            };
            match self.aggregate_item(id, &features)? {
                Ok(()) => report.aggregated += 1,
                Err(e) => {
                    warn!("could not aggregate item {id}: {e}");
                    report.failed.push((id, e));
                }
            }
        }
        info!(
            "aggregated {} items ({} skipped, {} failed)",
            report.aggregated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }
}
