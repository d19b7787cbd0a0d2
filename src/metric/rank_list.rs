//! Rank lists and footrule scoring.

use std::collections::HashMap;

use crate::storage::FieldValue;

/// Store field holding an item's rank list.
pub const RANK_LIST_FIELD: &str = "ro_order";

/// Reference objects of an item ordered by distance, nearest first.
///
/// Entries are positions in the reference set, not item ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankList(Vec<u32>);

impl RankList {
    #[must_use]
    pub fn new(references: Vec<u32>) -> Self {
        Self(references)
    }

    #[must_use]
    pub fn references(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of `reference` in this list.
    #[must_use]
    pub fn position(&self, reference: u32) -> Option<usize> {
        self.0.iter().position(|&r| r == reference)
    }

    /// Token form stored in [`RANK_LIST_FIELD`]: `R<ref>` in rank order.
    #[must_use]
    pub fn to_field(&self) -> FieldValue {
        FieldValue::Tokens(self.0.iter().map(|r| format!("R{r}")).collect())
    }

    /// Parses the token form; `None` if any token is malformed.
    #[must_use]
    pub fn from_tokens(tokens: &[String]) -> Option<Self> {
        tokens
            .iter()
            .map(|token| token.strip_prefix('R')?.parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()
            .map(Self)
    }
}

/// Largest footrule distance used for score conversion with `used`
/// references per list.
#[must_use]
pub fn max_footrule(used: usize) -> usize {
    used.saturating_sub(1) * used
}

/// Footrule distance between a query list and a candidate list.
///
/// Sums `|query_position - candidate_position|` over the references of the
/// query; a reference missing from the candidate counts at position `used`.
#[must_use]
pub fn footrule(query: &RankList, candidate: &RankList, used: usize) -> usize {
    let positions: HashMap<u32, usize> = candidate
        .references()
        .iter()
        .enumerate()
        .map(|(position, &reference)| (reference, position))
        .collect();
    query
        .references()
        .iter()
        .enumerate()
        .map(|(position, reference)| {
            let other = positions.get(reference).copied().unwrap_or(used);
            position.abs_diff(other)
        })
        .sum()
}

/// Similarity score of a candidate: `max_footrule(used) - footrule`.
///
/// Clamped at zero for candidates further away than the conversion bound.
#[must_use]
pub fn footrule_score(query: &RankList, candidate: &RankList, used: usize) -> usize {
    max_footrule(used).saturating_sub(footrule(query, candidate, used))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_lists_score_maximum() {
        let list = RankList::new(vec![4, 2, 9, 0]);
        assert_eq!(footrule(&list, &list, 4), 0);
        assert_eq!(footrule_score(&list, &list, 4), max_footrule(4));
        assert_eq!(max_footrule(4), 12);
    }

    #[test]
    fn test_missing_reference_counts_at_end() {
        let query = RankList::new(vec![1, 2, 3]);
        let candidate = RankList::new(vec![2, 1, 7]);
        // |0-1| + |1-0| + |2-3|
        assert_eq!(footrule(&query, &candidate, 3), 3);
        assert_eq!(footrule_score(&query, &candidate, 3), 3);
    }

    #[test]
    fn test_token_round_trip() {
        let list = RankList::new(vec![10, 0, 499]);
        let field = list.to_field();
        let tokens = field.as_tokens().unwrap();
        assert_eq!(tokens, ["R10", "R0", "R499"]);
        assert_eq!(RankList::from_tokens(tokens), Some(list));
        assert_eq!(RankList::from_tokens(&["X1".to_string()]), None);
    }
}
