// 🔍 Duplicate Merger - collapse records that share a canonical title
// The oldest record survives; prices become the mean of the known values.

use crate::db::{CardRecord, PriceFields};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// MERGE GROUP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub canonical_title: String,

    /// Earliest-created record (ties: smallest id)
    pub survivor_id: String,

    /// Everything else in the group, oldest first
    pub removed_ids: Vec<String>,

    /// Per-field mean over the group, ignoring unknown values
    pub merged_prices: PriceFields,
}

// ============================================================================
// DUPLICATE MERGER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DuplicateMerger {
    /// Merge records whose canonical title is empty (default: false)
    pub merge_empty_titles: bool,
}

impl DuplicateMerger {
    pub fn new() -> Self {
        DuplicateMerger::default()
    }

    /// One group per canonical title that has two or more records, in title order
    pub fn plan(&self, records: &[CardRecord]) -> Vec<MergeGroup> {
        let mut by_title: BTreeMap<&str, Vec<&CardRecord>> = BTreeMap::new();

        for record in records {
            if record.canonical_title.is_empty() && !self.merge_empty_titles {
                continue;
            }
            by_title
                .entry(record.canonical_title.as_str())
                .or_default()
                .push(record);
        }

        by_title
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(title, mut members)| {
                members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

                MergeGroup {
                    canonical_title: title.to_string(),
                    survivor_id: members[0].id.clone(),
                    removed_ids: members[1..].iter().map(|r| r.id.clone()).collect(),
                    merged_prices: merge_prices(members.iter().map(|r| &r.prices)),
                }
            })
            .collect()
    }

    /// Apply groups to an in-memory list: survivors take the merged prices,
    /// removed records are dropped. Order of the survivors is preserved.
    pub fn apply_in_memory(&self, records: Vec<CardRecord>, groups: &[MergeGroup]) -> Vec<CardRecord> {
        let survivors: BTreeMap<&str, &MergeGroup> =
            groups.iter().map(|g| (g.survivor_id.as_str(), g)).collect();
        let removed: std::collections::HashSet<&str> = groups
            .iter()
            .flat_map(|g| g.removed_ids.iter().map(String::as_str))
            .collect();

        records
            .into_iter()
            .filter(|r| !removed.contains(r.id.as_str()))
            .map(|mut r| {
                if let Some(group) = survivors.get(r.id.as_str()) {
                    r.prices = group.merged_prices;
                }
                r
            })
            .collect()
    }
}

/// Field-wise mean. A field is `None` only when every input is `None`.
pub fn merge_prices<'a>(prices: impl Iterator<Item = &'a PriceFields> + Clone) -> PriceFields {
    PriceFields {
        raw_average_price: mean(prices.clone().map(|p| p.raw_average_price)),
        psa9_average_price: mean(prices.clone().map(|p| p.psa9_average_price)),
        psa10_price: mean(prices.clone().map(|p| p.psa10_price)),
        psa10_average_price: mean(prices.clone().map(|p| p.psa10_average_price)),
        multiplier: mean(prices.map(|p| p.multiplier)),
    }
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

// ============================================================================
// TESTS
// ============================================================================
