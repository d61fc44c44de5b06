// file: src/rank/weighted.rs
// description: weighted composite scoring and deterministic ordering of items
// reference: normalized sub-scores combined with configurable weights

use crate::config::WeightConfig;
use crate::models::{GroupedItems, Item, Platform};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Observations per day assumed by the frequency normalization.
const FREQUENCY_CEILING: f64 = 24.0;

pub trait Ranker: Send + Sync {
    fn rank(&self, items: GroupedItems) -> Vec<Item>;
}

#[derive(Debug, Clone)]
pub struct WeightedRanker {
    weights: WeightConfig,
    platform_weights: HashMap<String, f64>,
}

impl WeightedRanker {
    pub fn new(weights: WeightConfig, platforms: &[Platform]) -> Self {
        let platform_weights = platforms
            .iter()
            .map(|p| {
                let weight = if p.weight > 0.0 { p.weight } else { 1.0 };
                (p.id.clone(), weight)
            })
            .collect();

        Self {
            weights,
            platform_weights,
        }
    }

    pub fn score(&self, item: &Item) -> f64 {
        let best_rank = item.best_rank().unwrap_or(1).max(1);
        let rank_score = 100.0 / f64::from(best_rank);

        let appearances = if item.appear_count == 0 {
            1
        } else {
            item.appear_count
        };
        let frequency_score = (f64::from(appearances) / FREQUENCY_CEILING * 100.0).min(100.0);

        // Reserved; no upstream signal populates it yet.
        let hotness_score = 0.0;

        let keyword_score = item.match_score.clamp(0.0, 100.0);
        let freshness_score = if item.is_new { 100.0 } else { 0.0 };

        let w = &self.weights;
        let total = rank_score * w.rank_weight
            + frequency_score * w.frequency_weight
            + hotness_score * w.hotness_weight
            + keyword_score * w.keyword_weight
            + freshness_score * w.freshness_weight;

        let platform_weight = self
            .platform_weights
            .get(&item.source_id)
            .copied()
            .unwrap_or(1.0);

        total * (1.0 + (platform_weight - 1.0) * w.platform_weight_effect)
    }
}

impl Ranker for WeightedRanker {
    fn rank(&self, items: GroupedItems) -> Vec<Item> {
        let mut scored: Vec<(f64, Item)> = items
            .into_values()
            .flatten()
            .map(|item| (self.score(&item), item))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.url.cmp(&b.url))
                .then(Ordering::Equal)
        });

        scored.into_iter().map(|(_, item)| item).collect()
    }
}
