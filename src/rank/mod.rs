// file: src/rank/mod.rs
// description: ranking module exports
// reference: internal module structure

mod weighted;

pub use weighted::{Ranker, WeightedRanker};
