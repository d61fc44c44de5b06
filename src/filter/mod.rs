// file: src/filter/mod.rs
// description: keyword filtering module exports
// reference: internal module structure

pub mod keyword;
pub mod rules_file;

pub use keyword::{
    ItemFilter, KeywordFilter, KeywordGroup, KeywordMatcher, MatchResult, ScoringPolicy,
};
pub use rules_file::{KeywordRules, load_rules, parse_rules};
