// file: src/filter/keyword.rs
// description: keyword group scoring with a global exclusion veto
// reference: configurable substring rules, see repository classifier

use crate::config::KeywordConfig;
use crate::models::{GroupedItems, Item};
use tracing::debug;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

/// Narrows a crawl down to the items worth releasing.
pub trait ItemFilter: Send + Sync {
    fn filter(&self, data: GroupedItems) -> GroupedItems;
}

/// One OR-branch of the keyword policy.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordGroup {
    required: Vec<String>,
    normal: Vec<String>,
    priority: u8,
    key: String,
}

impl KeywordGroup {
    /// Returns `None` for a group with neither required nor normal terms.
    pub fn new(required: Vec<String>, normal: Vec<String>, priority: u8) -> Option<Self> {
        let required: Vec<String> = required
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let normal: Vec<String> = normal
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if required.is_empty() && normal.is_empty() {
            return None;
        }

        let key = if normal.is_empty() {
            required.join(" ")
        } else {
            normal.join(" ")
        };

        Some(Self {
            required,
            normal,
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            key,
        })
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn normal(&self) -> &[String] {
        &self.normal
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Point values and the priority midpoint used to scale group scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub required_weight: f64,
    pub normal_weight: f64,
    pub neutral_priority: u8,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            required_weight: 20.0,
            normal_weight: 10.0,
            neutral_priority: DEFAULT_PRIORITY,
        }
    }
}

impl From<&KeywordConfig> for ScoringPolicy {
    fn from(config: &KeywordConfig) -> Self {
        Self {
            required_weight: config.required_weight,
            normal_weight: config.normal_weight,
            neutral_priority: config.neutral_priority.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    pub matched: bool,
    pub score: f64,
    pub matched_terms: Vec<String>,
    pub group_index: Option<usize>,
}

impl MatchResult {
    fn unmatched() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
struct CompiledGroup {
    required: Vec<(String, String)>,
    normal: Vec<(String, String)>,
    multiplier: f64,
}

/// Pure scorer over case-folded titles.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    groups: Vec<CompiledGroup>,
    filters: Vec<String>,
    policy: ScoringPolicy,
}

impl KeywordMatcher {
    pub fn new(groups: &[KeywordGroup], filters: &[String], policy: ScoringPolicy) -> Self {
        let neutral = f64::from(policy.neutral_priority.max(1));
        let fold = |terms: &[String]| {
            terms
                .iter()
                .map(|t| (t.to_lowercase(), t.clone()))
                .collect::<Vec<_>>()
        };

        let groups = groups
            .iter()
            .map(|g| CompiledGroup {
                required: fold(&g.required),
                normal: fold(&g.normal),
                multiplier: f64::from(g.priority) / neutral,
            })
            .collect();

        let filters = filters
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();

        Self {
            groups,
            filters,
            policy,
        }
    }

    pub fn has_groups(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn match_title(&self, title: &str) -> MatchResult {
        let folded = title.to_lowercase();

        if self.filters.iter().any(|f| folded.contains(f.as_str())) {
            return MatchResult::unmatched();
        }

        let mut best = MatchResult::unmatched();

        for (index, group) in self.groups.iter().enumerate() {
            let mut score = 0.0;
            let mut terms = Vec::new();

            let all_required = group.required.iter().all(|(folded_term, term)| {
                let hit = folded.contains(folded_term.as_str());
                if hit {
                    score += self.policy.required_weight;
                    terms.push(term.clone());
                }
                hit
            });
            if !all_required {
                continue;
            }

            if !group.normal.is_empty() {
                let mut any_normal = false;
                for (folded_term, term) in &group.normal {
                    if folded.contains(folded_term.as_str()) {
                        score += self.policy.normal_weight;
                        terms.push(term.clone());
                        any_normal = true;
                    }
                }
                if !any_normal {
                    continue;
                }
            }

            let score = score * group.multiplier;
            if score > best.score {
                best = MatchResult {
                    matched: true,
                    score,
                    matched_terms: terms,
                    group_index: Some(index),
                };
            }
        }

        best
    }
}

/// Applies a [`KeywordMatcher`] to grouped crawl results and stamps the
/// score fields onto surviving items.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    matcher: KeywordMatcher,
}

impl KeywordFilter {
    pub fn new(matcher: KeywordMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    fn score_item(&self, mut item: Item) -> Option<Item> {
        let result = self.matcher.match_title(&item.title);
        if !result.matched {
            return None;
        }
        item.match_score = result.score;
        item.matched_keywords = result.matched_terms;
        item.keyword_group = result.group_index;
        Some(item)
    }
}

impl ItemFilter for KeywordFilter {
    fn filter(&self, data: GroupedItems) -> GroupedItems {
        // No groups configured means everything passes untouched.
        if !self.matcher.has_groups() {
            return data;
        }

        let mut result = GroupedItems::new();
        for (source, items) in data {
            let before = items.len();
            let kept: Vec<Item> = items
                .into_iter()
                .filter_map(|item| self.score_item(item))
                .collect();
            debug!(source = %source, before, after = kept.len(), "keyword filter applied");
            if !kept.is_empty() {
                result.insert(source, kept);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(required: &[&str], normal: &[&str], priority: u8) -> KeywordGroup {
        KeywordGroup::new(
            required.iter().map(|s| s.to_string()).collect(),
            normal.iter().map(|s| s.to_string()).collect(),
            priority,
        )
        .unwrap()
    }

    fn matcher(groups: Vec<KeywordGroup>, filters: &[&str]) -> KeywordMatcher {
        let filters: Vec<String> = filters.iter().map(|s| s.to_string()).collect();
        KeywordMatcher::new(&groups, &filters, ScoringPolicy::default())
    }

    #[test]
    fn test_empty_group_not_constructible() {
        assert!(KeywordGroup::new(vec![], vec![], 5).is_none());
        assert!(KeywordGroup::new(vec!["  ".to_string()], vec![], 5).is_none());
    }

    #[test]
    fn test_group_key_and_priority_clamp() {
        let g = group(&["AI"], &["融资", "产品"], 42);
        assert_eq!(g.key(), "融资 产品");
        assert_eq!(g.priority(), MAX_PRIORITY);
        assert_eq!(group(&["AI"], &[], 0).key(), "AI");
        assert_eq!(group(&["AI"], &[], 0).priority(), MIN_PRIORITY);
    }

    #[test]
    fn test_global_filter_vetoes_group_match() {
        let m = matcher(vec![group(&[], &["发布"], 5)], &["广告"]);
        let result = m.match_title("新品发布·广告推广");
        assert!(!result.matched);
        assert_eq!(result.group_index, None);
    }

    #[test]
    fn test_required_and_normal_scoring_with_priority() {
        let m = matcher(vec![group(&["AI"], &["融资", "产品"], 10)], &[]);
        let result = m.match_title("AI公司完成融资");
        assert!(result.matched);
        assert_eq!(result.score, 60.0);
        assert_eq!(result.matched_terms, vec!["AI".to_string(), "融资".to_string()]);
        assert_eq!(result.group_index, Some(0));
    }

    #[test]
    fn test_case_insensitive_match() {
        let m = matcher(vec![group(&["rust"], &[], 5)], &[]);
        let result = m.match_title("Rust 2024 edition lands");
        assert!(result.matched);
        assert_eq!(result.score, 20.0);
    }

    #[test]
    fn test_missing_required_skips_group() {
        let m = matcher(vec![group(&["AI", "芯片"], &[], 5)], &[]);
        assert!(!m.match_title("AI公司完成融资").matched);
    }

    #[test]
    fn test_normal_terms_need_one_hit() {
        let m = matcher(vec![group(&[], &["华为", "小米"], 5)], &[]);
        assert!(!m.match_title("苹果发布会").matched);
        let both = m.match_title("华为小米同日发布");
        assert_eq!(both.score, 20.0);
    }

    #[test]
    fn test_low_priority_scales_down() {
        let m = matcher(vec![group(&[], &["股市"], 1)], &[]);
        let result = m.match_title("股市收盘");
        assert!(result.matched);
        assert!((result.score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_group_wins_and_ties_keep_first() {
        let m = matcher(
            vec![
                group(&[], &["世界杯"], 5),
                group(&[], &["足球"], 5),
                group(&["世界杯"], &["足球"], 5),
            ],
            &[],
        );
        let result = m.match_title("世界杯足球决赛");
        assert_eq!(result.group_index, Some(2));
        assert_eq!(result.score, 30.0);

        let tie = m.match_title("足球世界杯");
        assert_eq!(tie.group_index, Some(2));

        let m = matcher(vec![group(&[], &["足球"], 5), group(&[], &["决赛"], 5)], &[]);
        assert_eq!(m.match_title("足球决赛").group_index, Some(0));
    }

    #[test]
    fn test_filter_passes_everything_without_groups() {
        let f = KeywordFilter::new(matcher(vec![], &["广告"]));
        let mut data = GroupedItems::new();
        data.insert("weibo".to_string(), vec![Item::new("广告", "weibo", 1)]);
        let out = f.filter(data.clone());
        assert_eq!(out, data);
    }

    #[test]
    fn test_filter_stamps_scores_and_drops_empty_sources() {
        let f = KeywordFilter::new(matcher(vec![group(&["AI"], &[], 5)], &[]));
        let mut data = GroupedItems::new();
        data.insert(
            "zhihu".to_string(),
            vec![Item::new("AI 芯片", "zhihu", 1), Item::new("天气", "zhihu", 2)],
        );
        data.insert("weibo".to_string(), vec![Item::new("明星", "weibo", 1)]);

        let out = f.filter(data);
        assert_eq!(out.len(), 1);
        let items = &out["zhihu"];
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].match_score, 20.0);
        assert_eq!(items[0].matched_keywords, vec!["AI".to_string()]);
        assert_eq!(items[0].keyword_group, Some(0));
    }
}
