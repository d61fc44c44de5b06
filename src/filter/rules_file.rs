// file: src/filter/rules_file.rs
// description: parser for the blank-line separated keyword rules file
// reference: line-prefixed rule syntax (`+` required, `!` global filter, `@` priority)

use super::keyword::{DEFAULT_PRIORITY, KeywordGroup};
use crate::error::{PipelineError, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordRules {
    pub groups: Vec<KeywordGroup>,
    pub global_filters: Vec<String>,
}

/// Reads the rules file. A missing file means "no keyword filtering".
pub fn load_rules(path: &Path) -> Result<KeywordRules> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Keyword file {} not found, all items will pass the filter",
                path.display()
            );
            return Ok(KeywordRules::default());
        }
        Err(source) => {
            return Err(PipelineError::KeywordFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let rules = parse_rules(&content)?;
    info!(
        "Loaded {} keyword groups and {} global filters from {}",
        rules.groups.len(),
        rules.global_filters.len(),
        path.display()
    );
    Ok(rules)
}

pub fn parse_rules(content: &str) -> Result<KeywordRules> {
    let mut rules = KeywordRules::default();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut required = Vec::new();
        let mut normal = Vec::new();
        let mut priority = DEFAULT_PRIORITY;

        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(term) = line.strip_prefix('!') {
                if !term.trim().is_empty() {
                    rules.global_filters.push(term.trim().to_string());
                }
            } else if let Some(term) = line.strip_prefix('+') {
                required.push(term.to_string());
            } else if let Some(value) = line.strip_prefix('@') {
                let parsed: i64 = value.trim().parse().map_err(|_| {
                    PipelineError::Config(format!("invalid keyword group priority '{}'", line))
                })?;
                priority = parsed.clamp(1, 10) as u8;
            } else {
                normal.push(line.to_string());
            }
        }

        if let Some(group) = KeywordGroup::new(required, normal, priority) {
            rules.groups.push(group);
        }
    }

    Ok(rules)
}
