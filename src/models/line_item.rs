use serde::{Deserialize, Serialize};

use super::{ConfidenceLevel, MatchResult};

/// 发票明细行 (待匹配的概念描述)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default)]
    pub tax_code: Option<String>,
}

impl LineItem {
    pub fn new(description: impl Into<String>, tax_code: Option<&str>) -> Self {
        Self {
            description: description.into(),
            tax_code: tax_code.map(str::to_string),
        }
    }
}

/// 匹配统计信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
    pub exact: usize,
    pub alta: usize,
    pub media: usize,
    pub no_match: usize,
    pub match_rate: f64,
}

impl MatchStats {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result.level() {
                Some(ConfidenceLevel::Exact) => stats.exact += 1,
                Some(ConfidenceLevel::Alta) => stats.alta += 1,
                Some(ConfidenceLevel::Media) => stats.media += 1,
                None => stats.no_match += 1,
            }
        }

        stats.matched = stats.total - stats.no_match;
        if stats.total > 0 {
            stats.match_rate = stats.matched as f64 / stats.total as f64 * 100.0;
        }
        stats
    }
}
