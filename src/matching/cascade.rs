use std::sync::Arc;

use super::lexicon::expand;
use super::normalizer::normalize;
use super::stages::{
    ExactStage, FullCatalogStage, HistoryStage, HistoryTokenSetStage, MatchContext, MatchStage,
    StageOutcome, TaxCodeStage,
};
use super::{CatalogIndex, SupplierHistory};
use crate::config::MatchConfig;
use crate::models::{LineItem, MatchOutcome, MatchResult, NoMatch, NoMatchReason, StageTrace};

/// 商品匹配引擎：按顺序尝试各阶段，第一个接受的阶段即返回
///
/// 同一目录快照、同一历史快照下，对同一输入的结果完全相同。
pub struct ProductMatcher {
    index: Arc<CatalogIndex>,
    history: Arc<dyn SupplierHistory>,
    config: MatchConfig,
    stages: Vec<Box<dyn MatchStage>>,
}

impl ProductMatcher {
    pub fn new(
        index: Arc<CatalogIndex>,
        history: Arc<dyn SupplierHistory>,
        config: MatchConfig,
    ) -> Self {
        let stages: Vec<Box<dyn MatchStage>> = vec![
            Box::new(ExactStage::new(Arc::clone(&index))),
            Box::new(HistoryStage::new(Arc::clone(&index), Arc::clone(&history), &config)),
            Box::new(HistoryTokenSetStage::new(Arc::clone(&index), Arc::clone(&history), &config)),
            Box::new(TaxCodeStage::new(Arc::clone(&index), &config)),
            Box::new(FullCatalogStage::new(Arc::clone(&index), &config)),
        ];

        Self {
            index,
            history,
            config,
            stages,
        }
    }

    pub fn index(&self) -> &Arc<CatalogIndex> {
        &self.index
    }

    pub fn history(&self) -> &Arc<dyn SupplierHistory> {
        &self.history
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn match_item(&self, item: &LineItem, supplier_key: &str) -> MatchResult {
        self.match_description(&item.description, supplier_key, item.tax_code.as_deref())
    }

    /// 匹配一条发票描述；从不因"没有好候选"而失败
    pub fn match_description(
        &self,
        description: &str,
        supplier_key: &str,
        tax_code: Option<&str>,
    ) -> MatchResult {
        let normalized = normalize(description);
        let tax_code_owned = tax_code.map(str::to_string);

        if normalized.is_empty() {
            return MatchResult {
                description: description.to_string(),
                tax_code: tax_code_owned,
                outcome: MatchOutcome::NoMatch(NoMatch {
                    reason: NoMatchReason::EmptyDescription,
                    best_score: None,
                    message: "empty description".to_string(),
                }),
                trace: Vec::new(),
            };
        }

        let expanded = expand(&normalized);
        let ctx = MatchContext {
            normalized: &normalized,
            expanded: &expanded,
            supplier_key,
            tax_code,
        };

        let mut trace: Vec<StageTrace> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            match stage.attempt(&ctx) {
                StageOutcome::Accepted(matched, stage_trace) => {
                    trace.push(stage_trace);
                    return MatchResult {
                        description: description.to_string(),
                        tax_code: tax_code_owned,
                        outcome: MatchOutcome::Matched(matched),
                        trace,
                    };
                }
                StageOutcome::Pass(stage_trace) => trace.push(stage_trace),
            }
        }

        let outcome = MatchOutcome::NoMatch(no_match_summary(description, &trace));
        MatchResult {
            description: description.to_string(),
            tax_code: tax_code_owned,
            outcome,
            trace,
        }
    }
}

/// 终态：取各阶段中信息量最大的拒绝原因，以及见过的最高分
fn no_match_summary(description: &str, trace: &[StageTrace]) -> NoMatch {
    let reason = trace
        .iter()
        .filter_map(StageTrace::rejection)
        .fold(None, |best: Option<NoMatchReason>, r| match best {
            Some(b) if b.priority() >= r.priority() => Some(b),
            _ => Some(r),
        })
        .unwrap_or(NoMatchReason::NoCandidates);

    let best_score = trace.iter().filter_map(|t| t.best_score).max();

    let message = match best_score {
        Some(score) => format!("no match for '{}': {} (best score {})", description, reason, score),
        None => format!("no match for '{}': {}", description, reason),
    };

    NoMatch {
        reason,
        best_score,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::catalog_index::tests::product;
    use crate::matching::{CachedSupplierHistory, StaticHistorySource};
    use crate::models::{ConfidenceLevel, MatchMethod};

    fn matcher(config: MatchConfig) -> ProductMatcher {
        let index = Arc::new(
            CatalogIndex::build(vec![
                product("EMB001", "SALCHICHA PARA ASAR 800G CHIMEX", "50112000"),
                product("LAC001", "QUESO CREMA SAN RAFAEL", "50131800"),
                product("LAC002", "QUESO CREMA SRF", "50131800"),
                product("ABA001", "SAL", "50171551"),
                product("ABA002", "SAL DE MAR", "50171551"),
            ])
            .unwrap(),
        );
        let source = StaticHistorySource::new().with_purchases("P0001", &[("ABA002", 3)]);
        let history = Arc::new(CachedSupplierHistory::new(Arc::new(source), Arc::clone(&index)));
        ProductMatcher::new(index, history, config)
    }

    #[test]
    fn raw_form_is_tried_before_expansion() {
        let m = matcher(MatchConfig::default());
        let result = m.match_description("Queso crema SRF", "P0001", None);
        assert_eq!(result.entry().unwrap().code, "LAC002");
        assert_eq!(result.method(), Some(MatchMethod::Exact));
    }

    #[test]
    fn expanded_form_matches_exactly() {
        let m = matcher(MatchConfig::default());
        let result = m.match_description("salchicha para asar 800grs CHX", "P0001", None);
        assert_eq!(result.entry().unwrap().code, "EMB001");
        assert_eq!(result.method(), Some(MatchMethod::ExactExpanded));
        assert_eq!(result.level(), Some(ConfidenceLevel::Exact));
        assert_eq!(result.confidence(), 1.0);
    }

    #[test]
    fn blank_description_short_circuits() {
        let m = matcher(MatchConfig::default());
        let result = m.match_description(" \t ", "P0001", None);
        assert_eq!(result.no_match_reason(), Some(NoMatchReason::EmptyDescription));
        assert!(result.trace.is_empty());
    }

    #[test]
    fn exact_stage_ignores_thresholds() {
        let strict = MatchConfig {
            match_threshold: 100,
            full_catalog_threshold: 100,
            ambiguity_margin: 100,
            ..MatchConfig::default()
        };
        let result = matcher(strict).match_description("sal", "P0001", None);
        assert_eq!(result.entry().unwrap().code, "ABA001");
        assert_eq!(result.level(), Some(ConfidenceLevel::Exact));
    }

    #[test]
    fn summary_prefers_ambiguity_and_reports_best_score() {
        let trace = vec![
            StageTrace::rejected(MatchMethod::Exact, NoMatchReason::NoCandidates),
            StageTrace {
                best_score: Some(97),
                ..StageTrace::rejected(MatchMethod::HistoryTokenSet, NoMatchReason::AmbiguousFrequencyTie)
            },
            StageTrace {
                best_score: Some(62),
                ..StageTrace::rejected(MatchMethod::FullCatalog, NoMatchReason::BelowThreshold)
            },
        ];
        let summary = no_match_summary("HUEVO", &trace);
        assert_eq!(summary.reason, NoMatchReason::AmbiguousFrequencyTie);
        assert_eq!(summary.best_score, Some(97));
        assert!(summary.message.contains("best score 97"));
    }

    #[test]
    fn guard_reason_only_when_nothing_else() {
        let trace = vec![
            StageTrace::rejected(MatchMethod::HistoryTokenSet, NoMatchReason::GuardRejectedShortText),
            StageTrace::rejected(MatchMethod::TaxCode, NoMatchReason::NoCandidates),
        ];
        assert_eq!(no_match_summary("SAL", &trace).reason, NoMatchReason::NoCandidates);

        let trace = vec![StageTrace::rejected(
            MatchMethod::HistoryTokenSet,
            NoMatchReason::GuardRejectedDisabled,
        )];
        assert_eq!(
            no_match_summary("X", &trace).reason,
            NoMatchReason::GuardRejectedDisabled
        );
    }
}
