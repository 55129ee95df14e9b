use rayon::prelude::*;
use std::sync::Arc;

use super::normalizer::normalize;
use super::similarity::{token_set_ratio, token_sort_ratio};
use super::{CatalogIndex, SupplierHistory};
use crate::config::MatchConfig;
use crate::models::{
    CatalogEntry, MatchCandidate, MatchMethod, MatchedProduct, NoMatchReason, StageTrace,
    StageVerdict,
};

/// 一条描述在级联中的输入
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub normalized: &'a str,
    /// 展开缩写和单位后的描述
    pub expanded: &'a str,
    pub supplier_key: &'a str,
    pub tax_code: Option<&'a str>,
}

/// 单个阶段的结果：接受匹配，或放行到下一阶段
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Accepted(MatchedProduct, StageTrace),
    Pass(StageTrace),
}

/// 级联中的一个匹配策略
pub trait MatchStage: Send + Sync {
    fn method(&self) -> MatchMethod;
    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome;
}

/// 一个阶段的打分结果，候选按分数降序
struct Scored {
    candidates: Vec<MatchCandidate>,
    best_score: Option<u8>,
    pool_size: usize,
}

impl Scored {
    fn from_scores(scores: Vec<(Arc<CatalogEntry>, u8)>, threshold: u8) -> Self {
        let pool_size = scores.len();
        let best_score = scores.iter().map(|(_, s)| *s).max();
        let mut candidates: Vec<MatchCandidate> = scores
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .map(|(entry, score)| MatchCandidate::new(entry, score))
            .collect();
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        Self {
            candidates,
            best_score,
            pool_size,
        }
    }

    fn empty_reason(&self) -> NoMatchReason {
        if self.pool_size == 0 {
            NoMatchReason::NoCandidates
        } else {
            NoMatchReason::BelowThreshold
        }
    }
}

fn score_entries(
    index: &CatalogIndex,
    query: &str,
    entries: &[Arc<CatalogEntry>],
    scorer: fn(&str, &str) -> u8,
) -> Vec<(Arc<CatalogEntry>, u8)> {
    entries
        .iter()
        .map(|entry| {
            let score = match index.normalized_name(&entry.code) {
                Some(name) => scorer(query, name),
                None => scorer(query, &normalize(&entry.name)),
            };
            (Arc::clone(entry), score)
        })
        .collect()
}

/// 分差规则：只有一个候选，或第一名领先至少 `margin` 分
fn margin_rule(scored: &Scored, margin: u8) -> Result<(), NoMatchReason> {
    match scored.candidates.as_slice() {
        [] => Err(scored.empty_reason()),
        [top, second, ..] if top.score.saturating_sub(second.score) < margin => {
            Err(NoMatchReason::Ambiguous)
        }
        _ => Ok(()),
    }
}

/// 分差规则 + 频次：近似并列时要求第一名频次至少是第二名的两倍
fn frequency_rule(scored: &Scored, margin: u8) -> Result<(), NoMatchReason> {
    match scored.candidates.as_slice() {
        [] => Err(scored.empty_reason()),
        [top, second, ..] if top.score.saturating_sub(second.score) < margin => {
            let (best, runner_up) = (u64::from(top.frequency()), u64::from(second.frequency()));
            if best > 0 && runner_up > 0 && best >= 2 * runner_up {
                tracing::info!(
                    "集合重叠按频次消歧: '{}' (score={}, freq={}) vs '{}' (score={}, freq={})",
                    top.entry.name,
                    top.score,
                    best,
                    second.entry.name,
                    second.score,
                    runner_up
                );
                Ok(())
            } else {
                Err(NoMatchReason::AmbiguousFrequencyTie)
            }
        }
        [top, ..] if top.frequency() == 0 => Err(NoMatchReason::NoPurchaseEvidence),
        _ => Ok(()),
    }
}

fn conclude(
    method: MatchMethod,
    ctx: &MatchContext<'_>,
    scored: Scored,
    decision: Result<(), NoMatchReason>,
) -> StageOutcome {
    if let Err(reason) = decision {
        if reason.is_ambiguous() {
            if let [top, second, ..] = scored.candidates.as_slice() {
                tracing::warn!(
                    "[{}] 匹配歧义 '{}': {} ({}, freq={}) vs {} ({}, freq={})",
                    method,
                    ctx.expanded,
                    top.entry.name,
                    top.score,
                    top.frequency(),
                    second.entry.name,
                    second.score,
                    second.frequency()
                );
            }
        } else {
            tracing::debug!("[{}] 未匹配 '{}': {}", method, ctx.expanded, reason);
        }
        return pass(method, scored, reason);
    }

    let Some(winner) = scored.candidates.first().cloned() else {
        return pass(method, scored, NoMatchReason::NoCandidates);
    };

    let message = match method {
        MatchMethod::HistoryTokenSet => format!(
            "{} match: {} (score {}, freq {})",
            method, winner.entry.code, winner.score, winner.frequency()
        ),
        _ => format!("{} match: {} (score {})", method, winner.entry.code, winner.score),
    };

    let matched = MatchedProduct {
        entry: Arc::clone(&winner.entry),
        score: winner.score,
        confidence: f64::from(winner.score) / 100.0,
        level: method.level(),
        method,
        discarded: scored.candidates[1..].to_vec(),
        message,
    };
    let trace = StageTrace {
        method,
        candidates: scored.candidates,
        best_score: scored.best_score,
        verdict: StageVerdict::Accepted,
    };
    StageOutcome::Accepted(matched, trace)
}

fn pass(method: MatchMethod, scored: Scored, reason: NoMatchReason) -> StageOutcome {
    StageOutcome::Pass(StageTrace {
        method,
        candidates: scored.candidates,
        best_score: scored.best_score,
        verdict: StageVerdict::Rejected(reason),
    })
}

/// 阶段 1：规范名精确查找，先原文后展开形式
pub struct ExactStage {
    index: Arc<CatalogIndex>,
}

impl ExactStage {
    pub fn new(index: Arc<CatalogIndex>) -> Self {
        Self { index }
    }

    fn accepted(method: MatchMethod, entry: &Arc<CatalogEntry>) -> StageOutcome {
        let candidate = MatchCandidate::new(Arc::clone(entry), 100);
        let matched = MatchedProduct {
            entry: Arc::clone(entry),
            score: 100,
            confidence: 1.0,
            level: method.level(),
            method,
            discarded: Vec::new(),
            message: format!("{} match: {}", method, entry.code),
        };
        let trace = StageTrace {
            method,
            candidates: vec![candidate],
            best_score: Some(100),
            verdict: StageVerdict::Accepted,
        };
        StageOutcome::Accepted(matched, trace)
    }
}

impl MatchStage for ExactStage {
    fn method(&self) -> MatchMethod {
        MatchMethod::Exact
    }

    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome {
        if let Some(entry) = self.index.find_by_name(ctx.normalized) {
            return Self::accepted(MatchMethod::Exact, entry);
        }
        if ctx.expanded != ctx.normalized {
            if let Some(entry) = self.index.find_by_name(ctx.expanded) {
                return Self::accepted(MatchMethod::ExactExpanded, entry);
            }
        }
        StageOutcome::Pass(StageTrace::rejected(
            MatchMethod::Exact,
            NoMatchReason::NoCandidates,
        ))
    }
}

/// 阶段 2：供应商历史 + 有序序列相似度
pub struct HistoryStage {
    index: Arc<CatalogIndex>,
    history: Arc<dyn SupplierHistory>,
    threshold: u8,
    margin: u8,
}

impl HistoryStage {
    pub fn new(index: Arc<CatalogIndex>, history: Arc<dyn SupplierHistory>, config: &MatchConfig) -> Self {
        Self {
            index,
            history,
            threshold: config.match_threshold,
            margin: config.ambiguity_margin,
        }
    }
}

impl MatchStage for HistoryStage {
    fn method(&self) -> MatchMethod {
        MatchMethod::History
    }

    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome {
        let entries = self.history.entries_bought_by(ctx.supplier_key);
        let scores = score_entries(&self.index, ctx.expanded, &entries, token_sort_ratio);
        let scored = Scored::from_scores(scores, self.threshold);
        let decision = margin_rule(&scored, self.margin);
        conclude(self.method(), ctx, scored, decision)
    }
}

/// 阶段 3：供应商历史 + 集合重叠相似度 + 频次消歧
///
/// 短描述在集合重叠下误报太多，直接拒绝。
pub struct HistoryTokenSetStage {
    index: Arc<CatalogIndex>,
    history: Arc<dyn SupplierHistory>,
    enabled: bool,
    min_length: usize,
    threshold: u8,
    margin: u8,
}

impl HistoryTokenSetStage {
    pub fn new(index: Arc<CatalogIndex>, history: Arc<dyn SupplierHistory>, config: &MatchConfig) -> Self {
        Self {
            index,
            history,
            enabled: config.token_set_enabled,
            min_length: config.token_set_min_length,
            threshold: config.match_threshold,
            margin: config.ambiguity_margin,
        }
    }
}

impl MatchStage for HistoryTokenSetStage {
    fn method(&self) -> MatchMethod {
        MatchMethod::HistoryTokenSet
    }

    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome {
        if !self.enabled {
            return StageOutcome::Pass(StageTrace::rejected(
                self.method(),
                NoMatchReason::GuardRejectedDisabled,
            ));
        }
        if ctx.normalized.chars().count() < self.min_length {
            return StageOutcome::Pass(StageTrace::rejected(
                self.method(),
                NoMatchReason::GuardRejectedShortText,
            ));
        }

        let entries = self.history.entries_with_frequency_bought_by(ctx.supplier_key);
        let scores = score_entries(&self.index, ctx.expanded, &entries, token_set_ratio);
        let mut scored = Scored::from_scores(scores, self.threshold);
        scored.candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.frequency().cmp(&a.frequency()))
        });
        let decision = frequency_rule(&scored, self.margin);
        conclude(self.method(), ctx, scored, decision)
    }
}

/// 阶段 4：同税务分类码的目录子集 + 有序序列相似度
pub struct TaxCodeStage {
    index: Arc<CatalogIndex>,
    threshold: u8,
    margin: u8,
}

impl TaxCodeStage {
    pub fn new(index: Arc<CatalogIndex>, config: &MatchConfig) -> Self {
        Self {
            index,
            threshold: config.match_threshold,
            margin: config.ambiguity_margin,
        }
    }
}

impl MatchStage for TaxCodeStage {
    fn method(&self) -> MatchMethod {
        MatchMethod::TaxCode
    }

    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome {
        let entries = ctx
            .tax_code
            .map(|code| self.index.find_by_tax_code(code.trim()))
            .unwrap_or_default();
        let scores = score_entries(&self.index, ctx.expanded, entries, token_sort_ratio);
        let scored = Scored::from_scores(scores, self.threshold);
        let decision = margin_rule(&scored, self.margin);
        conclude(self.method(), ctx, scored, decision)
    }
}

/// 阶段 5：全目录 + 有序序列相似度 (更严格的阈值)
pub struct FullCatalogStage {
    index: Arc<CatalogIndex>,
    threshold: u8,
    margin: u8,
}

impl FullCatalogStage {
    pub fn new(index: Arc<CatalogIndex>, config: &MatchConfig) -> Self {
        Self {
            index,
            threshold: config.full_catalog_threshold,
            margin: config.ambiguity_margin,
        }
    }
}

impl MatchStage for FullCatalogStage {
    fn method(&self) -> MatchMethod {
        MatchMethod::FullCatalog
    }

    fn attempt(&self, ctx: &MatchContext<'_>) -> StageOutcome {
        let scores: Vec<(Arc<CatalogEntry>, u8)> = self
            .index
            .par_entries()
            .map(|e| (Arc::clone(&e.entry), token_sort_ratio(ctx.expanded, &e.normalized_name)))
            .collect();
        let scored = Scored::from_scores(scores, self.threshold);
        let decision = margin_rule(&scored, self.margin);
        conclude(self.method(), ctx, scored, decision)
    }
}
