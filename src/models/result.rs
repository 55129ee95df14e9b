use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::CatalogEntry;

/// 置信度等级，由产生匹配的阶段决定，不按分数重新计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Exact,
    Alta,
    Media,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::Alta => "ALTA",
            Self::Media => "MEDIA",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 匹配方法 (级联阶段标签)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    ExactExpanded,
    History,
    HistoryTokenSet,
    TaxCode,
    FullCatalog,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::ExactExpanded => "exact_expanded",
            Self::History => "history",
            Self::HistoryTokenSet => "history_token_set",
            Self::TaxCode => "tax_code",
            Self::FullCatalog => "full_catalog",
        }
    }

    pub fn level(&self) -> ConfidenceLevel {
        match self {
            Self::Exact | Self::ExactExpanded => ConfidenceLevel::Exact,
            Self::History | Self::HistoryTokenSet | Self::TaxCode => ConfidenceLevel::Alta,
            Self::FullCatalog => ConfidenceLevel::Media,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未匹配原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    EmptyDescription,
    NoCandidates,
    BelowThreshold,
    Ambiguous,
    AmbiguousFrequencyTie,
    NoPurchaseEvidence,
    GuardRejectedShortText,
    GuardRejectedDisabled,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyDescription => "empty_description",
            Self::NoCandidates => "no_candidates",
            Self::BelowThreshold => "below_threshold",
            Self::Ambiguous => "ambiguous",
            Self::AmbiguousFrequencyTie => "ambiguous_frequency_tie",
            Self::NoPurchaseEvidence => "no_purchase_evidence",
            Self::GuardRejectedShortText => "guard_rejected_short_text",
            Self::GuardRejectedDisabled => "guard_rejected_disabled",
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous | Self::AmbiguousFrequencyTie)
    }

    /// 终态原因的优先级：歧义 > 无频次证据 > 低于阈值 > 无候选 > 守卫拒绝
    pub(crate) fn priority(&self) -> u8 {
        match self {
            Self::Ambiguous | Self::AmbiguousFrequencyTie => 5,
            Self::NoPurchaseEvidence => 4,
            Self::BelowThreshold => 3,
            Self::NoCandidates => 2,
            Self::GuardRejectedShortText | Self::GuardRejectedDisabled => 1,
            Self::EmptyDescription => 0,
        }
    }
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 候选项：某一阶段中 (目录条目, 相似度) 的配对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub entry: Arc<CatalogEntry>,
    pub score: u8,
}

impl MatchCandidate {
    pub fn new(entry: Arc<CatalogEntry>, score: u8) -> Self {
        Self { entry, score }
    }

    pub fn frequency(&self) -> u32 {
        self.entry.purchase_frequency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum StageVerdict {
    Accepted,
    Rejected(NoMatchReason),
}

/// 单个阶段的审计记录 (胜出者 + 被淘汰的候选)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub method: MatchMethod,
    pub candidates: Vec<MatchCandidate>,
    /// 包括低于阈值的最高分
    pub best_score: Option<u8>,
    pub verdict: StageVerdict,
}

impl StageTrace {
    pub fn rejected(method: MatchMethod, reason: NoMatchReason) -> Self {
        Self {
            method,
            candidates: Vec::new(),
            best_score: None,
            verdict: StageVerdict::Rejected(reason),
        }
    }

    pub fn rejection(&self) -> Option<NoMatchReason> {
        match self.verdict {
            StageVerdict::Accepted => None,
            StageVerdict::Rejected(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedProduct {
    pub entry: Arc<CatalogEntry>,
    pub score: u8,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub method: MatchMethod,
    pub discarded: Vec<MatchCandidate>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoMatch {
    pub reason: NoMatchReason,
    pub best_score: Option<u8>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(MatchedProduct),
    NoMatch(NoMatch),
}

/// 一条描述的级联匹配结果；最多携带一个被接受的条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub description: String,
    pub tax_code: Option<String>,
    pub outcome: MatchOutcome,
    pub trace: Vec<StageTrace>,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self.outcome, MatchOutcome::Matched(_))
    }

    pub fn matched(&self) -> Option<&MatchedProduct> {
        match &self.outcome {
            MatchOutcome::Matched(m) => Some(m),
            MatchOutcome::NoMatch(_) => None,
        }
    }

    pub fn entry(&self) -> Option<&CatalogEntry> {
        self.matched().map(|m| m.entry.as_ref())
    }

    pub fn level(&self) -> Option<ConfidenceLevel> {
        self.matched().map(|m| m.level)
    }

    pub fn method(&self) -> Option<MatchMethod> {
        self.matched().map(|m| m.method)
    }

    pub fn confidence(&self) -> f64 {
        self.matched().map(|m| m.confidence).unwrap_or(0.0)
    }

    pub fn no_match_reason(&self) -> Option<NoMatchReason> {
        match &self.outcome {
            MatchOutcome::Matched(_) => None,
            MatchOutcome::NoMatch(n) => Some(n.reason),
        }
    }

    /// 匹配时为胜出分数，未匹配时为各阶段见过的最高分
    pub fn best_score(&self) -> Option<u8> {
        match &self.outcome {
            MatchOutcome::Matched(m) => Some(m.score),
            MatchOutcome::NoMatch(n) => n.best_score,
        }
    }

    pub fn message(&self) -> &str {
        match &self.outcome {
            MatchOutcome::Matched(m) => &m.message,
            MatchOutcome::NoMatch(n) => &n.message,
        }
    }
}
