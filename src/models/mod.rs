pub mod catalog;
pub mod line_item;
pub mod result;

pub use catalog::{CatalogEntry, CatalogRow, PurchaseCount};
pub use line_item::{LineItem, MatchStats};
pub use result::{
    ConfidenceLevel, MatchCandidate, MatchMethod, MatchOutcome, MatchResult, MatchedProduct,
    NoMatch, NoMatchReason, StageTrace, StageVerdict,
};
