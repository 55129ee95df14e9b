pub mod cascade;
pub mod catalog_index;
pub mod history;
pub mod lexicon;
pub mod normalizer;
pub mod similarity;
pub mod stages;

pub use cascade::ProductMatcher;
pub use catalog_index::{CatalogIndex, IndexedEntry, GENERIC_TAX_CODE};
pub use history::{CachedSupplierHistory, PurchaseHistorySource, StaticHistorySource, SupplierHistory};
pub use lexicon::expand;
pub use normalizer::normalize;
pub use similarity::{token_set_ratio, token_sort_ratio};
pub use stages::{MatchContext, MatchStage, StageOutcome};
