pub mod export;
pub mod matcher;

pub use export::export_review_csv;
pub use matcher::{build_matcher, BatchMatch, MatcherService};
