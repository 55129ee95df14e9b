pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod models;
pub mod service;

pub use config::{AppConfig, MatchConfig};
pub use db::create_pool;
pub use error::{AppError, CatalogError, HistoryError};
pub use matching::{CatalogIndex, ProductMatcher, SupplierHistory};
pub use service::{build_matcher, MatcherService};
