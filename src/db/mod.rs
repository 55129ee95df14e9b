pub mod history_source;
pub mod pool;
pub mod queries;

pub use history_source::PgHistorySource;
pub use pool::create_pool;
pub use queries::*;
