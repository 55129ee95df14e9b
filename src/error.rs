use thiserror::Error;

/// 目录索引构建错误
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog is empty")]
    Empty,
    #[error("catalog entry at position {0} has no code")]
    MissingCode(usize),
    #[error("duplicate catalog code: {0}")]
    DuplicateCode(String),
}

/// 供应商历史数据源错误
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("history source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
