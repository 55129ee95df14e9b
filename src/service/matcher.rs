use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;

use crate::config::AppConfig;
use crate::db::{queries, PgHistorySource};
use crate::error::AppError;
use crate::matching::{CachedSupplierHistory, CatalogIndex, ProductMatcher};
use crate::models::{LineItem, MatchResult, MatchStats};

/// 一张发票 (同一供应商) 的批量匹配结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMatch {
    pub supplier_key: String,
    pub results: Vec<MatchResult>,
    pub stats: MatchStats,
}

/// 匹配服务：持有当前目录快照对应的匹配引擎
pub struct MatcherService {
    matcher: RwLock<Arc<ProductMatcher>>,
}

impl MatcherService {
    pub fn new(matcher: ProductMatcher) -> Self {
        Self {
            matcher: RwLock::new(Arc::new(matcher)),
        }
    }

    /// 当前快照；进行中的批次继续使用它们开始时的快照
    pub fn matcher(&self) -> Arc<ProductMatcher> {
        let guard = self.matcher.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// 批量匹配，按明细并行，结果保持输入顺序
    pub fn match_batch(&self, supplier_key: &str, items: &[LineItem]) -> BatchMatch {
        let matcher = self.matcher();
        let start_time = std::time::Instant::now();

        let results: Vec<MatchResult> = items
            .par_iter()
            .map(|item| matcher.match_item(item, supplier_key))
            .collect();

        for result in &results {
            match result.matched() {
                Some(m) => tracing::debug!(
                    "  [{}] '{}' -> '{}' ({}) via {} ({:.0}%)",
                    m.level,
                    result.description,
                    m.entry.name,
                    m.entry.code,
                    m.method,
                    m.confidence * 100.0
                ),
                None => tracing::debug!(
                    "  [NO_MATCH] '{}' - {}",
                    result.description,
                    result.message()
                ),
            }
        }

        let stats = MatchStats::from_results(&results);
        tracing::info!(
            "供应商 {} 匹配完成: {}/{} 个明细已匹配, 耗时: {:?}",
            supplier_key,
            stats.matched,
            stats.total,
            start_time.elapsed()
        );

        BatchMatch {
            supplier_key: supplier_key.to_string(),
            results,
            stats,
        }
    }

    pub fn invalidate_history(&self) {
        self.matcher().history().invalidate();
    }

    /// 换入新的目录快照 (刷新周期)
    pub fn replace_matcher(&self, matcher: ProductMatcher) {
        let products = matcher.index().len();
        let mut guard = self.matcher.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(matcher);
        tracing::info!("目录快照已替换: {} 个商品", products);
    }
}

/// 从数据库加载目录并构建匹配引擎 (需在多线程运行时内调用)
pub async fn build_matcher(pool: &PgPool, config: &AppConfig) -> Result<ProductMatcher, AppError> {
    let entries = queries::load_catalog(pool).await?;
    let index = Arc::new(CatalogIndex::build(entries)?);

    let source = Arc::new(
        PgHistorySource::new(pool.clone(), Handle::current())
            .with_timeout(Duration::from_secs(config.database.history_timeout_secs)),
    );
    let history = Arc::new(CachedSupplierHistory::new(source, Arc::clone(&index)));

    Ok(ProductMatcher::new(index, history, config.matching.clone()))
}
