use sqlx::PgPool;
use std::time::Duration;
use tokio::runtime::Handle;

use super::queries;
use crate::error::HistoryError;
use crate::matching::PurchaseHistorySource;
use crate::models::PurchaseCount;

/// 基于 PostgreSQL 的采购历史数据源
///
/// 级联是同步的；这里借运行时句柄阻塞等待查询结果。
pub struct PgHistorySource {
    pool: PgPool,
    handle: Handle,
    timeout: Duration,
}

impl PgHistorySource {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self {
            pool,
            handle,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl PurchaseHistorySource for PgHistorySource {
    fn purchase_counts(&self, supplier_key: &str) -> Result<Vec<PurchaseCount>, HistoryError> {
        let query = queries::purchase_counts_for_supplier(&self.pool, supplier_key);
        let result = tokio::task::block_in_place(|| {
            self.handle
                .block_on(async { tokio::time::timeout(self.timeout, query).await })
        });

        match result {
            Ok(rows) => Ok(rows?),
            Err(_) => {
                tracing::error!("✗ 供应商 {} 历史查询超时 (>{:?})", supplier_key, self.timeout);
                Err(HistoryError::Unavailable(format!(
                    "history query timed out for supplier {supplier_key}"
                )))
            }
        }
    }
}
