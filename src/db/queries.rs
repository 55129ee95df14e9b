use crate::models::{CatalogEntry, CatalogRow, PurchaseCount};
use sqlx::PgPool;

/// 加载完整商品目录
pub async fn load_catalog(pool: &PgPool) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    let start_time = std::time::Instant::now();

    let rows = sqlx::query_as::<_, CatalogRow>(
        r#"
        SELECT code, name, family1, family2, unit, tax_code, vat_rate, is_service
        FROM catalog_product
        WHERE code IS NOT NULL
          AND code <> ''
        ORDER BY code
        "#
    )
    .fetch_all(pool)
    .await?;

    tracing::info!("目录加载完成: {} 个商品, 耗时: {:?}", rows.len(), start_time.elapsed());
    Ok(rows.into_iter().map(CatalogEntry::from).collect())
}

/// 查询供应商历史采购次数 (按次数降序)
///
/// 只统计收货 (R) 与发票 (F) 两个系列。
pub async fn purchase_counts_for_supplier(
    pool: &PgPool,
    supplier_key: &str,
) -> Result<Vec<PurchaseCount>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseCount>(
        r#"
        SELECT d.product_code as product_code,
               COUNT(*) as times_bought
        FROM receipt_item d
        INNER JOIN receipt c
            ON d.series = c.series AND d.receipt_no = c.receipt_no
        WHERE c.supplier_key = $1
          AND c.series IN ('R', 'F')
          AND d.product_code IS NOT NULL
          AND d.product_code <> ''
        GROUP BY d.product_code
        ORDER BY times_bought DESC, d.product_code
        "#
    )
    .bind(supplier_key)
    .fetch_all(pool)
    .await
}
