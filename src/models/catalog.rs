use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 目录商品 (主数据中的一个可采购条目)
///
/// `purchase_frequency` 只在供应商历史中才有意义；目录索引里的条目恒为 0。
/// 需要附加频次时用 [`CatalogEntry::with_purchase_frequency`] 派生新值，
/// 共享的目录条目永远不被修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
    pub family1: String,
    pub family2: String,
    pub unit: String,
    pub tax_code: String,
    pub vat_rate: BigDecimal,
    pub is_service: bool,
    #[serde(default)]
    pub purchase_frequency: u32,
}

impl CatalogEntry {
    /// 派生一个带采购频次的副本
    pub fn with_purchase_frequency(&self, frequency: u32) -> Self {
        Self {
            purchase_frequency: frequency,
            ..self.clone()
        }
    }
}

/// 目录表行
#[derive(Debug, Clone, FromRow)]
pub struct CatalogRow {
    pub code: String,
    pub name: Option<String>,
    pub family1: Option<String>,
    pub family2: Option<String>,
    pub unit: Option<String>,
    pub tax_code: Option<String>,
    pub vat_rate: Option<BigDecimal>,
    pub is_service: Option<bool>,
}

impl From<CatalogRow> for CatalogEntry {
    fn from(row: CatalogRow) -> Self {
        let text = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();
        let unit = text(row.unit);
        Self {
            code: row.code.trim().to_string(),
            name: text(row.name),
            family1: text(row.family1),
            family2: text(row.family2),
            unit: if unit.is_empty() { "PZA".to_string() } else { unit },
            tax_code: text(row.tax_code),
            vat_rate: row.vat_rate.unwrap_or_else(|| BigDecimal::from(0)),
            is_service: row.is_service.unwrap_or(false),
            purchase_frequency: 0,
        }
    }
}

/// 供应商采购次数统计行
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PurchaseCount {
    pub product_code: String,
    pub times_bought: i64,
}
