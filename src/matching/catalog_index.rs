use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use super::normalizer::normalize;
use crate::error::CatalogError;
use crate::models::CatalogEntry;

/// 通用 (无意义) 的税务分类码，不参与分组
pub const GENERIC_TAX_CODE: &str = "01010101";

/// 带预计算规范名的目录条目
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub entry: Arc<CatalogEntry>,
    pub normalized_name: String,
}

/// 目录索引：一次构建，之后只读
///
/// 规范名重复时保留第一个插入的条目 (精确匹配不做并列处理)。
#[derive(Debug)]
pub struct CatalogIndex {
    by_code: IndexMap<String, IndexedEntry>,
    by_name: HashMap<String, Arc<CatalogEntry>>,
    by_tax_code: HashMap<String, Vec<Arc<CatalogEntry>>>,
}

impl CatalogIndex {
    /// 从完整目录构建索引；空目录、缺失编码或重复编码视为错误
    pub fn build(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut by_code: IndexMap<String, IndexedEntry> = IndexMap::with_capacity(entries.len());
        let mut by_name: HashMap<String, Arc<CatalogEntry>> = HashMap::with_capacity(entries.len());
        let mut by_tax_code: HashMap<String, Vec<Arc<CatalogEntry>>> = HashMap::new();

        for (position, mut entry) in entries.into_iter().enumerate() {
            if entry.code.trim().is_empty() {
                return Err(CatalogError::MissingCode(position));
            }
            if by_code.contains_key(&entry.code) {
                return Err(CatalogError::DuplicateCode(entry.code));
            }

            entry.purchase_frequency = 0;
            let entry = Arc::new(entry);
            let normalized_name = normalize(&entry.name);

            if !normalized_name.is_empty() {
                by_name
                    .entry(normalized_name.clone())
                    .or_insert_with(|| Arc::clone(&entry));
            }

            if is_groupable_tax_code(&entry.tax_code) {
                by_tax_code
                    .entry(entry.tax_code.clone())
                    .or_default()
                    .push(Arc::clone(&entry));
            }

            by_code.insert(
                entry.code.clone(),
                IndexedEntry {
                    entry,
                    normalized_name,
                },
            );
        }

        tracing::info!(
            "目录索引构建完成: {} 个商品, {} 个唯一名称, {} 个税务分类码",
            by_code.len(),
            by_name.len(),
            by_tax_code.len()
        );

        Ok(Self {
            by_code,
            by_name,
            by_tax_code,
        })
    }

    /// 按规范名精确查找 (输入需已规范化)
    pub fn find_by_name(&self, normalized: &str) -> Option<&Arc<CatalogEntry>> {
        self.by_name.get(normalized)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Arc<CatalogEntry>> {
        self.by_code.get(code).map(|e| &e.entry)
    }

    /// 共享同一税务分类码的全部条目；通用码或空码返回空
    pub fn find_by_tax_code(&self, tax_code: &str) -> &[Arc<CatalogEntry>] {
        if !is_groupable_tax_code(tax_code) {
            return &[];
        }
        self.by_tax_code
            .get(tax_code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn normalized_name(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(|e| e.normalized_name.as_str())
    }

    /// 全部条目 (插入顺序)
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &IndexedEntry> {
        self.by_code.values()
    }

    /// 全部条目的并行迭代 (保持插入顺序收集)
    pub fn par_entries(&self) -> impl IndexedParallelIterator<Item = &IndexedEntry> {
        self.by_code.par_values()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

fn is_groupable_tax_code(tax_code: &str) -> bool {
    !tax_code.is_empty() && tax_code != GENERIC_TAX_CODE
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    pub(crate) fn product(code: &str, name: &str, tax_code: &str) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            name: name.to_string(),
            family1: String::new(),
            family2: String::new(),
            unit: "PZA".to_string(),
            tax_code: tax_code.to_string(),
            vat_rate: BigDecimal::from(0),
            is_service: false,
            purchase_frequency: 0,
        }
    }

    #[test]
    fn rejects_empty_and_duplicate_codes() {
        assert!(matches!(CatalogIndex::build(vec![]), Err(CatalogError::Empty)));

        let dup = vec![
            product("A1", "CEBOLLA", "50401700"),
            product("A1", "AJO", "50401700"),
        ];
        match CatalogIndex::build(dup) {
            Err(CatalogError::DuplicateCode(code)) => assert_eq!(code, "A1"),
            other => panic!("unexpected: {other:?}"),
        }

        let blank = vec![product("A1", "CEBOLLA", ""), product(" ", "AJO", "")];
        assert!(matches!(
            CatalogIndex::build(blank),
            Err(CatalogError::MissingCode(1))
        ));
    }

    #[test]
    fn lookups_by_name_code_and_tax_code() {
        let index = CatalogIndex::build(vec![
            product("FYV001", "Cebolla Blanca", "50401700"),
            product("FYV002", "Chile Jalapeño", "50401700"),
            product("ABA001", "Azúcar Estándar", "50161509"),
        ])
        .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.find_by_name("CHILE JALAPENO").unwrap().code, "FYV002");
        assert_eq!(index.find_by_code("ABA001").unwrap().name, "Azúcar Estándar");
        assert_eq!(index.normalized_name("ABA001"), Some("AZUCAR ESTANDAR"));
        assert_eq!(index.find_by_tax_code("50401700").len(), 2);
        assert_eq!(index.find_by_tax_code("50161509")[0].code, "ABA001");
    }

    #[test]
    fn generic_tax_code_is_not_grouped() {
        let index = CatalogIndex::build(vec![
            product("X1", "SERVICIO VARIO", GENERIC_TAX_CODE),
            product("X2", "OTRO SERVICIO", GENERIC_TAX_CODE),
        ])
        .unwrap();
        assert!(index.find_by_tax_code(GENERIC_TAX_CODE).is_empty());
        assert!(index.find_by_tax_code("").is_empty());
    }

    #[test]
    fn duplicate_names_keep_first_inserted() {
        let index = CatalogIndex::build(vec![
            product("P1", "QUESO PANELA", ""),
            product("P2", "queso  panela", ""),
        ])
        .unwrap();
        assert_eq!(index.find_by_name("QUESO PANELA").unwrap().code, "P1");
        assert_eq!(index.entries().count(), 2);
    }

    #[test]
    fn indexed_entries_never_carry_frequency() {
        let index = CatalogIndex::build(vec![
            product("P1", "QUESO PANELA", "").with_purchase_frequency(9),
        ])
        .unwrap();
        assert_eq!(index.find_by_code("P1").unwrap().purchase_frequency, 0);
    }
}
