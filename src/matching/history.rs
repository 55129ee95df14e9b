use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, RwLock};

use super::CatalogIndex;
use crate::error::HistoryError;
use crate::models::{CatalogEntry, PurchaseCount};

/// 原始采购历史数据源 (数据库等外部协作方)
///
/// 返回该供应商每个商品编码的采购次数，按次数降序。
pub trait PurchaseHistorySource: Send + Sync {
    fn purchase_counts(&self, supplier_key: &str) -> Result<Vec<PurchaseCount>, HistoryError>;
}

/// 级联匹配所依赖的供应商历史契约
///
/// 对同一供应商在一个处理会话内幂等；无历史时返回空序列而不是错误。
pub trait SupplierHistory: Send + Sync {
    /// 供应商卖过的目录条目 (频次恒为 0，与目录共享)
    fn entries_bought_by(&self, supplier_key: &str) -> Arc<Vec<Arc<CatalogEntry>>>;

    /// 带采购频次的条目副本，按频次降序
    fn entries_with_frequency_bought_by(&self, supplier_key: &str) -> Arc<Vec<Arc<CatalogEntry>>>;

    /// 一次性清空所有供应商缓存
    fn invalidate(&self);
}

type SupplierEntries = Arc<Vec<Arc<CatalogEntry>>>;

/// 每个供应商一个单元格：map 的分片锁只在取单元格时持有，查询期间只锁该供应商
type SupplierCache = DashMap<String, Arc<OnceCell<SupplierEntries>>>;

/// 两套互相独立的缓存：带频次的副本永远不会进入无频次路径
#[derive(Default)]
struct HistoryCaches {
    plain: SupplierCache,
    with_frequency: SupplierCache,
}

/// 基于目录索引解析编码、按供应商缓存的历史提供者
pub struct CachedSupplierHistory {
    source: Arc<dyn PurchaseHistorySource>,
    index: Arc<CatalogIndex>,
    caches: RwLock<Arc<HistoryCaches>>,
}

impl CachedSupplierHistory {
    pub fn new(source: Arc<dyn PurchaseHistorySource>, index: Arc<CatalogIndex>) -> Self {
        Self {
            source,
            index,
            caches: RwLock::new(Arc::new(HistoryCaches::default())),
        }
    }

    fn current(&self) -> Arc<HistoryCaches> {
        let guard = self.caches.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// 每个供应商最多计算一次；数据源失败时返回空且不缓存
    fn cached(
        &self,
        cache: &SupplierCache,
        supplier_key: &str,
        resolve: impl FnOnce(Vec<PurchaseCount>) -> Vec<Arc<CatalogEntry>>,
    ) -> SupplierEntries {
        let existing = cache.get(supplier_key).map(|cell| Arc::clone(cell.value()));
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(cache.entry(supplier_key.to_string()).or_default().value()),
        };

        let loaded = cell.get_or_try_init(|| {
            let rows = self.source.purchase_counts(supplier_key)?;
            let entries = Arc::new(resolve(rows));
            tracing::debug!(
                "供应商 {} 历史: {} 个不同商品",
                supplier_key,
                entries.len()
            );
            Ok::<_, HistoryError>(entries)
        });

        match loaded {
            Ok(entries) => Arc::clone(entries),
            Err(e) => {
                tracing::error!("获取供应商 {} 历史失败: {}", supplier_key, e);
                Arc::new(Vec::new())
            }
        }
    }
}

impl SupplierHistory for CachedSupplierHistory {
    fn entries_bought_by(&self, supplier_key: &str) -> SupplierEntries {
        let caches = self.current();
        self.cached(&caches.plain, supplier_key, |rows| {
            rows.iter()
                .filter_map(|row| self.index.find_by_code(row.product_code.trim()))
                .cloned()
                .collect()
        })
    }

    fn entries_with_frequency_bought_by(&self, supplier_key: &str) -> SupplierEntries {
        let caches = self.current();
        self.cached(&caches.with_frequency, supplier_key, |rows| {
            let mut entries: Vec<Arc<CatalogEntry>> = rows
                .iter()
                .filter_map(|row| {
                    let base = self.index.find_by_code(row.product_code.trim())?;
                    let frequency = u32::try_from(row.times_bought.max(0)).unwrap_or(u32::MAX);
                    Some(Arc::new(base.with_purchase_frequency(frequency)))
                })
                .collect();
            entries.sort_by(|a, b| b.purchase_frequency.cmp(&a.purchase_frequency));
            entries
        })
    }

    fn invalidate(&self) {
        let mut guard = self.caches.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(HistoryCaches::default());
        tracing::info!("供应商历史缓存已清空");
    }
}

/// 内存数据源：供应商 -> 采购统计
#[derive(Debug, Default, Clone)]
pub struct StaticHistorySource {
    rows: std::collections::HashMap<String, Vec<PurchaseCount>>,
}

impl StaticHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purchases(mut self, supplier_key: &str, purchases: &[(&str, i64)]) -> Self {
        let mut rows: Vec<PurchaseCount> = purchases
            .iter()
            .map(|(code, times)| PurchaseCount {
                product_code: code.to_string(),
                times_bought: *times,
            })
            .collect();
        rows.sort_by(|a, b| b.times_bought.cmp(&a.times_bought));
        self.rows.insert(supplier_key.to_string(), rows);
        self
    }
}

impl PurchaseHistorySource for StaticHistorySource {
    fn purchase_counts(&self, supplier_key: &str) -> Result<Vec<PurchaseCount>, HistoryError> {
        Ok(self.rows.get(supplier_key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::catalog_index::tests::product;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::{Duration, Instant};

    struct CountingSource {
        inner: StaticHistorySource,
        calls: AtomicUsize,
        fail: bool,
    }

    impl PurchaseHistorySource for CountingSource {
        fn purchase_counts(&self, supplier_key: &str) -> Result<Vec<PurchaseCount>, HistoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HistoryError::Unavailable("offline".to_string()));
            }
            self.inner.purchase_counts(supplier_key)
        }
    }

    fn setup(fail: bool) -> (Arc<CountingSource>, CachedSupplierHistory, Arc<CatalogIndex>) {
        let index = Arc::new(
            CatalogIndex::build(vec![
                product("V1", "CHILE JALAPENO VERDE", "50401700"),
                product("R1", "CHILE JALAPENO ROJO", "50401700"),
                product("Q1", "QUESO PANELA", "50131800"),
            ])
            .unwrap(),
        );
        let source = Arc::new(CountingSource {
            inner: StaticHistorySource::new()
                .with_purchases("P0001", &[("R1", 38), ("V1", 987), ("ZZ9", 4)]),
            calls: AtomicUsize::new(0),
            fail,
        });
        let history = CachedSupplierHistory::new(source.clone(), Arc::clone(&index));
        (source, history, index)
    }

    #[test]
    fn plain_entries_are_shared_catalog_values() {
        let (_, history, index) = setup(false);
        let entries = history.entries_bought_by("P0001");
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["V1", "R1"]);
        assert!(entries.iter().all(|e| e.purchase_frequency == 0));
        assert!(Arc::ptr_eq(&entries[0], index.find_by_code("V1").unwrap()));
    }

    #[test]
    fn frequency_entries_are_copies_sorted_desc() {
        let (_, history, index) = setup(false);
        let entries = history.entries_with_frequency_bought_by("P0001");
        let freqs: Vec<_> = entries.iter().map(|e| (e.code.as_str(), e.purchase_frequency)).collect();
        assert_eq!(freqs, vec![("V1", 987), ("R1", 38)]);
        assert_eq!(index.find_by_code("V1").unwrap().purchase_frequency, 0);
        assert!(history
            .entries_bought_by("P0001")
            .iter()
            .all(|e| e.purchase_frequency == 0));
    }

    #[test]
    fn caches_per_supplier_and_invalidates() {
        let (source, history, _) = setup(false);
        history.entries_bought_by("P0001");
        history.entries_bought_by("P0001");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        history.entries_with_frequency_bought_by("P0001");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        history.invalidate();
        history.entries_bought_by("P0001");
        history.entries_with_frequency_bought_by("P0001");
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn unknown_supplier_is_empty() {
        let (_, history, _) = setup(false);
        assert!(history.entries_bought_by("NOPE").is_empty());
        assert!(history.entries_with_frequency_bought_by("NOPE").is_empty());
    }

    /// 指定供应商的查询会阻塞，直到测试放行或超时
    struct GatedSource {
        inner: StaticHistorySource,
        slow_key: &'static str,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PurchaseHistorySource for GatedSource {
        fn purchase_counts(&self, supplier_key: &str) -> Result<Vec<PurchaseCount>, HistoryError> {
            if supplier_key == self.slow_key {
                let _ = self.started.lock().unwrap().send(());
                let _ = self
                    .release
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5));
            }
            self.inner.purchase_counts(supplier_key)
        }
    }

    #[test]
    fn slow_supplier_does_not_block_other_suppliers() {
        let index = Arc::new(
            CatalogIndex::build(vec![product("V1", "CHILE JALAPENO VERDE", "50401700")]).unwrap(),
        );
        let suppliers: Vec<String> = (0..512).map(|i| format!("P{i:04}")).collect();
        let inner = suppliers
            .iter()
            .fold(StaticHistorySource::new(), |source, key| {
                source.with_purchases(key, &[("V1", 3)])
            });

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let source = Arc::new(GatedSource {
            inner,
            slow_key: "SLOW",
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let history = CachedSupplierHistory::new(source, index);
        for key in &suppliers {
            history.entries_bought_by(key);
        }

        std::thread::scope(|scope| {
            let slow = scope.spawn(|| history.entries_bought_by("SLOW"));
            started_rx.recv().unwrap();

            let begin = Instant::now();
            for key in &suppliers {
                assert_eq!(history.entries_bought_by(key).len(), 1);
            }
            assert!(history.entries_bought_by("NEW").is_empty());
            assert!(begin.elapsed() < Duration::from_secs(2), "{:?}", begin.elapsed());

            release_tx.send(()).unwrap();
            assert!(slow.join().unwrap().is_empty());
        });
    }

    #[test]
    fn source_failure_is_empty_and_not_cached() {
        let (source, history, _) = setup(true);
        assert!(history.entries_bought_by("P0001").is_empty());
        assert!(history.entries_bought_by("P0001").is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
