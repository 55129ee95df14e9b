use std::path::Path;

use crate::error::AppError;
use crate::models::{MatchOutcome, MatchResult};

const HEADER: [&str; 11] = [
    "description",
    "tax_code",
    "status",
    "code",
    "name",
    "level",
    "method",
    "confidence",
    "reason",
    "best_score",
    "message",
];

/// 导出匹配结果到 CSV，供人工复核
pub fn export_review_csv(results: &[MatchResult], output_path: &Path) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record(HEADER)?;

    for result in results {
        let tax_code = result.tax_code.clone().unwrap_or_default();
        let record: [String; 11] = match &result.outcome {
            MatchOutcome::Matched(m) => [
                result.description.clone(),
                tax_code,
                "matched".to_string(),
                m.entry.code.clone(),
                m.entry.name.clone(),
                m.level.to_string(),
                m.method.to_string(),
                format!("{:.2}", m.confidence),
                String::new(),
                m.score.to_string(),
                m.message.clone(),
            ],
            MatchOutcome::NoMatch(n) => [
                result.description.clone(),
                tax_code,
                "no_match".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                n.reason.to_string(),
                n.best_score.map(|s| s.to_string()).unwrap_or_default(),
                n.message.clone(),
            ],
        };
        writer.write_record(&record)?;
    }

    writer.flush()?;
    tracing::info!("复核清单已导出: {} 行 -> {}", results.len(), output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::matching::catalog_index::tests::product;
    use crate::matching::{CachedSupplierHistory, CatalogIndex, ProductMatcher, StaticHistorySource};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn writes_one_row_per_result() {
        let index = Arc::new(CatalogIndex::build(vec![product("ABA001", "AZUCAR ESTANDAR", "")]).unwrap());
        let history = Arc::new(CachedSupplierHistory::new(
            Arc::new(StaticHistorySource::new()),
            Arc::clone(&index),
        ));
        let matcher = ProductMatcher::new(index, history, MatchConfig::default());
        let results = vec![
            matcher.match_description("Azúcar estándar", "P0001", Some("50161509")),
            matcher.match_description("PAPEL", "P0001", None),
        ];

        let dir = tempdir().unwrap();
        let path = dir.path().join("review.csv");
        export_review_csv(&results, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "matched");
        assert_eq!(&rows[0][3], "ABA001");
        assert_eq!(&rows[0][5], "EXACT");
        assert_eq!(&rows[0][1], "50161509");
        assert_eq!(&rows[1][2], "no_match");
        assert_eq!(&rows[1][8], "below_threshold");
        assert!(!rows[1][9].is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("review.csv");
        let err = export_review_csv(&[], &path).unwrap_err();
        assert!(matches!(err, AppError::Csv(_)), "{err}");
    }
}
