//! Integration test: credit default analysis end-to-end

use credit_scope::data::DataConfig;
use credit_scope::optimizer::GridSearchConfig;
use credit_scope::pipeline::{Pipeline, PipelineConfig};
use credit_scope::rules::SkopeRulesConfig;
use std::io::Write;
use tempfile::NamedTempFile;

const TARGET: &str = "default payment next month";

fn header() -> Vec<String> {
    let mut cols = vec!["ID".to_string(), "LIMIT_BAL".to_string(), "PAY_0".to_string()];
    cols.extend((2..=6).map(|k| format!("PAY_{}", k)));
    cols.extend((1..=6).map(|k| format!("BILL_AMT{}", k)));
    cols.extend((1..=6).map(|k| format!("PAY_AMT{}", k)));
    cols.push(TARGET.to_string());
    cols
}

/// Client table laid out like the credit workbook: one line above the header,
/// defaults driven by the latest payment status plus a little noise
fn credit_csv(n_rows: usize) -> NamedTempFile {
    let cols = header();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();

    let preamble: Vec<String> = (0..cols.len()).map(|j| format!("X{}", j)).collect();
    writeln!(file, "{}", preamble.join(",")).unwrap();
    writeln!(file, "{}", cols.join(",")).unwrap();

    for i in 0..n_rows {
        let pay_0 = ((i * 7) % 5) as i64 - 1;
        let mut row: Vec<i64> = vec![i as i64 + 1, 10_000 * (1 + (i * 13 % 20) as i64), pay_0];
        row.extend((2..=6).map(|k| ((i * k * 3) % 5) as i64 - 1));
        row.extend((1..=6).map(|k| 1000 + ((i * 37 * k) % 5000) as i64));
        row.extend((1..=6).map(|k| ((i * 17 + k * 101) % 3000) as i64));
        let default = pay_0 >= 2 || i % 11 == 0;
        row.push(default as i64);

        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", line.join(",")).unwrap();
    }
    file.flush().unwrap();
    file
}

fn small_config(file: &NamedTempFile) -> PipelineConfig {
    PipelineConfig::default()
        .with_data(DataConfig::default().with_path(file.path()))
        .with_search(
            GridSearchConfig::new()
                .with_n_estimators(5)
                .with_max_depth_grid(vec![2, 3])
                .with_max_features_grid(vec![0.5, 1.0])
                .with_cv_folds(3),
        )
        .with_rules(Some(
            SkopeRulesConfig::default()
                .with_n_estimators(5)
                .with_precision_min(0.3)
                .with_recall_min(0.01),
        ))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn pop_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

#[test]
fn test_prepare_derives_features_and_splits() {
    let file = credit_csv(101);
    let pipeline = Pipeline::new(small_config(&file));
    let (train, test, n_rows) = pipeline.prepare().unwrap();

    assert_eq!(n_rows, 101);
    assert_eq!(train.n_samples(), 50);
    assert_eq!(test.n_samples(), 51);

    let names = train.feature_names();
    for derived in [
        "PAY_old_mean",
        "BILL_AMT_old_mean",
        "BILL_AMT_old_std",
        "PAY_AMT_old_mean",
        "PAY_AMT_old_std",
    ] {
        assert!(names.iter().any(|n| n == derived), "missing {}", derived);
    }
    for gone in ["ID", "PAY_0", "PAY_3", "PAY_6", "BILL_AMT3", "BILL_AMT6", "PAY_AMT4", TARGET] {
        assert!(!names.iter().any(|n| n == gone), "{} should be absent", gone);
    }
    assert!(names.iter().any(|n| n == "PAY_1"));
    assert_eq!(names.len(), 12);
    assert_eq!(test.feature_names(), names);
}

#[test]
fn test_aggregates_match_source_columns() {
    let file = credit_csv(40);
    let mut config = small_config(&file);
    config.data.drop_columns = vec![];
    config.features.drop_sources = false;
    let (train, test, _) = Pipeline::new(config).prepare().unwrap();

    for part in [&train, &test] {
        let pay: Vec<_> = ["PAY_3", "PAY_4", "PAY_5", "PAY_6"]
            .iter()
            .map(|c| part.column(c).unwrap().to_owned())
            .collect();
        let bill: Vec<_> = ["BILL_AMT3", "BILL_AMT4", "BILL_AMT5", "BILL_AMT6"]
            .iter()
            .map(|c| part.column(c).unwrap().to_owned())
            .collect();
        let pay_mean = part.column("PAY_old_mean").unwrap();
        let bill_std = part.column("BILL_AMT_old_std").unwrap();

        for i in 0..part.n_samples() {
            let p: Vec<f64> = pay.iter().map(|c| c[i]).collect();
            let b: Vec<f64> = bill.iter().map(|c| c[i]).collect();
            assert!((pay_mean[i] - mean(&p)).abs() < 1e-9);
            assert!((bill_std[i] - pop_std(&b)).abs() < 1e-9);
        }
    }
}

#[test]
fn test_split_is_disjoint_and_complete() {
    let file = credit_csv(61);
    let mut config = small_config(&file);
    config.data.drop_columns = vec![];
    let (train, test, n_rows) = Pipeline::new(config).prepare().unwrap();

    let mut ids: Vec<i64> = train
        .column("ID")
        .unwrap()
        .iter()
        .chain(test.column("ID").unwrap().iter())
        .map(|&v| v as i64)
        .collect();
    assert_eq!(train.n_samples(), n_rows / 2);
    ids.sort_unstable();
    assert_eq!(ids, (1..=61).collect::<Vec<i64>>());
}

#[test]
fn test_shuffle_is_seeded() {
    let file = credit_csv(30);
    let mut config = small_config(&file);
    config.data.drop_columns = vec![];

    let first = Pipeline::new(config.clone()).prepare().unwrap().0;
    let again = Pipeline::new(config.clone()).prepare().unwrap().0;
    let other = Pipeline::new(config.with_random_state(2)).prepare().unwrap().0;

    assert_eq!(first.column("ID").unwrap(), again.column("ID").unwrap());
    assert_ne!(first.column("ID").unwrap(), other.column("ID").unwrap());
}

#[test]
fn test_run_reports_best_params_within_grid() {
    let file = credit_csv(120);
    let pipeline = Pipeline::new(small_config(&file));
    let report = pipeline.run().unwrap();

    assert_eq!(report.n_rows, 120);
    assert_eq!(report.n_train, 60);
    assert_eq!(report.n_test, 60);
    assert_eq!(report.cv_results.len(), 4);
    assert!([2, 3].contains(&report.best_params.max_depth));
    assert!([0.5, 1.0].contains(&report.best_params.max_features));
    assert!(report.best_cv_score > 0.5);

    let auc = report.test_metrics.auc_roc.unwrap();
    assert!(auc > 0.6, "held-out AUC {}", auc);
    assert!((report.test_curves.roc_auc.unwrap() - auc).abs() < 1e-12);
    assert_eq!(report.feature_importances.len(), report.feature_names.len());

    let rules = report.rules.as_ref().unwrap();
    assert!(rules.n_rules >= 1);
    for pair in rules.top_rules.windows(2) {
        assert!(pair[0].precision >= pair[1].precision);
    }
    for r in &rules.top_rules {
        assert!(r.precision >= 0.3);
        assert!(r.recall >= 0.01);
    }
    let roc = rules.score_curves.roc.as_ref().unwrap();
    assert_eq!(roc.fpr.first(), Some(&0.0));
    assert_eq!(roc.tpr.last(), Some(&1.0));
    assert!(rules.score_curves.pr_auc.is_some());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("PAY_old_mean"));
}

#[test]
fn test_run_is_reproducible_and_rules_optional() {
    let file = credit_csv(80);
    let config = small_config(&file).with_rules(None);

    let a = Pipeline::new(config.clone()).run().unwrap();
    let b = Pipeline::new(config).run().unwrap();

    assert!(a.rules.is_none());
    assert_eq!(a.best_params, b.best_params);
    for (ca, cb) in a.cv_results.iter().zip(&b.cv_results) {
        assert_eq!(ca.fold_scores, cb.fold_scores);
    }
}

#[test]
fn test_missing_rename_source_is_skipped() {
    let file = credit_csv(40);
    let mut config = small_config(&file);
    config.data.renames.push(credit_scope::data::ColumnRename::new("NOT_THERE", "X"));

    let (train, _, _) = Pipeline::new(config).prepare().unwrap();
    assert!(train.feature_names().iter().any(|n| n == "PAY_1"));
    assert!(!train.feature_names().iter().any(|n| n == "X"));
}

#[test]
fn test_missing_target_column_fails() {
    let file = credit_csv(20);
    let mut config = small_config(&file);
    config.data.target_column = "label".to_string();
    assert!(Pipeline::new(config).prepare().is_err());
}
