//! End-to-end tests for the k-fold baseline
//!
//! Builds a small synthetic competition directory, runs the whole workflow
//! and checks the submission and per-fold model files.

use anyhow::Result;
use kstarter_gbdt::Model;
use kstarter_trainer::workflow::baseline::{fold_model_file, SUBMISSION_FILE};
use kstarter_trainer::{run_baseline, BaselineSettings, Device, Table};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

const TARGET: &str = "Heart Disease";

/// Deterministic pseudo-random feature value in [0, 1)
fn noise(i: usize, salt: usize) -> f64 {
    ((i * 7919 + salt * 104_729) % 1000) as f64 / 1000.0
}

/// `train.csv` with `n` rows alternating between the two classes
fn write_train(dir: &Path, n: usize, labels: [&str; 2]) -> Result<()> {
    let mut csv = format!("id,Age,Sex,Cholesterol,Max HR,{TARGET}\n");
    for i in 0..n {
        let positive = i % 2 == 1;
        let shift = if positive { 8.0 } else { 0.0 };
        let sex = if i % 3 == 0 { "M" } else { "F" };
        writeln!(
            csv,
            "{},{:.1},{},{:.1},{},{}",
            i,
            45.0 + shift + 10.0 * noise(i, 1),
            sex,
            200.0 + 40.0 * noise(i, 2),
            // leave a few cells empty
            if i % 17 == 0 {
                String::new()
            } else {
                format!("{:.1}", 160.0 - 2.0 * shift + 20.0 * noise(i, 3))
            },
            labels[positive as usize]
        )?;
    }
    std::fs::write(dir.join("train.csv"), csv)?;
    Ok(())
}

fn write_test_and_sample(dir: &Path, n: usize) -> Result<()> {
    let mut test = String::from("id,Age,Sex,Cholesterol,Max HR\n");
    let mut sample = format!("id,{TARGET}\n");
    for i in 0..n {
        let id = 1000 + i;
        writeln!(
            test,
            "{},{:.1},M,{:.1},{:.1}",
            id,
            40.0 + 20.0 * noise(i, 4),
            200.0 + 40.0 * noise(i, 5),
            140.0 + 30.0 * noise(i, 6)
        )?;
        writeln!(sample, "{id},0")?;
    }
    std::fs::write(dir.join("test.csv"), test)?;
    std::fs::write(dir.join("sample_submission.csv"), sample)?;
    Ok(())
}

fn settings(root: &Path, seed: u64) -> BaselineSettings {
    BaselineSettings {
        data_dir: root.join("data").join("raw"),
        output_dir: root.join("data").join("output"),
        model_dir: root.join("models"),
        id_col: "id".to_string(),
        target_col: TARGET.to_string(),
        n_folds: 5,
        seed,
        device: Device::Cpu,
    }
}

fn competition_dir(labels: [&str; 2]) -> Result<TempDir> {
    let root = TempDir::new()?;
    let raw = root.path().join("data").join("raw");
    std::fs::create_dir_all(&raw)?;
    write_train(&raw, 100, labels)?;
    write_test_and_sample(&raw, 20)?;
    Ok(root)
}

#[test]
fn test_baseline_end_to_end() -> Result<()> {
    let root = competition_dir(["0", "1"])?;
    let settings = settings(root.path(), 42);

    let report = run_baseline(&settings)?;

    assert!((0.0..=1.0).contains(&report.cv_auc));
    assert_eq!(report.features, vec!["Age", "Cholesterol", "Max HR"]);
    assert_eq!(report.folds.len(), 5);

    // one model per fold, numbered from 1, each loadable
    for fold in 1..=5 {
        let path = settings.model_dir.join(fold_model_file(fold));
        assert!(path.exists(), "missing {}", path.display());
        let model = Model::load_text(&path)?;
        assert_eq!(model.feature_names, report.features);
        assert!(model.best_iteration.is_some());
    }
    assert_eq!(report.model_paths().len(), 5);

    // submission keeps the sample's ids and replaces the target column
    let submission_path = settings.output_dir.join(SUBMISSION_FILE);
    assert_eq!(report.submission_path, submission_path);
    let submission = Table::from_csv(&submission_path)?;
    assert_eq!(submission.shape(), (20, 2));
    assert_eq!(submission.column_names(), vec!["id", TARGET]);

    let preds = match &submission.column(TARGET).unwrap().data {
        kstarter_trainer::ColumnData::Numeric(values) => values.clone(),
        other => panic!("target column is not numeric: {other:?}"),
    };
    assert!(preds.iter().all(|p| (0.0..=1.0).contains(p)));

    Ok(())
}

#[test]
fn test_baseline_is_reproducible() -> Result<()> {
    let first = competition_dir(["0", "1"])?;
    let second = competition_dir(["0", "1"])?;

    let a = run_baseline(&settings(first.path(), 7))?;
    let b = run_baseline(&settings(second.path(), 7))?;

    assert_eq!(a.cv_auc, b.cv_auc);
    assert_eq!(
        std::fs::read_to_string(&a.submission_path)?,
        std::fs::read_to_string(&b.submission_path)?
    );
    for (pa, pb) in a.model_paths().iter().zip(b.model_paths()) {
        assert_eq!(std::fs::read_to_string(pa)?, std::fs::read_to_string(pb)?);
    }

    Ok(())
}

#[test]
fn test_baseline_text_labels() -> Result<()> {
    let root = competition_dir(["Absence", "Presence"])?;
    let report = run_baseline(&settings(root.path(), 42))?;
    assert!((0.0..=1.0).contains(&report.cv_auc));
    Ok(())
}

#[test]
fn test_baseline_missing_target_column() -> Result<()> {
    let root = competition_dir(["0", "1"])?;
    let mut settings = settings(root.path(), 42);
    settings.target_col = "HeartDisease".to_string();

    let err = run_baseline(&settings).unwrap_err();
    assert!(err.to_string().contains("HeartDisease"));
    assert!(!settings.output_dir.join(SUBMISSION_FILE).exists());
    Ok(())
}
