//! Integration tests for the parameterized trainer

use anyhow::Result;
use kstarter_gbdt::Model;
use kstarter_trainer::workflow::run_train::{MODEL_HASH_FILE, MODEL_JSON_FILE};
use kstarter_trainer::{
    model_feature_columns, predict_proba, roc_auc_score, run_train, FeatureMatrix, Labels,
    StarterError, Table, TrainRequest,
};
use std::fmt::Write as _;
use tempfile::TempDir;

fn split(n: usize, offset: usize) -> Result<(FeatureMatrix, Labels)> {
    let x1: Vec<f64> = (0..n).map(|i| ((i + offset) * 31 % 97) as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i + offset) * 11 % 23) as f64).collect();
    let y: Vec<f64> = x1
        .iter()
        .zip(&x2)
        .map(|(a, b)| if a + 2.0 * b > 70.0 { 1.0 } else { 0.0 })
        .collect();
    Ok((
        FeatureMatrix::from_columns(vec!["x1".into(), "x2".into()], vec![x1, x2])?,
        Labels::from_values(y)?,
    ))
}

#[test]
fn test_rejects_unsupported_model_name() -> Result<()> {
    let (x, y) = split(50, 0)?;
    let out = TempDir::new()?;

    for name in ["logistic_regression", "lightgbm", "XGBoost", ""] {
        let request = TrainRequest {
            model_name: name.to_string(),
            save_dir: Some(out.path().join("model")),
            ..TrainRequest::new(&x, &y, 42)
        };
        let err = run_train(&request).unwrap_err();
        assert!(
            matches!(err, StarterError::InvalidConfiguration(_)),
            "unexpected error for {name:?}: {err}"
        );
    }

    // nothing was fitted, so nothing was written
    assert!(!out.path().join("model").exists());
    Ok(())
}

#[test]
fn test_train_with_validation_and_persist() -> Result<()> {
    let (x, y) = split(400, 0)?;
    let (vx, vy) = split(100, 5000)?;
    let out = TempDir::new()?;
    let save_dir = out.path().join("runs").join("xgb");

    let request = TrainRequest {
        x_val: Some(&vx),
        y_val: Some(&vy),
        save_dir: Some(save_dir.clone()),
        ..TrainRequest::new(&x, &y, 42)
    };
    let model = run_train(&request)?;

    let best = model.best_iteration.expect("early stopping sets best_iteration");
    assert_eq!(model.num_trees(), best + 1);

    let auc = roc_auc_score(vy.as_slice(), &predict_proba(&model, &vx)?);
    assert!(auc > 0.9, "validation AUC too low: {auc}");

    let reloaded = Model::load_json(save_dir.join(MODEL_JSON_FILE))?;
    assert_eq!(reloaded, model);
    let stored_hash = std::fs::read_to_string(save_dir.join(MODEL_HASH_FILE))?;
    assert_eq!(stored_hash, model.hash_hex()?);
    assert_eq!(stored_hash, reloaded.hash_hex()?);
    Ok(())
}

#[test]
fn test_same_seed_same_model() -> Result<()> {
    let (x, y) = split(200, 0)?;

    let a = run_train(&TrainRequest::new(&x, &y, 11))?;
    let b = run_train(&TrainRequest::new(&x, &y, 11))?;

    assert_eq!(a.to_canonical_json()?, b.to_canonical_json()?);
    Ok(())
}

#[test]
fn test_train_from_csv_with_text_column() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("train.csv");
    let mut csv = String::from("id,Age,Sex,Max HR,Heart Disease\n");
    for i in 0..120 {
        let positive = i % 2 == 1;
        let sex = if i % 3 == 0 { "M" } else { "F" };
        let age = 45 + (i * 7 % 20) + if positive { 10 } else { 0 };
        writeln!(csv, "{},{},{},{},{}", i, age, sex, 150 + i * 13 % 30, positive as u8)?;
    }
    std::fs::write(&path, csv)?;

    let table = Table::from_csv(&path)?;
    let features = model_feature_columns(&table, "id", "Heart Disease")?;
    assert_eq!(features, vec!["Age", "Max HR"]);

    let x = FeatureMatrix::from_table(&table, &features, "training data")?;
    let y = Labels::from_table(&table, "Heart Disease", "training data")?;
    let model = run_train(&TrainRequest::new(&x, &y, 42))?;
    assert_eq!(model.feature_names, features);
    assert!(model.num_trees() > 0);
    Ok(())
}
