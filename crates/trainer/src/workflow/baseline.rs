//! K-fold baseline: cross-validated boosted trees and a submission file
//!
//! Load, select numeric features, train one leaf-wise model per stratified
//! fold with early stopping on validation AUC, score the out-of-fold
//! predictions, then average the fold models' test predictions into the
//! sample submission.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::booster::{predict_proba, BoosterParams, EvalSet, GbdtTrainer};
use crate::capabilities::Device;
use crate::config::StarterConfig;
use crate::dataset::{ColumnData, FeatureMatrix, Labels, Table};
use crate::errors::{Result, StarterError};
use crate::folds::StratifiedKFold;
use crate::metric::roc_auc_score;
use crate::preprocessing::{clean_data, model_feature_columns};

pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const SAMPLE_SUBMISSION_FILE: &str = "sample_submission.csv";
pub const SUBMISSION_FILE: &str = "submission_v1.csv";

pub const DEFAULT_ID_COL: &str = "id";
pub const DEFAULT_TARGET_COL: &str = "Heart Disease";
pub const DEFAULT_N_FOLDS: usize = 5;

/// Per-fold model file name (folds are numbered from 1)
pub fn fold_model_file(fold: usize) -> String {
    format!("lgbm_fold{fold}.txt")
}

/// Inputs of one baseline run
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSettings {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub model_dir: PathBuf,
    pub id_col: String,
    pub target_col: String,
    pub n_folds: usize,
    pub seed: u64,
    pub device: Device,
}

impl BaselineSettings {
    /// Settings from configuration, with the device taken from `LGBM_DEVICE`
    pub fn from_config(config: &StarterConfig) -> Result<Self> {
        Ok(Self::with_device(config, Device::from_env()?))
    }

    pub fn with_device(config: &StarterConfig, device: Device) -> Self {
        Self {
            data_dir: config.paths.data_raw_dir.clone(),
            output_dir: config.paths.data_output_dir.clone(),
            model_dir: config.paths.models_dir.clone(),
            id_col: DEFAULT_ID_COL.to_string(),
            target_col: DEFAULT_TARGET_COL.to_string(),
            n_folds: DEFAULT_N_FOLDS,
            seed: config.default_seed,
            device,
        }
    }
}

/// Outcome of one fold
#[derive(Debug, Clone, PartialEq)]
pub struct FoldReport {
    /// One-based fold number
    pub fold: usize,
    pub auc: f64,
    pub best_iteration: Option<usize>,
    pub model_path: PathBuf,
}

/// Outcome of a baseline run
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineReport {
    pub features: Vec<String>,
    pub folds: Vec<FoldReport>,
    /// AUC of the full out-of-fold vector
    pub cv_auc: f64,
    pub submission_path: PathBuf,
}

impl BaselineReport {
    pub fn model_paths(&self) -> Vec<&Path> {
        self.folds.iter().map(|f| f.model_path.as_path()).collect()
    }
}

/// Out-of-fold predictions; every slot is written exactly once
#[derive(Debug, Clone)]
pub struct OofPredictions {
    slots: Vec<Option<f64>>,
}

impl OofPredictions {
    pub fn new(n_rows: usize) -> Self {
        Self {
            slots: vec![None; n_rows],
        }
    }

    pub fn write(&mut self, row: usize, value: f64) -> Result<()> {
        let n_rows = self.slots.len();
        match self.slots.get_mut(row) {
            None => Err(StarterError::Training(format!(
                "out-of-fold row {row} out of range for {n_rows} rows"
            ))),
            Some(Some(_)) => Err(StarterError::Training(format!(
                "out-of-fold row {row} written twice"
            ))),
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
        }
    }

    /// Write `values[i]` into row `rows[i]`
    pub fn write_rows(&mut self, rows: &[usize], values: &[f64]) -> Result<()> {
        if rows.len() != values.len() {
            return Err(StarterError::Training(format!(
                "{} rows but {} predictions",
                rows.len(),
                values.len()
            )));
        }
        rows.iter()
            .zip(values)
            .try_for_each(|(&row, &value)| self.write(row, value))
    }

    pub fn written(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// The complete vector; fails if any row was never predicted
    pub fn into_vec(self) -> Result<Vec<f64>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(row, slot)| {
                slot.ok_or_else(|| {
                    StarterError::Training(format!("out-of-fold row {row} was never predicted"))
                })
            })
            .collect()
    }
}

/// Run the k-fold baseline end to end
pub fn run_baseline(settings: &BaselineSettings) -> Result<BaselineReport> {
    std::fs::create_dir_all(&settings.output_dir)?;
    std::fs::create_dir_all(&settings.model_dir)?;

    info!("=== Loading data ===");
    let train = clean_data(&Table::from_csv(settings.data_dir.join(TRAIN_FILE))?);
    let test = clean_data(&Table::from_csv(settings.data_dir.join(TEST_FILE))?);
    let mut submission = Table::from_csv(settings.data_dir.join(SAMPLE_SUBMISSION_FILE))?;
    info!("Train shape: {:?}", train.shape());

    let features = model_feature_columns(&train, &settings.id_col, &settings.target_col)?;
    info!("Features: {} cols", features.len());

    let x = FeatureMatrix::from_table(&train, &features, TRAIN_FILE)?;
    let y = Labels::from_table(&train, &settings.target_col, TRAIN_FILE)?;
    let x_test = FeatureMatrix::from_table(&test, &features, TEST_FILE)?;
    if submission.n_rows() != x_test.n_rows() {
        return Err(StarterError::SchemaMismatch(format!(
            "{} has {} rows but {} has {}",
            SAMPLE_SUBMISSION_FILE,
            submission.n_rows(),
            TEST_FILE,
            x_test.n_rows()
        )));
    }

    let folds = StratifiedKFold::new(settings.n_folds, settings.seed).split(y.as_slice())?;
    let trainer = GbdtTrainer::new(BoosterParams::lightgbm_baseline(
        settings.seed,
        settings.device,
    ))?;

    let mut oof = OofPredictions::new(x.n_rows());
    let mut test_preds = vec![0.0; x_test.n_rows()];
    let mut reports = Vec::with_capacity(folds.len());
    let n_folds = folds.len() as f64;

    for fold in &folds {
        let number = fold.index + 1;
        info!("--- Fold {} ---", number);

        let x_train = x.take_rows(&fold.train_indices);
        let y_train = y.take(&fold.train_indices);
        let x_val = x.take_rows(&fold.valid_indices);
        let y_val = y.take(&fold.valid_indices);

        let model = trainer.train(
            &x_train,
            &y_train,
            Some(EvalSet {
                x: &x_val,
                y: &y_val,
            }),
        )?;

        let val_pred = predict_proba(&model, &x_val)?;
        oof.write_rows(&fold.valid_indices, &val_pred)?;

        for (acc, p) in test_preds.iter_mut().zip(predict_proba(&model, &x_test)?) {
            *acc += p / n_folds;
        }

        let auc = roc_auc_score(y_val.as_slice(), &val_pred);
        info!("Fold {} AUC: {:.4}", number, auc);

        let model_path = settings.model_dir.join(fold_model_file(number));
        model.save_text(&model_path)?;

        reports.push(FoldReport {
            fold: number,
            auc,
            best_iteration: model.best_iteration,
            model_path,
        });
    }

    let oof = oof.into_vec()?;
    let cv_auc = roc_auc_score(y.as_slice(), &oof);
    info!("=== CV Score (AUC): {:.4} ===", cv_auc);

    submission.set_column(&settings.target_col, ColumnData::Numeric(test_preds))?;
    let submission_path = settings.output_dir.join(SUBMISSION_FILE);
    submission.write_csv(&submission_path)?;
    info!("Submission saved to: {}", submission_path.display());

    Ok(BaselineReport {
        features,
        folds: reports,
        cv_auc,
        submission_path,
    })
}
