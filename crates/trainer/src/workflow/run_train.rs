//! Parameterized single-model training
//!
//! Fits one model on already-split data. The algorithm is chosen by name from
//! a closed set; unknown names fail before anything is fitted.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use kstarter_gbdt::Model;
use tracing::info;

use crate::booster::{BoosterParams, EvalSet, GbdtTrainer};
use crate::dataset::{FeatureMatrix, Labels};
use crate::errors::{Result, StarterError};
use crate::seed::set_seed;

pub const MODEL_JSON_FILE: &str = "model.json";
pub const MODEL_HASH_FILE: &str = "model.hash";

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    XgBoost,
}

impl FromStr for Algorithm {
    type Err = StarterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xgboost" => Ok(Algorithm::XgBoost),
            other => Err(StarterError::InvalidConfiguration(format!(
                "unknown model `{other}` (supported: xgboost)"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::XgBoost => write!(f, "xgboost"),
        }
    }
}

impl Algorithm {
    fn params(self, seed: u64) -> BoosterParams {
        match self {
            Algorithm::XgBoost => BoosterParams::xgboost(seed),
        }
    }
}

/// Inputs of `run_train`
#[derive(Debug, Clone)]
pub struct TrainRequest<'a> {
    pub x_train: &'a FeatureMatrix,
    pub y_train: &'a Labels,
    pub x_val: Option<&'a FeatureMatrix>,
    pub y_val: Option<&'a Labels>,
    pub model_name: String,
    /// Directory for `model.json` and `model.hash`
    pub save_dir: Option<PathBuf>,
    pub seed: u64,
}

impl<'a> TrainRequest<'a> {
    /// `xgboost` request without validation data or persistence
    pub fn new(x_train: &'a FeatureMatrix, y_train: &'a Labels, seed: u64) -> Self {
        Self {
            x_train,
            y_train,
            x_val: None,
            y_val: None,
            model_name: Algorithm::XgBoost.to_string(),
            save_dir: None,
            seed,
        }
    }
}

/// Fit one model; persist it when `save_dir` is set
pub fn run_train(request: &TrainRequest<'_>) -> Result<Model> {
    let ctx = set_seed(request.seed);
    let algorithm: Algorithm = request.model_name.parse()?;

    // evaluation needs both halves
    let eval = match (request.x_val, request.y_val) {
        (Some(x), Some(y)) => Some(EvalSet { x, y }),
        _ => None,
    };

    info!(
        "Training {} on {} rows x {} features (eval set: {})",
        algorithm,
        request.x_train.n_rows(),
        request.x_train.n_features(),
        eval.is_some()
    );

    let trainer = GbdtTrainer::new(algorithm.params(ctx.seed))?;
    let model = trainer.train(request.x_train, request.y_train, eval)?;

    if let Some(dir) = &request.save_dir {
        std::fs::create_dir_all(dir)?;

        let model_path = dir.join(MODEL_JSON_FILE);
        model.save_json(&model_path)?;

        let hash_hex = model.hash_hex()?;
        std::fs::write(dir.join(MODEL_HASH_FILE), &hash_hex)?;

        info!("Model saved to: {} ({})", model_path.display(), hash_hex);
    }

    Ok(model)
}
