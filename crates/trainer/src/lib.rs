//! kstarter trainer - reproducible boosted-tree workflows for tabular
//! binary-classification competitions
//!
//! Provides environment checks, static configuration, a k-fold baseline that
//! writes a submission file, and a parameterized single-model trainer. All
//! numerical work runs on an in-process histogram GBDT.

pub mod binning;
pub mod booster;
pub mod callback;
pub mod capabilities;
pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod folds;
pub mod metric;
pub mod preprocessing;
pub mod probe;
pub mod seed;
pub mod workflow;

pub use booster::{predict_proba, BoosterParams, EvalMetric, EvalSet, GbdtTrainer};
pub use capabilities::{capabilities, Capabilities, Device};
pub use config::{config, StarterConfig};
pub use dataset::{Column, ColumnData, FeatureMatrix, Labels, Table};
pub use errors::{Result, StarterError};
pub use folds::{Fold, StratifiedKFold};
pub use metric::{roc_auc_score, Metric};
pub use preprocessing::{clean_data, get_feature_columns, model_feature_columns};
pub use probe::{run_probe, ProbeConfig, ProbeReport};
pub use seed::{set_seed, SeedContext};
pub use workflow::{run_baseline, run_train, Algorithm, BaselineReport, BaselineSettings, TrainRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
