//! Training workflows
//!
//! - `baseline`: stratified k-fold training with a submission file
//! - `run_train`: one model from pre-split data, chosen by name

pub mod baseline;
pub mod run_train;

pub use baseline::{run_baseline, BaselineReport, BaselineSettings, FoldReport, OofPredictions};
pub use run_train::{run_train, Algorithm, TrainRequest};
