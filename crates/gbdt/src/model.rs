//! Boosted-tree ensemble with probability inference
//!
//! Implements the fitted-model representation with:
//! - Canonical JSON serialization (`model.json`)
//! - Native text serialization (per-fold `.txt` dumps)
//! - Blake3 model hashing
//! - Feature-name bookkeeping so inference can check column order

use super::tree::Tree;
use crate::text;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid model format: {0}")]
    InvalidFormat(String),
}

/// Current model format version
pub const MODEL_FORMAT_VERSION: i32 = 1;

/// Learning task the margins are interpreted for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Binary log-loss; margins are log-odds
    Binary,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::Binary => "binary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "binary" => Some(Objective::Binary),
            _ => None,
        }
    }
}

/// Logistic link
pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Fitted boosted-tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    pub objective: Objective,

    /// Initial margin added to every prediction
    pub base_score: f64,

    /// Decision trees in the ensemble; leaf values already carry the learning rate
    pub trees: Vec<Tree>,

    /// Feature names in the order the trees index them
    pub feature_names: Vec<String>,

    /// Zero-based boosting round kept by early stopping
    pub best_iteration: Option<usize>,
}

impl Model {
    pub fn new(
        objective: Objective,
        base_score: f64,
        trees: Vec<Tree>,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            objective,
            base_score,
            trees,
            feature_names,
            best_iteration: None,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base score: {}",
                self.base_score
            )));
        }

        let n_features = self.feature_names.len() as i32;
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;

            if let Some(node) = tree.nodes.iter().find(|n| n.feature_idx >= n_features) {
                return Err(ModelError::ValidationFailed(format!(
                    "Tree {} node {} references feature {} but model has {} features",
                    i, node.id, node.feature_idx, n_features
                )));
            }
        }

        if let Some(best) = self.best_iteration {
            if best >= self.trees.len() {
                return Err(ModelError::ValidationFailed(format!(
                    "best_iteration {} out of range for {} trees",
                    best,
                    self.trees.len()
                )));
            }
        }

        Ok(())
    }

    /// Raw margin for one row
    pub fn predict_margin_row(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.evaluate(features))
    }

    /// Positive-class probability for one row
    pub fn predict_proba_row(&self, features: &[f64]) -> f64 {
        match self.objective {
            Objective::Binary => sigmoid(self.predict_margin_row(features)),
        }
    }

    /// Keep only the first `n` trees
    pub fn truncate(&mut self, n: usize) {
        self.trees.truncate(n);
        if let Some(best) = self.best_iteration {
            if best >= self.trees.len() {
                self.best_iteration = self.trees.len().checked_sub(1);
            }
        }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    ///
    /// Equal models always produce byte-identical JSON, so the blake3 digest
    /// written next to `model.json` identifies the fitted parameters.
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        // serde_json's Map is key-ordered unless `preserve_order` is enabled
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&value)?)
    }

    /// Blake3 digest of the canonical JSON, hex encoded
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        let json = self.to_canonical_json()?;
        Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
    }

    /// Save model to a JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let json = self.to_canonical_json()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load model from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Render the native text format
    pub fn to_text(&self) -> String {
        text::TextDump(self).to_string()
    }

    /// Parse the native text format
    pub fn from_text(input: &str) -> Result<Self, ModelError> {
        let model = text::read_model(input)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save_text<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn load_text<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let input = fs::read_to_string(path)?;
        Self::from_text(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn create_test_model() -> Model {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 50.0, false, 1, 2),
            Node::leaf(1, -1.0),
            Node::leaf(2, 1.0),
        ]);

        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 30.0, true, 1, 2),
            Node::leaf(1, -0.5),
            Node::leaf(2, 0.5),
        ]);

        Model::new(
            Objective::Binary,
            0.25,
            vec![tree1, tree2],
            vec!["age".to_string(), "chol".to_string()],
        )
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, MODEL_FORMAT_VERSION);
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.num_features(), 2);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_margin_and_probability() {
        let model = create_test_model();

        // tree1 left (-1.0), tree2 left (-0.5), base 0.25
        let margin = model.predict_margin_row(&[30.0, 20.0]);
        assert!((margin - (-1.25)).abs() < 1e-12);

        let p = model.predict_proba_row(&[30.0, 20.0]);
        assert!((p - sigmoid(-1.25)).abs() < 1e-12);

        // missing chol goes left in tree2
        let m_missing = model.predict_margin_row(&[60.0, f64::NAN]);
        assert!((m_missing - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) <= 1.0);
        assert!(sigmoid(-40.0) >= 0.0);
    }

    #[test]
    fn test_canonical_json_and_hash() {
        let model = create_test_model();
        let json = model.to_canonical_json().unwrap();
        assert!(!json.contains('\n'));
        assert!(!json.contains(": "));
        assert!(json.contains("\"objective\":\"binary\""));

        // top-level keys in sorted order
        let keys = ["base_score", "best_iteration", "feature_names", "objective", "trees", "version"];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{k}\":")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // node keys sorted inside nested arrays too
        let node = json.find("\"default_left\"").unwrap();
        assert!(json.find("\"feature_idx\"").unwrap() > node);
        assert_eq!(model.hash_hex().unwrap().len(), 64);

        let h1 = model.hash_hex().unwrap();
        let h2 = create_test_model().hash_hex().unwrap();
        assert_eq!(h1, h2);

        let mut other = create_test_model();
        other.trees[0].nodes[1].leaf = Some(-2.0);
        assert_ne!(h1, other.hash_hex().unwrap());
    }

    #[test]
    fn test_save_load_json() {
        use tempfile::NamedTempFile;

        let model = create_test_model();
        let temp_file = NamedTempFile::new().unwrap();

        model.save_json(temp_file.path()).unwrap();
        let loaded = Model::load_json(temp_file.path()).unwrap();

        assert_eq!(model, loaded);
        assert_eq!(model.hash_hex().unwrap(), loaded.hash_hex().unwrap());
    }

    #[test]
    fn test_model_validation() {
        let mut bad_version = create_test_model();
        bad_version.version = 999;
        assert!(bad_version.validate().is_err());

        let mut bad_feature = create_test_model();
        bad_feature.trees[1].nodes[0].feature_idx = 5;
        assert!(bad_feature.validate().is_err());

        let mut bad_best = create_test_model();
        bad_best.best_iteration = Some(2);
        assert!(bad_best.validate().is_err());
    }

    #[test]
    fn test_truncate_clamps_best_iteration() {
        let mut model = create_test_model();
        model.best_iteration = Some(1);
        model.truncate(1);
        assert_eq!(model.num_trees(), 1);
        assert_eq!(model.best_iteration, Some(0));
    }
}
