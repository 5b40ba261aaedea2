//! Boosted-tree model format for kstarter
//!
//! Holds the fitted-ensemble representation shared by the trainer and the
//! workflows that persist or reload models.
//!
//! Modules:
//! - `tree`: split/leaf nodes and single-tree traversal
//! - `model`: ensembles, probability inference, canonical JSON persistence and
//!   blake3 hashing
//! - `text`: line-oriented native model format used for per-fold dumps
//!
//! # Usage
//!
//! ```rust
//! use kstarter_gbdt::{Model, Node, Objective, Tree};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 0.5, true, 1, 2),
//!     Node::leaf(1, -0.4),
//!     Node::leaf(2, 0.4),
//! ]);
//! let model = Model::new(Objective::Binary, 0.0, vec![tree], vec!["age".to_string()]);
//!
//! let p = model.predict_proba_row(&[0.9]);
//! assert!(p > 0.5);
//! ```

pub mod model;
pub mod text;
pub mod tree;

pub use model::{sigmoid, Model, ModelError, Objective, MODEL_FORMAT_VERSION};
pub use tree::{Node, Tree};

/// Crate version string embedded in native model dumps
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
