//! Decision tree structures for boosted-tree inference
//!
//! Nodes live in a flat vector; node 0 is the root. Internal nodes send a row
//! left when `value <= threshold`, and missing values (`NaN`) follow
//! `default_left`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the (learning-rate scaled) margin contribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID, equal to the node's position in the tree
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold in raw feature units
    pub threshold: f64,

    /// Direction taken by missing values
    pub default_left: bool,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(
        id: i32,
        feature_idx: i32,
        threshold: f64,
        default_left: bool,
        left: i32,
        right: i32,
    ) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            default_left,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            default_left: false,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree over raw feature values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on a feature vector.
    ///
    /// A structurally broken tree evaluates to 0.0; `validate` is the place
    /// where such trees are rejected.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0.0;
            };

            let go_left = if value.is_nan() {
                node.default_left
            } else {
                value <= node.threshold
            };

            let next = if go_left { node.left } else { node.right };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, depth: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => walk(nodes, node.left as usize, depth + 1)
                    .max(walk(nodes, node.right as usize, depth + 1)),
                _ => depth,
            }
        }
        walk(&self.nodes, 0, 0)
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    Some(v) => return Err(format!("Leaf node {i} has non-finite value {v}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            // children are always appended after their parent
            if node.left <= i as i32 || node.left >= len {
                return Err(format!("Node {} has invalid left child: {}", i, node.left));
            }
            if node.right <= i as i32 || node.right >= len {
                return Err(format!("Node {} has invalid right child: {}", i, node.right));
            }
            if node.threshold.is_nan() {
                return Err(format!("Node {i} has NaN threshold"));
            }
        }

        Ok(())
    }
}
