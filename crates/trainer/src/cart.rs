//! Histogram tree builder
//!
//! Grows one regression tree over binned features from per-row gradients and
//! hessians. Split search scans per-feature gradient histograms and tries both
//! directions for missing values.

use kstarter_gbdt::{Node, Tree};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::binning::BinnedMatrix;
use crate::capabilities::Device;
use crate::deterministic::SplitTieBreaker;

/// How a tree grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthPolicy {
    /// Split the leaf with the highest gain first until `num_leaves`
    LeafWise {
        num_leaves: usize,
        max_depth: Option<usize>,
    },
    /// Split every splittable leaf of one level before the next
    DepthWise { max_depth: usize },
}

impl GrowthPolicy {
    fn max_leaves(&self) -> usize {
        match self {
            GrowthPolicy::LeafWise { num_leaves, .. } => *num_leaves,
            GrowthPolicy::DepthWise { .. } => usize::MAX,
        }
    }

    fn max_depth(&self) -> Option<usize> {
        match self {
            GrowthPolicy::LeafWise { max_depth, .. } => *max_depth,
            GrowthPolicy::DepthWise { max_depth } => Some(*max_depth),
        }
    }
}

/// Training parameters for a single tree
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub growth: GrowthPolicy,
    pub min_data_in_leaf: usize,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    pub lambda_l2: f64,
    pub min_split_gain: f64,
    /// Shrinkage applied to leaf values
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            growth: GrowthPolicy::DepthWise { max_depth: 6 },
            min_data_in_leaf: 1,
            min_child_weight: 1.0,
            lambda_l2: 1.0,
            min_split_gain: 0.0,
            learning_rate: 0.3,
        }
    }
}

/// Gradient statistics of a set of rows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GradStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl GradStats {
    fn add(&mut self, grad: f64, hess: f64) {
        self.grad += grad;
        self.hess += hess;
        self.count += 1;
    }

    fn plus(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad + other.grad,
            hess: self.hess + other.hess,
            count: self.count + other.count,
        }
    }

    fn minus(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    bin: usize,
    default_left: bool,
    gain: f64,
    left: GradStats,
    right: GradStats,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// A leaf that may still be split
struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: SplitCandidate,
}

/// Build regression trees over a binned training matrix
pub struct HistogramTreeBuilder<'a> {
    data: &'a BinnedMatrix,
    config: &'a TreeConfig,
    device: Device,
}

impl<'a> HistogramTreeBuilder<'a> {
    pub fn new(data: &'a BinnedMatrix, config: &'a TreeConfig, device: Device) -> Self {
        Self {
            data,
            config,
            device,
        }
    }

    /// Grow one tree on `rows`, considering only `features`
    pub fn build(&self, grad: &[f64], hess: &[f64], rows: Vec<usize>, features: &[usize]) -> Tree {
        let root_stats = self.stats(&rows, grad, hess);
        let mut nodes = vec![Node::leaf(0, self.leaf_value(root_stats))];
        let mut open: Vec<OpenLeaf> = Vec::new();
        self.push_open(&mut open, 0, rows, 0, root_stats, grad, hess, features);

        let max_leaves = self.config.growth.max_leaves();
        let mut leaves = 1usize;

        while leaves < max_leaves {
            let Some(pick) = self.next_leaf(&open) else {
                break;
            };
            let leaf = open.remove(pick);
            let split = &leaf.split;

            let bins = self.data.column(split.feature_idx);
            let cuts = self.data.feature_bins(split.feature_idx);
            let missing_bin = cuts.missing_bin();
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                leaf.rows.iter().partition(|&&r| {
                    let b = bins[r] as usize;
                    if b == missing_bin {
                        split.default_left
                    } else {
                        b <= split.bin
                    }
                });

            let left_id = nodes.len();
            let right_id = left_id + 1;
            nodes[leaf.node] = Node::internal(
                leaf.node as i32,
                split.feature_idx as i32,
                cuts.threshold(split.bin),
                split.default_left,
                left_id as i32,
                right_id as i32,
            );
            nodes.push(Node::leaf(left_id as i32, self.leaf_value(split.left)));
            nodes.push(Node::leaf(right_id as i32, self.leaf_value(split.right)));
            leaves += 1;

            let (left_stats, right_stats) = (split.left, split.right);
            let depth = leaf.depth + 1;
            self.push_open(&mut open, left_id, left_rows, depth, left_stats, grad, hess, features);
            self.push_open(&mut open, right_id, right_rows, depth, right_stats, grad, hess, features);
        }

        Tree::new(nodes)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_open(
        &self,
        open: &mut Vec<OpenLeaf>,
        node: usize,
        rows: Vec<usize>,
        depth: usize,
        stats: GradStats,
        grad: &[f64],
        hess: &[f64],
        features: &[usize],
    ) {
        if self.config.growth.max_depth().is_some_and(|d| depth >= d)
            || rows.len() < 2 * self.config.min_data_in_leaf.max(1)
        {
            return;
        }
        if let Some(split) = self.find_best_split(&rows, stats, grad, hess, features) {
            open.push(OpenLeaf {
                node,
                rows,
                depth,
                split,
            });
        }
    }

    /// Index into `open` of the leaf to split next
    fn next_leaf(&self, open: &[OpenLeaf]) -> Option<usize> {
        match self.config.growth {
            GrowthPolicy::DepthWise { .. } => (!open.is_empty()).then_some(0),
            GrowthPolicy::LeafWise { .. } => open
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (i, leaf)| match best {
                    Some((_, gain)) if gain >= leaf.split.gain => best,
                    _ => Some((i, leaf.split.gain)),
                })
                .map(|(i, _)| i),
        }
    }

    fn stats(&self, rows: &[usize], grad: &[f64], hess: &[f64]) -> GradStats {
        let mut stats = GradStats::default();
        for &r in rows {
            stats.add(grad[r], hess[r]);
        }
        stats
    }

    fn leaf_value(&self, stats: GradStats) -> f64 {
        -stats.grad / (stats.hess + self.config.lambda_l2) * self.config.learning_rate
    }

    fn score(&self, stats: GradStats) -> f64 {
        stats.grad * stats.grad / (stats.hess + self.config.lambda_l2)
    }

    fn admissible(&self, stats: GradStats) -> bool {
        stats.count >= self.config.min_data_in_leaf && stats.hess >= self.config.min_child_weight
    }

    /// Best split over `features`; histograms are built per feature, in
    /// parallel on the accelerated device.
    fn find_best_split(
        &self,
        rows: &[usize],
        stats: GradStats,
        grad: &[f64],
        hess: &[f64],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let per_feature = |&f: &usize| self.best_split_for_feature(f, rows, stats, grad, hess);

        let candidates: Vec<Option<SplitCandidate>> = match self.device {
            #[cfg(feature = "parallel")]
            Device::Accelerated => features.par_iter().map(per_feature).collect(),
            _ => features.iter().map(per_feature).collect(),
        };

        candidates
            .into_iter()
            .flatten()
            .fold(None, |best, candidate| match best {
                Some(b) if !candidate.beats(&b) => Some(b),
                _ => Some(candidate),
            })
    }

    fn best_split_for_feature(
        &self,
        feature_idx: usize,
        rows: &[usize],
        stats: GradStats,
        grad: &[f64],
        hess: &[f64],
    ) -> Option<SplitCandidate> {
        let cuts = self.data.feature_bins(feature_idx);
        let n_bins = cuts.n_bins();
        if n_bins < 2 {
            return None;
        }

        let bins = self.data.column(feature_idx);
        let mut hist = vec![GradStats::default(); n_bins + 1];
        for &r in rows {
            hist[bins[r] as usize].add(grad[r], hess[r]);
        }

        let missing = hist[cuts.missing_bin()];
        let directions: &[bool] = if missing.count > 0 {
            &[false, true]
        } else {
            &[false]
        };
        let parent_score = self.score(stats);

        let mut best: Option<SplitCandidate> = None;
        let mut left = GradStats::default();
        for (bin, bucket) in hist.iter().take(n_bins - 1).enumerate() {
            left = left.plus(*bucket);
            if bucket.count == 0 && bin > 0 {
                continue;
            }

            for &default_left in directions {
                let l = if default_left { left.plus(missing) } else { left };
                let r = stats.minus(l);
                if !self.admissible(l) || !self.admissible(r) {
                    continue;
                }

                let gain = self.score(l) + self.score(r) - parent_score;
                if !gain.is_finite() || gain <= self.config.min_split_gain || gain <= 0.0 {
                    continue;
                }

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        bin,
                        default_left,
                        gain,
                        left: l,
                        right: r,
                        tie_breaker: SplitTieBreaker::new(feature_idx, bin),
                    });
                }
            }
        }

        best
    }
}
