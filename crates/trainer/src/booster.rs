//! Gradient boosting for binary classification
//!
//! Logistic loss, histogram trees, optional row/feature subsampling and early
//! stopping on a held-out evaluation set. Two presets mirror the stock
//! boosted-tree configurations used by the training workflows.

use kstarter_gbdt::{sigmoid, Model, Objective, Tree};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::binning::BinnedMatrix;
use crate::callback::{EarlyStopAction, EarlyStopping};
use crate::capabilities::{capabilities, Device};
use crate::cart::{GrowthPolicy, HistogramTreeBuilder, TreeConfig};
use crate::dataset::{FeatureMatrix, Labels};
use crate::errors::{Result, StarterError};
use crate::metric::{Auc, LogLoss, Metric};

const MIN_HESSIAN: f64 = 1e-16;
const BASE_RATE_CLAMP: f64 = 1e-6;

/// Metric watched on the evaluation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMetric {
    #[default]
    Auc,
    LogLoss,
}

impl EvalMetric {
    pub fn metric(&self) -> &'static dyn Metric {
        match self {
            EvalMetric::Auc => &Auc,
            EvalMetric::LogLoss => &LogLoss,
        }
    }
}

/// Boosting configuration
#[derive(Debug, Clone)]
pub struct BoosterParams {
    pub num_rounds: usize,
    pub learning_rate: f64,
    pub growth: GrowthPolicy,
    pub min_data_in_leaf: usize,
    pub min_child_weight: f64,
    pub lambda_l2: f64,
    pub min_split_gain: f64,
    pub max_bin: usize,
    pub feature_fraction: f64,
    pub bagging_fraction: f64,
    /// Rounds without improvement before stopping; 0 disables
    pub early_stopping_rounds: usize,
    /// Log the evaluation metric every this many rounds; 0 disables
    pub log_period: usize,
    pub eval_metric: EvalMetric,
    pub seed: u64,
    pub device: Device,
}

impl BoosterParams {
    /// Leaf-wise preset used by the k-fold baseline
    pub fn lightgbm_baseline(seed: u64, device: Device) -> Self {
        Self {
            num_rounds: 1000,
            learning_rate: 0.05,
            growth: GrowthPolicy::LeafWise {
                num_leaves: 31,
                max_depth: None,
            },
            min_data_in_leaf: 20,
            min_child_weight: 1e-3,
            lambda_l2: 0.0,
            min_split_gain: 0.0,
            max_bin: 255,
            feature_fraction: 1.0,
            bagging_fraction: 1.0,
            early_stopping_rounds: 50,
            log_period: 50,
            eval_metric: EvalMetric::Auc,
            seed,
            device,
        }
    }

    /// Depth-wise preset used by the parameterized trainer
    pub fn xgboost(seed: u64) -> Self {
        Self {
            num_rounds: 100,
            learning_rate: 0.3,
            growth: GrowthPolicy::DepthWise { max_depth: 6 },
            min_data_in_leaf: 1,
            min_child_weight: 1.0,
            lambda_l2: 1.0,
            min_split_gain: 0.0,
            max_bin: 256,
            feature_fraction: 1.0,
            bagging_fraction: 1.0,
            early_stopping_rounds: 10,
            log_period: 10,
            eval_metric: EvalMetric::Auc,
            seed,
            device: Device::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StarterError::InvalidConfiguration(msg));

        if self.num_rounds == 0 {
            return invalid("num_rounds must be positive".into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        for (name, value) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }
        if self.max_bin < 2 {
            return invalid(format!("max_bin must be at least 2, got {}", self.max_bin));
        }
        if self.lambda_l2 < 0.0 || self.min_child_weight < 0.0 {
            return invalid("lambda_l2 and min_child_weight must be non-negative".into());
        }
        match self.growth {
            GrowthPolicy::LeafWise { num_leaves, .. } if num_leaves < 2 => {
                invalid(format!("num_leaves must be at least 2, got {num_leaves}"))
            }
            GrowthPolicy::LeafWise {
                max_depth: Some(0), ..
            }
            | GrowthPolicy::DepthWise { max_depth: 0 } => invalid("max_depth must be positive".into()),
            _ => Ok(()),
        }
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            growth: self.growth,
            min_data_in_leaf: self.min_data_in_leaf,
            min_child_weight: self.min_child_weight,
            lambda_l2: self.lambda_l2,
            min_split_gain: self.min_split_gain,
            learning_rate: self.learning_rate,
        }
    }
}

/// Held-out rows watched during training
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub x: &'a FeatureMatrix,
    pub y: &'a Labels,
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: BoosterParams,
}

impl GbdtTrainer {
    pub fn new(params: BoosterParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Fit on `x`/`y`. With an evaluation set and early stopping enabled the
    /// returned model is cut back to its best iteration.
    pub fn train(&self, x: &FeatureMatrix, y: &Labels, eval: Option<EvalSet<'_>>) -> Result<Model> {
        let n = x.n_rows();
        if n != y.len() {
            return Err(StarterError::SchemaMismatch(format!(
                "{} feature rows but {} labels",
                n,
                y.len()
            )));
        }
        if n == 0 {
            return Err(StarterError::Training("empty training set".into()));
        }
        if let Some(ev) = eval {
            x.ensure_same_features(ev.x)?;
            if ev.x.n_rows() != ev.y.len() {
                return Err(StarterError::SchemaMismatch(format!(
                    "{} evaluation rows but {} labels",
                    ev.x.n_rows(),
                    ev.y.len()
                )));
            }
        }

        let params = &self.params;
        let device = params.device.resolve(capabilities());
        let labels = y.as_slice();
        let base_score = initial_margin(labels);

        let binned = BinnedMatrix::from_features(x, params.max_bin);
        let tree_config = params.tree_config();
        let builder = HistogramTreeBuilder::new(&binned, &tree_config, device);

        let metric = params.eval_metric.metric();
        let patience = if eval.is_some() {
            params.early_stopping_rounds
        } else {
            0
        };
        let mut early_stopping = EarlyStopping::new(patience, metric.higher_is_better());
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut train_margin = vec![base_score; n];
        let mut eval_margin = eval.map(|ev| vec![base_score; ev.x.n_rows()]);
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.num_rounds);

        debug!(
            rows = n,
            features = x.n_features(),
            rounds = params.num_rounds,
            %device,
            "starting boosting"
        );

        for round in 0..params.num_rounds {
            for i in 0..n {
                let p = sigmoid(train_margin[i]);
                grad[i] = p - labels[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let rows = self.sample_rows(n, &mut rng);
            let features = self.sample_features(x.n_features(), &mut rng);
            let tree = builder.build(&grad, &hess, rows, &features);

            for (row, margin) in train_margin.iter_mut().enumerate() {
                *margin += tree_output(&tree, x, row);
            }

            let score = match (eval, eval_margin.as_mut()) {
                (Some(ev), Some(margin)) => {
                    for (row, m) in margin.iter_mut().enumerate() {
                        *m += tree_output(&tree, ev.x, row);
                    }
                    let probs: Vec<f64> = margin.iter().map(|&m| sigmoid(m)).collect();
                    Some(metric.compute(&probs, ev.y.as_slice()))
                }
                _ => None,
            };

            trees.push(tree);

            let Some(score) = score else {
                continue;
            };

            if params.log_period > 0 && (round + 1) % params.log_period == 0 {
                info!("[{}]\tvalid's {}: {:.6}", round + 1, metric.name(), score);
            }

            if early_stopping.update(score) == EarlyStopAction::Stop {
                info!(
                    "Early stopping, best iteration is: [{}]\tvalid's {}: {:.6}",
                    early_stopping.best_round() + 1,
                    metric.name(),
                    early_stopping.best_value().unwrap_or(f64::NAN)
                );
                break;
            }
        }

        let mut model = Model::new(Objective::Binary, base_score, trees, x.names().to_vec());
        if early_stopping.is_enabled() && early_stopping.best_value().is_some() {
            let best = early_stopping.best_round();
            model.truncate(best + 1);
            model.best_iteration = Some(best);
        }
        model.validate()?;

        debug!(trees = model.num_trees(), best_iteration = ?model.best_iteration, "boosting finished");
        Ok(model)
    }

    fn sample_rows(&self, n: usize, rng: &mut StdRng) -> Vec<usize> {
        let fraction = self.params.bagging_fraction;
        if fraction >= 1.0 {
            return (0..n).collect();
        }
        let rows: Vec<usize> = (0..n).filter(|_| rng.gen::<f64>() < fraction).collect();
        if rows.is_empty() {
            (0..n).collect()
        } else {
            rows
        }
    }

    fn sample_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        let fraction = self.params.feature_fraction;
        if fraction >= 1.0 || n_features == 0 {
            return features;
        }
        let keep = ((n_features as f64 * fraction).ceil() as usize).clamp(1, n_features);
        features.shuffle(rng);
        features.truncate(keep);
        features.sort_unstable();
        features
    }
}

/// Log-odds of the positive rate
fn initial_margin(labels: &[f64]) -> f64 {
    let rate = labels.iter().sum::<f64>() / labels.len().max(1) as f64;
    let rate = rate.clamp(BASE_RATE_CLAMP, 1.0 - BASE_RATE_CLAMP);
    (rate / (1.0 - rate)).ln()
}

/// `Tree::evaluate` reading straight from a column-major matrix
fn tree_output(tree: &Tree, x: &FeatureMatrix, row: usize) -> f64 {
    let mut idx = 0usize;
    loop {
        let Some(node) = tree.nodes.get(idx) else {
            return 0.0;
        };
        if node.is_leaf() {
            return node.leaf.unwrap_or(0.0);
        }
        let value = x.column(node.feature_idx as usize)[row];
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

/// Positive-class probabilities of every row of `x`
pub fn predict_proba(model: &Model, x: &FeatureMatrix) -> Result<Vec<f64>> {
    if model.feature_names != x.names() {
        return Err(StarterError::SchemaMismatch(format!(
            "model expects features {:?}, got {:?}",
            model.feature_names,
            x.names()
        )));
    }

    let mut row = Vec::with_capacity(x.n_features());
    Ok((0..x.n_rows())
        .map(|i| {
            x.fill_row(i, &mut row);
            model.predict_proba_row(&row)
        })
        .collect())
}
