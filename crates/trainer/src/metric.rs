//! Evaluation metrics for binary classifiers.

/// A metric for evaluating model quality.
///
/// Metrics are separate from the training objective: the booster optimizes
/// log-loss but early stopping and reporting use AUC.
pub trait Metric: Send + Sync {
    /// Compute the metric from predictions and 0/1 labels
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64;

    /// Whether higher values indicate better performance
    fn higher_is_better(&self) -> bool;

    /// Name of the metric (for logging)
    fn name(&self) -> &'static str;
}

/// Area Under the ROC Curve.
///
/// Rank-based Mann-Whitney statistic with average ranks for tied scores.
/// Returns 0.5 when either class is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auc;

impl Metric for Auc {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        debug_assert_eq!(preds.len(), labels.len());

        let n_pos = labels.iter().filter(|&&l| l > 0.5).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return 0.5;
        }

        let mut order: Vec<usize> = (0..preds.len()).collect();
        order.sort_by(|&a, &b| preds[a].total_cmp(&preds[b]));

        let mut pos_rank_sum = 0.0f64;
        let mut start = 0usize;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && preds[order[end]] == preds[order[start]] {
                end += 1;
            }
            // ranks are 1-based; tied block shares the mean rank
            let avg_rank = (start + 1 + end) as f64 / 2.0;
            let positives = order[start..end].iter().filter(|&&i| labels[i] > 0.5).count();
            pos_rank_sum += avg_rank * positives as f64;
            start = end;
        }

        let n_pos = n_pos as f64;
        let n_neg = n_neg as f64;
        (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "auc"
    }
}

/// Binary cross-entropy: -mean(y*log(p) + (1-y)*log(1-p))
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLoss;

impl Metric for LogLoss {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        debug_assert_eq!(preds.len(), labels.len());

        if preds.is_empty() {
            return 0.0;
        }

        const EPS: f64 = 1e-15;
        preds
            .iter()
            .zip(labels)
            .map(|(&p, &y)| {
                let p = p.clamp(EPS, 1.0 - EPS);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / preds.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "binary_logloss"
    }
}

/// AUC of `preds` against 0/1 `labels`
pub fn roc_auc_score(labels: &[f64], preds: &[f64]) -> f64 {
    Auc.compute(preds, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_perfect() {
        let preds = vec![0.1, 0.2, 0.8, 0.9];
        let labels = vec![0.0, 0.0, 1.0, 1.0];
        assert!((roc_auc_score(&labels, &preds) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn auc_worst() {
        let preds = vec![0.9, 0.8, 0.2, 0.1];
        let labels = vec![0.0, 0.0, 1.0, 1.0];
        assert!(roc_auc_score(&labels, &preds).abs() < 1e-12);
    }

    #[test]
    fn auc_all_tied_is_half() {
        let preds = vec![0.5; 6];
        let labels = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        assert!((roc_auc_score(&labels, &preds) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn auc_matches_pair_counting() {
        let preds = vec![0.3, 0.7, 0.7, 0.2, 0.9, 0.3, 0.5];
        let labels = vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let mut concordant = 0.0;
        let mut pairs = 0.0;
        for (pp, lp) in preds.iter().zip(&labels) {
            for (pn, ln) in preds.iter().zip(&labels) {
                if *lp == 1.0 && *ln == 0.0 {
                    pairs += 1.0;
                    if pp > pn {
                        concordant += 1.0;
                    } else if pp == pn {
                        concordant += 0.5;
                    }
                }
            }
        }

        assert!((roc_auc_score(&labels, &preds) - concordant / pairs).abs() < 1e-12);
    }

    #[test]
    fn auc_single_class() {
        assert_eq!(roc_auc_score(&[1.0, 1.0], &[0.2, 0.4]), 0.5);
        assert_eq!(roc_auc_score(&[], &[]), 0.5);
    }

    #[test]
    fn logloss_behaviour() {
        let good = LogLoss.compute(&[0.9, 0.1], &[1.0, 0.0]);
        let bad = LogLoss.compute(&[0.1, 0.9], &[1.0, 0.0]);
        assert!(good < bad);
        assert!(LogLoss.compute(&[0.0], &[1.0]).is_finite());
    }

    #[test]
    fn metric_directions_and_names() {
        assert!(Auc.higher_is_better());
        assert!(!LogLoss.higher_is_better());
        assert_eq!(Auc.name(), "auc");
        assert_eq!(LogLoss.name(), "binary_logloss");
    }
}
