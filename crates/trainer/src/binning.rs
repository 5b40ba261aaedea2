//! Quantile binning of training features
//!
//! Each feature gets up to `max_bin` bins over its non-missing values. Bin `i`
//! holds values `<= upper[i]`; the last bin's bound is `+inf`. Missing values
//! get one extra bin past the last regular one.

use crate::dataset::FeatureMatrix;

/// Bin boundaries of one feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBins {
    upper: Vec<f64>,
}

impl FeatureBins {
    /// Boundaries from raw values (NaN ignored)
    pub fn from_values(values: &[f64], max_bin: usize) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        let mut distinct = sorted.clone();
        distinct.dedup();

        let mut upper: Vec<f64> = if distinct.len() <= max_bin {
            distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect()
        } else {
            let n = sorted.len();
            let mut cuts: Vec<f64> = (1..max_bin).map(|b| sorted[b * n / max_bin]).collect();
            cuts.dedup();
            // a cut equal to the maximum would leave the last bin empty
            if cuts.last() == sorted.last() {
                cuts.pop();
            }
            cuts
        };

        upper.push(f64::INFINITY);
        Self { upper }
    }

    /// Number of regular (non-missing) bins
    pub fn n_bins(&self) -> usize {
        self.upper.len()
    }

    /// Index of the missing-value bin
    pub fn missing_bin(&self) -> usize {
        self.upper.len()
    }

    pub fn bin(&self, value: f64) -> usize {
        if value.is_nan() {
            return self.missing_bin();
        }
        self.upper.partition_point(|&u| u < value)
    }

    /// Split threshold for "bins `0..=bin` go left"
    pub fn threshold(&self, bin: usize) -> f64 {
        self.upper[bin]
    }
}

/// Training features mapped to bin indices (column-major)
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<Vec<u16>>,
    cuts: Vec<FeatureBins>,
    n_rows: usize,
}

impl BinnedMatrix {
    pub fn from_features(x: &FeatureMatrix, max_bin: usize) -> Self {
        let max_bin = max_bin.clamp(2, u16::MAX as usize - 1);

        let (cuts, bins): (Vec<FeatureBins>, Vec<Vec<u16>>) = (0..x.n_features())
            .map(|f| {
                let column = x.column(f);
                let cut = FeatureBins::from_values(column, max_bin);
                let binned: Vec<u16> = column.iter().map(|&v| cut.bin(v) as u16).collect();
                (cut, binned)
            })
            .unzip();

        Self {
            bins,
            cuts,
            n_rows: x.n_rows(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    pub fn feature_bins(&self, feature: usize) -> &FeatureBins {
        &self.cuts[feature]
    }

    pub fn column(&self, feature: usize) -> &[u16] {
        &self.bins[feature]
    }
}
