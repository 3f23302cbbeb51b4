use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::ArrayView2;
use smartcore::linalg::basic::matrix::DenseMatrix;

/// Per-feature standardisation: `z = (x - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    /// Mean 0, std 1 for every column; leaves rows unchanged.
    pub fn identity(n_features: usize) -> Self {
        Self {
            means: vec![0.0; n_features],
            stds: vec![1.0; n_features],
        }
    }

    /// Fits on `rows` (population std). Constant columns get std 1.0 so they map to 0.
    pub fn fit(rows: &[Vec<f64>], n_features: usize) -> Self {
        let padded: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                (0..n_features)
                    .map(|j| row.get(j).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let Ok(matrix) = DenseMatrix::from_2d_vec(&padded) else {
            // No rows or no columns.
            return Self::identity(n_features);
        };

        let means = matrix.mean_by(0);
        // The variance is taken as E[x^2] - mean^2, so constant columns can come back
        // with a tiny non-zero std (or NaN); treat those as constant too.
        let stds = matrix
            .std_dev(0)
            .into_iter()
            .zip(&means)
            .map(|(sd, mean)| if sd > 1e-8 * (1.0 + mean.abs()) { sd } else { 1.0 })
            .collect();
        Self { means, stds }
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        self.means
            .iter()
            .zip(&self.stds)
            .enumerate()
            .map(|(j, (mean, std))| (row.get(j).copied().unwrap_or(0.0) - mean) / std)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}
