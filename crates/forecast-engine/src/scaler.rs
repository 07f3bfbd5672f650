use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Per-column standardisation `(x - mean) / std`, fitted on training rows only.
///
/// Uses the population standard deviation. A constant column keeps a scale of
/// 1.0 so it maps to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, AnalysisError> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| AnalysisError::InsufficientData("cannot fit scaler on zero rows".to_string()))?;

        if rows.iter().any(|r| r.len() != width) {
            return Err(AnalysisError::InvalidData("feature rows differ in width".to_string()));
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let mean = column.iter().mean();
            let std = column.iter().population_std_dev();

            if !mean.is_finite() || std.is_nan() {
                return Err(AnalysisError::NumericDegenerate(format!(
                    "feature column {} is not finite",
                    col
                )));
            }

            means.push(mean);
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }

        Ok(Self { means, scales })
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
