use analysis_core::AnalysisError;
use nalgebra::{DMatrix, DVector};

/// Kernel ridge regression with an RBF kernel `exp(-gamma * |a - b|^2)`.
///
/// Targets are centred on their training mean, so a flat series is reproduced
/// exactly. Solves `(K + lambda I) alpha = y - mean` by Cholesky.
#[derive(Debug, Clone)]
pub struct KernelRidge {
    gamma: f64,
    support: Vec<Vec<f64>>,
    alpha: DVector<f64>,
    intercept: f64,
}

fn rbf(gamma: f64, a: &[f64], b: &[f64]) -> f64 {
    let dist2: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * dist2).exp()
}

impl KernelRidge {
    pub fn fit(x: &[Vec<f64>], y: &[f64], gamma: f64, lambda: f64) -> Result<Self, AnalysisError> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(AnalysisError::InsufficientData(format!(
                "kernel regression needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) || x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalysisError::NumericDegenerate(
                "training data contains non-finite values".to_string(),
            ));
        }

        let intercept = y.iter().sum::<f64>() / n as f64;
        let centred = DVector::from_iterator(n, y.iter().map(|v| v - intercept));

        let gram = DMatrix::from_fn(n, n, |i, j| rbf(gamma, &x[i], &x[j]))
            + DMatrix::<f64>::identity(n, n) * lambda;

        let cholesky = gram.cholesky().ok_or_else(|| {
            AnalysisError::NumericDegenerate("kernel matrix is not positive definite".to_string())
        })?;
        let alpha = cholesky.solve(&centred);

        if alpha.iter().any(|a| !a.is_finite()) {
            return Err(AnalysisError::NumericDegenerate(
                "kernel regression produced non-finite weights".to_string(),
            ));
        }

        Ok(Self {
            gamma,
            support: x.to_vec(),
            alpha,
            intercept,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let weighted: f64 = self
            .support
            .iter()
            .zip(self.alpha.iter())
            .map(|(s, a)| a * rbf(self.gamma, s, row))
            .sum();
        self.intercept + weighted
    }

    pub fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_targets_predict_flat() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 / 10.0, 0.0]).collect();
        let y = vec![100.0; 10];
        let model = KernelRidge::fit(&x, &y, 0.5, 1e-3).unwrap();

        assert!((model.predict(&[0.35, 0.0]) - 100.0).abs() < 1e-9);
        assert!((model.predict(&[5.0, 5.0]) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_fits_training_points_closely() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| r[0].sin()).collect();
        let model = KernelRidge::fit(&x, &y, 1.0, 1e-6).unwrap();

        for (row, target) in x.iter().zip(&y) {
            assert!((model.predict(row) - target).abs() < 1e-3);
        }
    }

    #[test]
    fn test_far_point_falls_back_to_mean() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![10.0, 20.0];
        let model = KernelRidge::fit(&x, &y, 1.0, 1e-3).unwrap();

        assert!((model.predict(&[1000.0]) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(KernelRidge::fit(&[], &[], 1.0, 1e-3).is_err());
        assert!(matches!(
            KernelRidge::fit(&[vec![f64::NAN]], &[1.0], 1.0, 1e-3),
            Err(AnalysisError::NumericDegenerate(_))
        ));
    }
}
