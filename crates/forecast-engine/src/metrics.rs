use analysis_core::{round_to, stats};
use serde::{Deserialize, Serialize};

/// Hold-out evaluation of the fitted model. Reporting only.
///
/// A metric that cannot be computed (zero-variance targets for R², all-zero
/// actuals for MAPE, non-finite intermediate) is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    /// Percent
    pub mape: Option<f64>,
    /// Share of test rows where the predicted move (up or not) matched the actual one
    pub direction_accuracy: Option<f64>,
    pub test_rows: usize,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl EvaluationMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self::default();
        }
        let actual = &actual[..n];
        let predicted = &predicted[..n];

        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mse = finite(errors.iter().map(|e| e * e).sum::<f64>() / n as f64);
        let rmse = mse.and_then(|m| finite(m.sqrt()));
        let mae = finite(errors.iter().map(|e| e.abs()).sum::<f64>() / n as f64);

        let mean_actual = stats::mean(actual);
        let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let r2 = stats::checked_div(ss_res, ss_tot).and_then(|ratio| finite(1.0 - ratio));

        let ape: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter_map(|(a, e)| stats::checked_div(e.abs(), a.abs()))
            .collect();
        let mape = if ape.is_empty() {
            None
        } else {
            finite(stats::mean(&ape) * 100.0)
        };

        Self {
            mse,
            rmse,
            mae,
            r2,
            mape,
            direction_accuracy: None,
            test_rows: n,
        }
    }

    /// Attach directional accuracy measured against each row's own close.
    pub fn with_direction(mut self, base: &[f64], actual: &[f64], predicted: &[f64]) -> Self {
        self.direction_accuracy = direction_accuracy(base, actual, predicted);
        self
    }

    /// Same metrics rounded to 4 places for display
    pub fn rounded(&self) -> Self {
        let r = |v: Option<f64>| v.map(|x| round_to(x, 4));
        Self {
            mse: r(self.mse),
            rmse: r(self.rmse),
            mae: r(self.mae),
            r2: r(self.r2),
            mape: r(self.mape),
            direction_accuracy: r(self.direction_accuracy),
            test_rows: self.test_rows,
        }
    }
}

/// Fraction of rows where `predicted > base` agrees with `actual > base`.
///
/// A move counts as up only when strictly above the base close, so flat and
/// down share a class.
pub fn direction_accuracy(base: &[f64], actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = base.len().min(actual.len()).min(predicted.len());
    if n == 0 {
        return None;
    }
    let hits = (0..n)
        .filter(|&i| (actual[i] > base[i]) == (predicted[i] > base[i]))
        .count();
    finite(hits as f64 / n as f64)
}
