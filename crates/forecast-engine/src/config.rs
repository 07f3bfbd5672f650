use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use technical_analysis::FillPolicy;

use crate::split::{ChronologicalSplit, RandomSplit, SplitStrategy};

pub const DEFAULT_HORIZON: usize = 7;
pub const DEFAULT_MIN_TRAINING_ROWS: usize = 25;
pub const DEFAULT_TEST_RATIO: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_RIDGE_LAMBDA: f64 = 1e-3;

/// Weight of the post-hoc sentiment nudge: `adjusted = raw * (1 + s * 0.1)`
pub const SENTIMENT_ADJUSTMENT: f64 = 0.1;

/// Columns fed to the regression model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// open, high, low, close, volume, sentiment
    #[default]
    Basic,
    /// Basic plus moving averages, RSI, MACD/signal, Bollinger bands and volume MA
    WithIndicators,
}

impl std::str::FromStr for FeatureSet {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(FeatureSet::Basic),
            "indicators" | "with_indicators" => Ok(FeatureSet::WithIndicators),
            other => Err(AnalysisError::Configuration(format!(
                "unknown feature set '{}', expected basic or indicators",
                other
            ))),
        }
    }
}

/// Train/test partitioning scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    /// Oldest rows train, newest rows test
    #[default]
    Chronological,
    /// Seeded shuffle. Test rows then sit between training rows in time, so
    /// the reported metrics are optimistic for real forecasting.
    Random,
}

impl std::str::FromStr for SplitKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chronological" | "time" => Ok(SplitKind::Chronological),
            "random" => Ok(SplitKind::Random),
            other => Err(AnalysisError::Configuration(format!(
                "unknown split strategy '{}', expected chronological or random",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Trading days to predict
    pub horizon: usize,
    /// Training rows required on top of the horizon
    pub min_training_rows: usize,
    pub feature_set: FeatureSet,
    /// Applies to indicator columns when `feature_set` is `WithIndicators`
    pub fill_policy: FillPolicy,
    pub split: SplitKind,
    pub test_ratio: f64,
    pub seed: u64,
    /// Ridge penalty of the kernel regression
    pub ridge_lambda: f64,
    /// RBF width; `None` means `1 / n_features`
    pub gamma: Option<f64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            min_training_rows: DEFAULT_MIN_TRAINING_ROWS,
            feature_set: FeatureSet::default(),
            fill_policy: FillPolicy::default(),
            split: SplitKind::default(),
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SEED,
            ridge_lambda: DEFAULT_RIDGE_LAMBDA,
            gamma: None,
        }
    }
}

impl ForecastConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.horizon == 0 {
            return Err(AnalysisError::Configuration(
                "forecast horizon must be at least 1".to_string(),
            ));
        }
        if self.min_training_rows < 2 {
            return Err(AnalysisError::Configuration(
                "min_training_rows must be at least 2".to_string(),
            ));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(AnalysisError::Configuration(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if !(self.ridge_lambda.is_finite() && self.ridge_lambda > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "ridge_lambda must be positive, got {}",
                self.ridge_lambda
            )));
        }
        if let Some(gamma) = self.gamma {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(AnalysisError::Configuration(format!(
                    "gamma must be positive, got {}",
                    gamma
                )));
            }
        }
        Ok(())
    }

    /// Minimum history length for this configuration
    pub fn required_rows(&self) -> usize {
        self.horizon + self.min_training_rows
    }

    pub fn split_strategy(&self) -> Box<dyn SplitStrategy> {
        match self.split {
            SplitKind::Chronological => Box::new(ChronologicalSplit::new(self.test_ratio)),
            SplitKind::Random => Box::new(RandomSplit::new(self.test_ratio, self.seed)),
        }
    }
}
