use analysis_core::{round_to, stats, AnalysisError, ForecastPoint, PointKind, PriceBar};
use chrono::NaiveDate;
use market_calendar::HolidayCalendar;
use serde::{Deserialize, Serialize};

use crate::config::{FeatureSet, ForecastConfig, SENTIMENT_ADJUSTMENT};
use crate::features::{build_features, build_targets, feature_names, forward_fill};
use crate::metrics::EvaluationMetrics;
use crate::model::KernelRidge;
use crate::scaler::StandardScaler;
use crate::split::Partition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

impl PriceDirection {
    /// Move from `base` to `price`; moves within a relative 1e-9 count as flat.
    pub fn between(base: f64, price: f64) -> Self {
        let tolerance = base.abs().max(1.0) * 1e-9;
        if price - base > tolerance {
            PriceDirection::Up
        } else if base - price > tolerance {
            PriceDirection::Down
        } else {
            PriceDirection::Flat
        }
    }
}

/// Last close against the one before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub current_price: f64,
    pub previous_close: Option<f64>,
    pub percent_change: f64,
    pub direction: PriceDirection,
}

impl PriceSummary {
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        let current = bars.last()?.close;
        let previous = bars.len().checked_sub(2).map(|i| bars[i].close);

        let percent_change = previous
            .and_then(|prev| stats::checked_div(current - prev, prev))
            .map(|ratio| round_to(ratio * 100.0, 2))
            .unwrap_or(0.0);

        let direction = match previous {
            Some(prev) if current > prev => PriceDirection::Up,
            Some(prev) if current < prev => PriceDirection::Down,
            _ => PriceDirection::Flat,
        };

        Some(Self {
            current_price: current,
            previous_close: previous,
            percent_change,
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Historical points followed by prediction points
    pub points: Vec<ForecastPoint>,
    pub metrics: EvaluationMetrics,
    pub sentiment_score: f64,
    /// `sentiment * 0.1`; predictions were multiplied by `1 + adjustment_factor`
    pub adjustment_factor: f64,
    pub split_strategy: String,
    pub feature_set: FeatureSet,
    pub train_rows: usize,
    pub summary: PriceSummary,
    /// Per prediction, adjusted price against the close `horizon` rows earlier
    pub directions: Vec<PriceDirection>,
}

impl ForecastResult {
    pub fn historical(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.kind == PointKind::Historical)
    }

    pub fn predictions(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.kind == PointKind::Prediction)
    }
}

/// Trains a fresh model per call and projects `horizon` trading days forward.
///
/// Holds configuration only; scaler and model live inside one `forecast` call,
/// so concurrent calls never share fitted state.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: ForecastConfig,
    calendar: HolidayCalendar,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig, calendar: HolidayCalendar) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config, calendar })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    /// Run the pipeline over `bars` (oldest first) with a request-level sentiment score.
    ///
    /// `today` only affects labelling: prediction dates start after the later of
    /// the last bar and `today`.
    pub fn forecast(
        &self,
        bars: &[PriceBar],
        sentiment: f64,
        today: NaiveDate,
    ) -> Result<ForecastResult, AnalysisError> {
        let horizon = self.config.horizon;

        if !sentiment.is_finite() {
            return Err(AnalysisError::NumericDegenerate(format!(
                "sentiment score {} is not finite",
                sentiment
            )));
        }
        if bars.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "price source returned no bars".to_string(),
            ));
        }
        if bars.windows(2).any(|w| w[0].date >= w[1].date) {
            return Err(AnalysisError::InvalidData(
                "price bars must have strictly increasing dates".to_string(),
            ));
        }

        let history = forward_fill(bars);
        let frame = build_features(&history, sentiment, self.config.feature_set, self.config.fill_policy);

        if frame.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "no feature rows left from {} bars after indicator warmup",
                bars.len()
            )));
        }

        let required = self.config.required_rows();
        if frame.len() < required {
            return Err(AnalysisError::InsufficientData(format!(
                "{} usable rows from {} bars, need at least {} (horizon {} + {} training rows)",
                frame.len(),
                bars.len(),
                required,
                horizon,
                self.config.min_training_rows
            )));
        }

        let targets = build_targets(&frame.closes, horizon);

        let strategy = self.config.split_strategy();
        let split = strategy.split(targets.len())?;
        let train = Partition::gather(&split.train, &frame.rows, &targets, &frame.closes);
        let test = Partition::gather(&split.test, &frame.rows, &targets, &frame.closes);

        tracing::debug!(
            "Training on {} rows of [{}]",
            train.len(),
            feature_names(self.config.feature_set).join(", ")
        );

        let scaler = StandardScaler::fit(&train.rows)?;
        let width = scaler.means.len();
        let gamma = self.config.gamma.unwrap_or(1.0 / width as f64);

        let model = KernelRidge::fit(&scaler.transform_all(&train.rows), &train.targets, gamma, self.config.ridge_lambda)?;

        let test_pred = model.predict_all(&scaler.transform_all(&test.rows));
        let metrics = EvaluationMetrics::evaluate(&test.targets, &test_pred)
            .with_direction(&test.closes, &test.targets, &test_pred)
            .rounded();

        tracing::info!(
            "Model evaluation ({} split, {} train / {} test): MSE {:?} | RMSE {:?} | MAE {:?} | MAPE {:?}% | R2 {:?} | direction {:?}",
            strategy.name(),
            train.len(),
            test.len(),
            metrics.mse,
            metrics.rmse,
            metrics.mae,
            metrics.mape,
            metrics.r2,
            metrics.direction_accuracy
        );

        let forecast_start = frame.len() - horizon;
        let raw = model.predict_all(&scaler.transform_all(&frame.rows[forecast_start..]));

        let adjustment_factor = sentiment * SENTIMENT_ADJUSTMENT;
        let adjusted: Vec<f64> = raw.iter().map(|p| p * (1.0 + adjustment_factor)).collect();

        if adjusted.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::NumericDegenerate(
                "model produced a non-finite prediction".to_string(),
            ));
        }

        let directions: Vec<PriceDirection> = frame.closes[forecast_start..]
            .iter()
            .zip(&adjusted)
            .map(|(&base, &price)| PriceDirection::between(base, price))
            .collect();

        let dates = self.prediction_dates(history.last().map(|b| b.date), today)?;

        let mut points: Vec<ForecastPoint> = history
            .iter()
            .map(|b| ForecastPoint::historical(b.date, b.close))
            .collect();
        points.extend(
            dates
                .into_iter()
                .zip(adjusted)
                .map(|(date, price)| ForecastPoint::prediction(date, price)),
        );

        let summary = PriceSummary::from_bars(&history).ok_or_else(|| {
            AnalysisError::InsufficientData("no usable bars after filling gaps".to_string())
        })?;

        Ok(ForecastResult {
            points,
            metrics,
            sentiment_score: sentiment,
            adjustment_factor,
            split_strategy: strategy.name().to_string(),
            feature_set: self.config.feature_set,
            train_rows: train.len(),
            summary,
            directions,
        })
    }

    fn prediction_dates(
        &self,
        last_bar: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, AnalysisError> {
        let anchor = last_bar.map_or(today, |last| last.max(today));
        let start = anchor
            .succ_opt()
            .ok_or_else(|| AnalysisError::InvalidData(format!("no date follows {}", anchor)))?;
        Ok(self.calendar.next_business_days(start, self.config.horizon))
    }
}
