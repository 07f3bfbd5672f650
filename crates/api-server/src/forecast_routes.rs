use analysis_core::{AnalysisError, ForecastPoint};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use forecast_engine::{EvaluationMetrics, FeatureSet, ForecastEngine, PriceDirection};
use sentiment_analysis::fetch_news_or_empty;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

fn default_forecast_out() -> i64 {
    forecast_engine::DEFAULT_HORIZON as i64
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default = "default_forecast_out")]
    pub forecast_out: i64,
}

/// Query form of [`PredictRequest`]; omitted fields take the usual defaults
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub ticker: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub forecast_out: Option<i64>,
}

/// History start when a query names none
const DEFAULT_START_DATE: &str = "2020-01-01";

impl PredictQuery {
    fn into_request(self, today: NaiveDate) -> PredictRequest {
        PredictRequest {
            ticker: self.ticker,
            start_date: self.start_date.unwrap_or_else(|| DEFAULT_START_DATE.to_string()),
            end_date: self
                .end_date
                .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
            forecast_out: self.forecast_out.unwrap_or_else(default_forecast_out),
        }
    }
}

#[derive(Serialize)]
pub struct PredictResponse {
    /// Ticker as requested
    pub name: String,
    /// Historical points then predictions
    pub data: Vec<ForecastPoint>,
    /// Count of historical points at the head of `data`
    pub historical: usize,
    pub sentiment_score: f64,
    pub adjustment_factor: f64,
    pub metrics: EvaluationMetrics,
    pub current_price: f64,
    pub previous_close: Option<f64>,
    pub percent_change: f64,
    pub direction: PriceDirection,
    /// Per prediction, against the close `forecast_out` trading days earlier
    pub directions: Vec<PriceDirection>,
    pub split_strategy: String,
    pub feature_set: FeatureSet,
    pub train_rows: usize,
}

pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict", post(predict))
        .route("/api/predict_stock", get(predict_stock))
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        AnalysisError::Configuration(format!("{} '{}' is not a YYYY-MM-DD date: {}", field, raw, e))
    })
}

/// Checked request, ready to hit upstream sources
struct PredictParams {
    ticker: String,
    start: NaiveDate,
    end: NaiveDate,
    horizon: usize,
}

impl PredictRequest {
    fn validate(&self) -> Result<PredictParams, AnalysisError> {
        let ticker = self.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(AnalysisError::Configuration("ticker is empty".to_string()));
        }

        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if start > end {
            return Err(AnalysisError::Configuration(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }

        if self.forecast_out <= 0 {
            return Err(AnalysisError::Configuration(format!(
                "forecast_out must be positive, got {}",
                self.forecast_out
            )));
        }

        Ok(PredictParams {
            ticker,
            start,
            end,
            horizon: self.forecast_out as usize,
        })
    }
}

/// Company name used for the news query: the ticker without its exchange suffix
fn company_name(ticker: &str) -> &str {
    ticker.split('.').next().unwrap_or(ticker)
}

async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<ApiResponse<PredictResponse>>, AppError> {
    Ok(Json(ApiResponse::ok(run_prediction(&state, req).await?)))
}

async fn predict_stock(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<ApiResponse<PredictResponse>>, AppError> {
    let req = query.into_request(state.today());
    Ok(Json(ApiResponse::ok(run_prediction(&state, req).await?)))
}

async fn run_prediction(state: &AppState, req: PredictRequest) -> Result<PredictResponse, AppError> {
    let params = req.validate()?;
    let engine = ForecastEngine::new(
        state.forecast.clone().with_horizon(params.horizon),
        state.holidays.clone(),
    )?;

    let company = company_name(&params.ticker);
    let news = fetch_news_or_empty(state.news.as_ref(), company, state.upstream_timeout).await;
    let sentiment = state
        .scorer
        .with_mode(state.forecast_sentiment_mode)
        .score_news(&news)
        .await;
    tracing::info!(
        "Sentiment for {}: {:.4} from {} of {} articles",
        company,
        sentiment.aggregate,
        sentiment.items.len(),
        news.len()
    );

    let bars = state.fetch_bars(&params.ticker, params.start, params.end).await?;
    let today = state.today();
    let score = sentiment.aggregate;

    let result = tokio::task::spawn_blocking(move || engine.forecast(&bars, score, today))
        .await
        .map_err(|e| AppError::with_status(StatusCode::INTERNAL_SERVER_ERROR, e.into()))??;

    tracing::info!(
        "Forecast for {}: {} predictions, {} training rows",
        params.ticker,
        params.horizon,
        result.train_rows
    );

    let historical = result.historical().count();
    Ok(PredictResponse {
        name: params.ticker,
        historical,
        sentiment_score: result.sentiment_score,
        adjustment_factor: result.adjustment_factor,
        metrics: result.metrics,
        current_price: result.summary.current_price,
        previous_close: result.summary.previous_close,
        percent_change: result.summary.percent_change,
        direction: result.summary.direction,
        directions: result.directions,
        split_strategy: result.split_strategy,
        feature_set: result.feature_set,
        train_rows: result.train_rows,
        data: result.points,
    })
}
