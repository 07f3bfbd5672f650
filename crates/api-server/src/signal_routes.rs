use analysis_core::{AnalysisError, TradeSignal};
use axum::{extract::State, routing::post, Json, Router};
use chrono::Duration;
use news_trading::{sentiment_impact, trade_signal};
use sentiment_analysis::fetch_news_or_empty;
use serde::{Deserialize, Serialize};
use technical_analysis::{latest_indicators, IndicatorRow};

use crate::{ApiResponse, AppError, AppState};

/// Calendar days of price history behind the indicator snapshot
const INDICATOR_LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
pub struct IndicatorRequest {
    pub company: String,
    pub ticker: String,
    #[serde(default)]
    pub owned_stock: bool,
}

#[derive(Serialize)]
pub struct IndicatorResponse {
    pub company: String,
    pub ticker: String,
    pub impact: f64,
    pub sentiment_score: f64,
    pub trade_signal: &'static str,
    pub signal: TradeSignal,
    pub indicators: IndicatorRow,
}

pub fn signal_routes() -> Router<AppState> {
    Router::new().route("/api/indicator", post(indicator))
}

async fn indicator(
    State(state): State<AppState>,
    Json(req): Json<IndicatorRequest>,
) -> Result<Json<ApiResponse<IndicatorResponse>>, AppError> {
    let company = req.company.trim().to_string();
    let ticker = req.ticker.trim().to_uppercase();
    if company.is_empty() || ticker.is_empty() {
        return Err(AnalysisError::Configuration("company and ticker are required".to_string()).into());
    }

    let news = fetch_news_or_empty(state.news.as_ref(), &company, state.upstream_timeout).await;
    let sentiment = state
        .scorer
        .with_mode(state.forecast_sentiment_mode)
        .score_news(&news)
        .await
        .aggregate;

    let today = state.today();
    let bars = state
        .fetch_bars(&ticker, today - Duration::days(INDICATOR_LOOKBACK_DAYS), today)
        .await?;

    let row = latest_indicators(&bars).ok_or_else(|| {
        AnalysisError::InsufficientData(format!(
            "{} bars for {} are too few to derive indicators",
            bars.len(),
            ticker
        ))
    })?;

    let signal = trade_signal(sentiment, row.rsi_14, req.owned_stock);
    tracing::info!(
        "{} ({}): sentiment {:.4}, RSI {:.2}, owned {} -> {}",
        company,
        ticker,
        sentiment,
        row.rsi_14,
        req.owned_stock,
        signal.to_label()
    );

    Ok(Json(ApiResponse::ok(IndicatorResponse {
        company,
        ticker,
        impact: sentiment_impact(sentiment),
        sentiment_score: sentiment,
        trade_signal: signal.to_label(),
        signal,
        indicators: row,
    })))
}
