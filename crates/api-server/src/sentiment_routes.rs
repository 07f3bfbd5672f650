//! News-impact route: sentiment of a company's latest news and a reason per article.

use analysis_core::AnalysisError;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use sentiment_analysis::{fetch_news_or_empty, NewsImpact};
use serde::Serialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Serialize)]
pub struct NewsImpactResponse {
    pub company: String,
    pub articles: usize,
    #[serde(flatten)]
    pub impact: NewsImpact,
}

pub fn sentiment_routes() -> Router<AppState> {
    Router::new().route("/api/news-impact/:company", get(news_impact))
}

async fn news_impact(
    State(state): State<AppState>,
    Path(company): Path<String>,
) -> Result<Json<ApiResponse<NewsImpactResponse>>, AppError> {
    let company = company.trim().to_string();
    if company.is_empty() {
        return Err(AnalysisError::Configuration("company name is empty".to_string()).into());
    }

    let news = fetch_news_or_empty(state.news.as_ref(), &company, state.upstream_timeout).await;
    let scorer = state.scorer.with_mode(state.news_impact_sentiment_mode);
    let impact = scorer.assess(&news).await;

    tracing::info!(
        "News impact for {}: {} articles, impact {}",
        company,
        news.len(),
        impact.impact
    );

    Ok(Json(ApiResponse::ok(NewsImpactResponse {
        company,
        articles: news.len(),
        impact,
    })))
}
