use analysis_core::{AnalysisError, NewsSource, PriceBar, PriceHistorySource, SentimentClassifier};
use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use forecast_engine::ForecastConfig;
use market_calendar::HolidayCalendar;
use news_trading::NewsDataClient;
use polygon_client::PolygonClient;
use sentiment_analysis::{FinbertClassifier, LexiconClassifier, ScoringMode, SentimentScorer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
mod forecast_routes;
mod sentiment_routes;
mod signal_routes;

pub use config::{AppConfig, SentimentBackend};

/// Envelope for every JSON response
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error returned by a handler, rendered as `ApiResponse` with `success: false`
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self {
            status,
            kind: "internal",
            error,
        }
    }
}

fn status_for(e: &AnalysisError) -> StatusCode {
    match e {
        AnalysisError::Configuration(_) | AnalysisError::InvalidData(_) => StatusCode::BAD_REQUEST,
        AnalysisError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::NumericDegenerate(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        Self {
            status: status_for(&e),
            kind: e.kind(),
            error: e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} [{}]: {:#}", self.status, self.kind, self.error);
        } else {
            tracing::warn!("{} [{}]: {:#}", self.status, self.kind, self.error);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(format!("{:#}", self.error)),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Shared handles; collaborators are built once at startup and injected
#[derive(Clone)]
pub struct AppState {
    pub prices: Arc<dyn PriceHistorySource>,
    pub news: Arc<dyn NewsSource>,
    pub scorer: Arc<SentimentScorer>,
    pub forecast: ForecastConfig,
    pub holidays: HolidayCalendar,
    pub forecast_sentiment_mode: ScoringMode,
    pub news_impact_sentiment_mode: ScoringMode,
    pub upstream_timeout: Duration,
    /// Source of "today" for labelling predictions
    pub today: Arc<dyn Fn() -> NaiveDate + Send + Sync>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let prices = PolygonClient::new(
            config.polygon_api_key.clone(),
            config.polygon_rate_limit,
            config.upstream_timeout,
        )?;

        let news = NewsDataClient::new(
            config.news_api_key.clone(),
            config.news_country.clone(),
            config.news_language.clone(),
            config.upstream_timeout,
        )?;

        let classifier: Arc<dyn SentimentClassifier> = match config.sentiment_backend {
            SentimentBackend::Finbert => Arc::new(FinbertClassifier::new(config.ml_config().client()?)),
            SentimentBackend::Lexicon => Arc::new(LexiconClassifier::new()),
        };

        Ok(Self {
            prices: Arc::new(prices),
            news: Arc::new(news),
            scorer: Arc::new(SentimentScorer::new(classifier, config.forecast_sentiment_mode)),
            forecast: config.forecast.clone(),
            holidays: config.holidays.clone(),
            forecast_sentiment_mode: config.forecast_sentiment_mode,
            news_impact_sentiment_mode: config.news_impact_sentiment_mode,
            upstream_timeout: config.upstream_timeout,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        })
    }

    pub(crate) fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Price history bounded by the upstream timeout
    pub(crate) async fn fetch_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        match tokio::time::timeout(self.upstream_timeout, self.prices.daily_bars(symbol, from, to)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::UpstreamUnavailable(format!(
                "price source timed out after {}s",
                self.upstream_timeout.as_secs()
            ))),
        }
    }
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("ok"))
}

/// All routes, without middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(forecast_routes::forecast_routes())
        .merge(sentiment_routes::sentiment_routes())
        .merge(signal_routes::signal_routes())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Initialise tracing: `RUST_LOG` filter (default `info`), JSON when `RUST_LOG_FORMAT=json`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting StockPulse API server");
    tracing::info!("  Sentiment backend: {:?}", config.sentiment_backend);
    tracing::info!(
        "  Forecast: {:?} split, {:?} features, {:?} indicator fill",
        config.forecast.split,
        config.forecast.feature_set,
        config.forecast.fill_policy
    );
    tracing::info!("  Upstream timeout: {}s", config.upstream_timeout.as_secs());
    tracing::info!("  Market holidays: {}", config.holidays.len());

    if config.polygon_api_key.is_empty() {
        tracing::warn!("POLYGON_API_KEY is not set, price requests will fail");
    }
    if config.news_api_key.is_empty() {
        tracing::warn!("NEWS_API_KEY is not set, sentiment will be neutral");
    }

    if config.sentiment_backend == SentimentBackend::Finbert {
        let sentiment_client = config.ml_config().client()?;
        match sentiment_client.health().await {
            Ok(true) => tracing::info!("  Sentiment service reachable at {}", sentiment_client.base_url()),
            Ok(false) | Err(_) => tracing::warn!(
                "Sentiment service at {} is not healthy, news will score as neutral until it is",
                sentiment_client.base_url()
            ),
        }
    }

    let state = AppState::from_config(&config)?;
    tracing::info!("  Classifier: {}", state.scorer.backend_name());
    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.allowed_origins)),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use analysis_core::{ClassifierOutput, NewsItem, SentimentLabel};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub struct StubPrices {
        pub bars: Result<Vec<PriceBar>, AnalysisError>,
    }

    #[async_trait]
    impl PriceHistorySource for StubPrices {
        async fn daily_bars(
            &self,
            _symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<PriceBar>, AnalysisError> {
            self.bars.clone()
        }
    }

    pub struct StubNews {
        pub items: Result<Vec<NewsItem>, AnalysisError>,
    }

    #[async_trait]
    impl NewsSource for StubNews {
        async fn fetch_news(&self, _company: &str) -> Result<Vec<NewsItem>, AnalysisError> {
            self.items.clone()
        }
    }

    /// Positive with confidence 0.8 for every text
    pub struct ConfidentPositive;

    #[async_trait]
    impl SentimentClassifier for ConfidentPositive {
        async fn classify(&self, _text: &str) -> Result<ClassifierOutput, AnalysisError> {
            Ok(ClassifierOutput::Label {
                label: SentimentLabel::Positive,
                confidence: 0.8,
            })
        }

        fn backend_name(&self) -> &'static str {
            "stub"
        }
    }

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// `n` flat bars at close 100 on business days from 2025-01-02
    pub fn flat_bars(n: usize) -> Vec<PriceBar> {
        HolidayCalendar::default_2025()
            .next_business_days(d(2025, 1, 2), n)
            .into_iter()
            .map(|date| PriceBar {
                date,
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1_000.0,
            })
            .collect()
    }

    pub fn state(
        bars: Result<Vec<PriceBar>, AnalysisError>,
        news: Result<Vec<NewsItem>, AnalysisError>,
        classifier: Arc<dyn SentimentClassifier>,
    ) -> AppState {
        AppState {
            prices: Arc::new(StubPrices { bars }),
            news: Arc::new(StubNews { items: news }),
            scorer: Arc::new(SentimentScorer::new(classifier, ScoringMode::Label)),
            forecast: ForecastConfig::default(),
            holidays: HolidayCalendar::default_2025(),
            forecast_sentiment_mode: ScoringMode::Label,
            news_impact_sentiment_mode: ScoringMode::Continuous,
            upstream_timeout: Duration::from_secs(1),
            today: Arc::new(|| d(2025, 1, 2)),
        }
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AnalysisError::Configuration("x".into()), StatusCode::BAD_REQUEST),
            (AnalysisError::InvalidData("x".into()), StatusCode::BAD_REQUEST),
            (AnalysisError::InsufficientData("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AnalysisError::UpstreamUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (AnalysisError::NumericDegenerate("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state(Ok(vec![]), Ok(vec![]), Arc::new(LexiconClassifier::new())));
        let (status, body) = send(app, test_support::get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "ok");
    }

    #[test]
    fn test_cors_accepts_listed_and_wildcard_origins() {
        // Both branches build without panicking
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["http://localhost:5173".to_string(), "bad\norigin".to_string()]);
    }
}
