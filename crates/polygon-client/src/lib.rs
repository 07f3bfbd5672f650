use analysis_core::{AnalysisError, PriceBar, PriceHistorySource};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
const MAX_ATTEMPTS: u32 = 3;
/// Wait after a 429 that carries no usable `Retry-After`
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Take a slot, waiting for one to free up unless that would run past `deadline`.
    async fn acquire(&self, deadline: Instant) -> Result<(), AnalysisError> {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            let oldest = match ts.front() {
                Some(&oldest) if ts.len() >= self.max_requests => oldest,
                _ => {
                    ts.push_back(now);
                    return Ok(());
                }
            };

            // Wait until the oldest request falls out of the window
            let sleep_dur = (oldest + self.window).saturating_duration_since(now) + Duration::from_millis(50);
            drop(ts);
            if now + sleep_dur > deadline {
                return Err(AnalysisError::UpstreamUnavailable(format!(
                    "Polygon rate limit reached, next slot in {:.1}s",
                    sleep_dur.as_secs_f64()
                )));
            }
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Daily price history from the Polygon aggregates endpoint
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    /// Longest a single call may spend waiting on the limiter and 429 backoff
    retry_budget: Duration,
}

impl PolygonClient {
    /// `rate_limit` is requests per minute (5 on the free tier).
    ///
    /// Half of `timeout` is set aside for rate-limit waits, so a call that the
    /// caller bounds by the same timeout finishes or fails on its own.
    pub fn new(api_key: String, rate_limit: usize, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
            retry_budget: timeout / 2,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a request with rate limiting and bounded 429 retry.
    ///
    /// Waits honour `Retry-After` but never run past the retry budget; a wait
    /// that would is reported as an upstream failure straight away.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(upstream)?;
        let deadline = Instant::now() + self.retry_budget;

        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire(deadline).await?;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::UpstreamUnavailable("cannot clone Polygon request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(upstream)?;

            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt == MAX_ATTEMPTS {
                break;
            }

            let wait = retry_after(&response).unwrap_or(RATE_LIMIT_BACKOFF);
            if Instant::now() + wait > deadline {
                return Err(AnalysisError::UpstreamUnavailable(format!(
                    "rate limited by Polygon, retry in {}s exceeds the request budget",
                    wait.as_secs()
                )));
            }

            tracing::warn!(
                "Polygon 429 rate limited, waiting {:.1}s before retry {}/{}",
                wait.as_secs_f64(),
                attempt,
                MAX_ATTEMPTS - 1
            );
            tokio::time::sleep(wait).await;
        }

        Err(AnalysisError::UpstreamUnavailable(format!(
            "rate limited by Polygon after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Daily bars for `symbol` in `[from, to]`, oldest first
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(AnalysisError::Configuration("ticker symbol is empty".to_string()));
        }
        if from > to {
            return Err(AnalysisError::Configuration(format!(
                "date range start {} is after end {}",
                from, to
            )));
        }

        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            symbol.to_uppercase(),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "Polygon HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response.json().await.map_err(upstream)?;
        let bars = aggregates_to_bars(agg_response.results);

        if bars.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "no price history for {} between {} and {}",
                symbol, from, to
            )));
        }

        tracing::info!("Fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

#[async_trait]
impl PriceHistorySource for PolygonClient {
    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        self.get_daily_bars(symbol, from, to).await
    }
}

/// `Retry-After` in whole seconds, when the server sent one
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn upstream(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::UpstreamUnavailable("Polygon request timed out".to_string())
    } else {
        AnalysisError::UpstreamUnavailable(format!("Polygon request failed: {}", e))
    }
}

/// Convert aggregate results into one bar per date, sorted, keeping the last
/// result for a duplicated date and skipping unparseable timestamps.
fn aggregates_to_bars(results: Vec<AggregateResult>) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = results
        .into_iter()
        .filter_map(|r| {
            let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
            Some(PriceBar {
                date,
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();
    bars
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp (ms)
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
}
