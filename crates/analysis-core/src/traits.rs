use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, ClassifierOutput, NewsItem, PriceBar};

/// Source of daily OHLCV history
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Daily bars for `symbol` between `from` and `to` inclusive, oldest first.
    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError>;
}

/// Source of news about a company.
///
/// Callers treat an error and an empty list the same way: as "no news".
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_news(&self, company: &str) -> Result<Vec<NewsItem>, AnalysisError>;
}

/// Three-class text classifier (negative / neutral / positive).
///
/// Implementations are constructed once and passed in; they hold no per-request state.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifierOutput, AnalysisError>;

    fn backend_name(&self) -> &'static str;
}
