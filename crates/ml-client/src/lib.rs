pub mod error;
pub mod sentiment;

pub use error::{MLError, MLResult};
pub use sentiment::{SentimentClient, SentimentPrediction, SentimentResponse, MAX_TOKENS};

use std::time::Duration;

/// Configuration for the sentiment classifier service
#[derive(Debug, Clone)]
pub struct MLConfig {
    pub sentiment_url: String,
    pub timeout: Duration,
}

impl MLConfig {
    pub fn client(&self) -> MLResult<SentimentClient> {
        SentimentClient::new(self.sentiment_url.clone(), self.timeout)
    }
}
