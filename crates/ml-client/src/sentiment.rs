use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{MLError, MLResult};

/// Token budget of the classifier; longer inputs are truncated, never padded past it.
pub const MAX_TOKENS: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentPrediction {
    pub label: String,
    #[serde(default)]
    pub positive: f64,
    #[serde(default)]
    pub negative: f64,
    #[serde(default)]
    pub neutral: f64,
    pub confidence: f64,
}

impl SentimentPrediction {
    /// True when the service returned a usable probability triple
    pub fn has_probabilities(&self) -> bool {
        let sum = self.positive + self.negative + self.neutral;
        sum.is_finite() && sum > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResponse {
    pub predictions: Vec<SentimentPrediction>,
    #[serde(default)]
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
struct SentimentRequest {
    texts: Vec<String>,
    max_length: usize,
    truncation: bool,
    padding: bool,
}

/// Client for the FinBERT-style classifier microservice
#[derive(Clone)]
pub struct SentimentClient {
    client: reqwest::Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Predict sentiment for text(s)
    pub async fn predict(&self, texts: Vec<String>) -> MLResult<SentimentResponse> {
        let expected = texts.len();
        let request = SentimentRequest {
            texts,
            max_length: MAX_TOKENS,
            truncation: true,
            padding: false,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response
            .json::<SentimentResponse>()
            .await
            .map_err(map_transport_error)?;

        if result.predictions.len() != expected {
            return Err(MLError::InvalidResponse(format!(
                "expected {} predictions, got {}",
                expected,
                result.predictions.len()
            )));
        }

        tracing::debug!(
            "Classifier scored {} texts in {:.1}ms",
            expected,
            result.processing_time_ms
        );
        Ok(result)
    }

    /// Check service health
    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;

        Ok(response.status().is_success())
    }
}

fn map_transport_error(e: reqwest::Error) -> MLError {
    if e.is_timeout() {
        MLError::Timeout
    } else {
        MLError::RequestFailed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_probabilities() {
        let body = r#"{
            "predictions": [
                {"label": "positive", "positive": 0.8, "negative": 0.05, "neutral": 0.15, "confidence": 0.8}
            ],
            "processing_time_ms": 12.5
        }"#;
        let resp: SentimentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.predictions.len(), 1);
        assert!(resp.predictions[0].has_probabilities());
    }

    #[test]
    fn test_response_label_only() {
        let body = r#"{"predictions": [{"label": "negative", "confidence": 0.91}]}"#;
        let resp: SentimentResponse = serde_json::from_str(body).unwrap();
        let p = &resp.predictions[0];
        assert!(!p.has_probabilities());
        assert_eq!(p.label, "negative");
        assert_eq!(resp.processing_time_ms, 0.0);
    }

    #[test]
    fn test_request_carries_truncation_settings() {
        let req = SentimentRequest {
            texts: vec!["a".to_string()],
            max_length: MAX_TOKENS,
            truncation: true,
            padding: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_length"], 512);
        assert_eq!(json["truncation"], true);
        assert_eq!(json["padding"], false);
    }
}
