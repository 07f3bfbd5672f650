use analysis_core::{AnalysisError, NewsItem, NewsSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const NEWSDATA_URL: &str = "https://newsdata.io/api/1/news";

/// Company news from the NewsData.io latest-news endpoint
#[derive(Clone)]
pub struct NewsDataClient {
    api_key: String,
    country: String,
    language: String,
    base_url: String,
    client: Client,
}

impl NewsDataClient {
    pub fn new(
        api_key: String,
        country: String,
        language: String,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            country,
            language,
            base_url: NEWSDATA_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn latest_news(&self, company: &str) -> Result<Vec<NewsItem>, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::Configuration("NEWS_API_KEY is not set".to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("q", company),
                ("country", self.country.as_str()),
                ("language", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("news request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "news source returned HTTP {}",
                response.status()
            )));
        }

        let body: NewsDataResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("news response unreadable: {}", e)))?;

        body.into_items()
    }
}

#[async_trait]
impl NewsSource for NewsDataClient {
    async fn fetch_news(&self, company: &str) -> Result<Vec<NewsItem>, AnalysisError> {
        self.latest_news(company).await
    }
}

#[derive(Debug, Deserialize)]
struct NewsDataResponse {
    #[serde(default)]
    status: String,
    results: Option<Vec<NewsDataArticle>>,
}

#[derive(Debug, Deserialize)]
struct NewsDataArticle {
    title: Option<String>,
    description: Option<String>,
}

impl NewsDataResponse {
    fn into_items(self) -> Result<Vec<NewsItem>, AnalysisError> {
        if !self.status.is_empty() && self.status != "success" {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "news source answered with status '{}'",
                self.status
            )));
        }

        let Some(results) = self.results else {
            tracing::warn!("News response carried no results field");
            return Ok(vec![]);
        };

        Ok(results
            .into_iter()
            .filter_map(|article| {
                let title = article.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                Some(NewsItem::new(title, article.description.as_deref()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = r#"{
            "status": "success",
            "totalResults": 3,
            "results": [
                {"title": "Reliance Q3 profit rises", "description": "Net profit up 7%", "link": "x"},
                {"title": "Jio adds subscribers", "description": null},
                {"title": null, "description": "orphan description"}
            ]
        }"#;
        let parsed: NewsDataResponse = serde_json::from_str(body).unwrap();
        let items = parsed.into_items().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Reliance Q3 profit rises Net profit up 7%");
        assert_eq!(items[1].text, "Jio adds subscribers");
    }

    #[test]
    fn test_missing_results_is_no_news() {
        let parsed: NewsDataResponse = serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        assert!(parsed.into_items().unwrap().is_empty());
    }

    #[test]
    fn test_error_status_is_upstream_failure() {
        let parsed: NewsDataResponse = serde_json::from_str(r#"{"status": "error"}"#).unwrap();
        assert!(matches!(
            parsed.into_items(),
            Err(AnalysisError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = NewsDataClient::new(String::new(), "in".to_string(), "en".to_string(), Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client.fetch_news("Infosys").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }
}
