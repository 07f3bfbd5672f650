use anyhow::{anyhow, Context, Result};
use forecast_engine::{FeatureSet, ForecastConfig, SplitKind};
use market_calendar::HolidayCalendar;
use sentiment_analysis::ScoringMode;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use technical_analysis::FillPolicy;

const MIN_UPSTREAM_TIMEOUT_SECS: u64 = 1;
const MAX_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Which classifier backs the sentiment scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentBackend {
    /// Remote FinBERT service at `ML_SENTIMENT_URL`
    Finbert,
    /// Built-in word lists, no network
    Lexicon,
}

impl FromStr for SentimentBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finbert" => Ok(SentimentBackend::Finbert),
            "lexicon" => Ok(SentimentBackend::Lexicon),
            other => Err(anyhow!("unknown sentiment backend '{}', expected finbert or lexicon", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,

    pub polygon_api_key: String,
    pub polygon_rate_limit: usize,

    pub news_api_key: String,
    pub news_country: String,
    pub news_language: String,

    pub sentiment_backend: SentimentBackend,
    pub ml_sentiment_url: String,
    pub forecast_sentiment_mode: ScoringMode,
    pub news_impact_sentiment_mode: ScoringMode,

    /// Bound on every news and price request
    pub upstream_timeout: Duration,

    pub holidays: HolidayCalendar,
    /// Base forecast settings; the horizon is replaced per request
    pub forecast: ForecastConfig,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let allowed_origins = string_or(&lookup, "ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty() && o != "*")
            .collect();

        let timeout_secs: u64 = parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 10)?;
        let clamped = timeout_secs.clamp(MIN_UPSTREAM_TIMEOUT_SECS, MAX_UPSTREAM_TIMEOUT_SECS);
        if clamped != timeout_secs {
            tracing::warn!(
                "UPSTREAM_TIMEOUT_SECS={} out of range, using {}s",
                timeout_secs,
                clamped
            );
        }

        let holidays = match lookup("MARKET_HOLIDAYS").filter(|v| !v.trim().is_empty()) {
            Some(list) => HolidayCalendar::parse_list(&list).context("invalid MARKET_HOLIDAYS")?,
            None => HolidayCalendar::default_2025(),
        };

        let defaults = ForecastConfig::default();
        let forecast = ForecastConfig {
            split: parse_or(&lookup, "FORECAST_SPLIT", SplitKind::default())?,
            seed: parse_or(&lookup, "FORECAST_SPLIT_SEED", defaults.seed)?,
            fill_policy: parse_or(&lookup, "INDICATOR_FILL", FillPolicy::default())?,
            feature_set: parse_or(&lookup, "FORECAST_FEATURES", FeatureSet::default())?,
            min_training_rows: parse_or(&lookup, "MIN_TRAINING_ROWS", defaults.min_training_rows)?,
            ..defaults
        };
        forecast.validate().context("invalid forecast settings")?;

        Ok(Self {
            host: string_or(&lookup, "HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 3000)?,
            allowed_origins,
            polygon_api_key: string_or(&lookup, "POLYGON_API_KEY", ""),
            polygon_rate_limit: parse_or(&lookup, "POLYGON_RATE_LIMIT", 5)?,
            news_api_key: string_or(&lookup, "NEWS_API_KEY", ""),
            news_country: string_or(&lookup, "NEWS_COUNTRY", "in"),
            news_language: string_or(&lookup, "NEWS_LANGUAGE", "en"),
            sentiment_backend: parse_or(&lookup, "SENTIMENT_BACKEND", SentimentBackend::Finbert)?,
            ml_sentiment_url: string_or(&lookup, "ML_SENTIMENT_URL", "http://localhost:8001"),
            forecast_sentiment_mode: parse_or(&lookup, "FORECAST_SENTIMENT_MODE", ScoringMode::Label)?,
            news_impact_sentiment_mode: parse_or(
                &lookup,
                "NEWS_IMPACT_SENTIMENT_MODE",
                ScoringMode::Continuous,
            )?,
            upstream_timeout: Duration::from_secs(clamped),
            holidays,
            forecast,
        })
    }

    pub fn ml_config(&self) -> ml_client::MLConfig {
        ml_client::MLConfig {
            sentiment_url: self.ml_sentiment_url.clone(),
            timeout: self.upstream_timeout,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.news_country, "in");
        assert_eq!(config.news_language, "en");
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.sentiment_backend, SentimentBackend::Finbert);
        assert_eq!(config.forecast_sentiment_mode, ScoringMode::Label);
        assert_eq!(config.news_impact_sentiment_mode, ScoringMode::Continuous);
        assert_eq!(config.forecast.split, SplitKind::Chronological);
        assert_eq!(config.forecast.seed, 42);
        assert_eq!(config.holidays, HolidayCalendar::default_2025());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "http://localhost:5173, https://app.example.com"),
            ("FORECAST_SPLIT", "random"),
            ("FORECAST_FEATURES", "indicators"),
            ("INDICATOR_FILL", "zero"),
            ("SENTIMENT_BACKEND", "lexicon"),
            ("MARKET_HOLIDAYS", "2026-01-26,2026-03-03"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.forecast.split, SplitKind::Random);
        assert_eq!(config.forecast.feature_set, FeatureSet::WithIndicators);
        assert_eq!(config.forecast.fill_policy, FillPolicy::Zero);
        assert_eq!(config.sentiment_backend, SentimentBackend::Lexicon);
        assert_eq!(config.holidays.len(), 2);
    }

    #[test]
    fn test_timeout_is_bounded() {
        let high = AppConfig::from_lookup(lookup(&[("UPSTREAM_TIMEOUT_SECS", "120")])).unwrap();
        assert_eq!(high.upstream_timeout, Duration::from_secs(30));

        let low = AppConfig::from_lookup(lookup(&[("UPSTREAM_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(low.upstream_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("FORECAST_SPLIT", "kfold")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MARKET_HOLIDAYS", "2025-13-45")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MIN_TRAINING_ROWS", "1")])).is_err());
    }
}
