use analysis_core::{
    round_to, AnalysisError, ClassProbabilities, ClassifierOutput, NewsItem, NewsSource,
    SentimentClassifier, SentimentLabel, SentimentResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod finbert;
pub mod lexicon;

pub use finbert::FinbertClassifier;
pub use lexicon::LexiconClassifier;

/// Scale applied to `pos - neg` in continuous mode
pub const CONTINUOUS_SCALE: f64 = 10.0;

/// Scores above this magnitude are amplified when converted to impact
pub const IMPACT_THRESHOLD: f64 = 0.5;
pub const IMPACT_STRONG_MULTIPLIER: f64 = 2.0;
pub const IMPACT_WEAK_MULTIPLIER: f64 = 1.0;

/// Classifier token budget; text beyond it is cut before classification
pub const TOKEN_BUDGET: usize = ml_client::MAX_TOKENS;

/// Characters of article text quoted in a reason line
pub const REASON_PREVIEW_CHARS: usize = 150;

pub const NO_NEWS_REASON: &str = "No relevant news found.";

/// How a classifier output becomes an item score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// `(pos - neg) * 10` from the probability triple
    Continuous,
    /// `+c` / `-c` / `0` from the best label and its confidence
    #[default]
    Label,
}

impl std::str::FromStr for ScoringMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" | "probability" => Ok(ScoringMode::Continuous),
            "label" => Ok(ScoringMode::Label),
            other => Err(AnalysisError::Configuration(format!(
                "unknown sentiment scoring mode '{}', expected label or continuous",
                other
            ))),
        }
    }
}

/// Aggregate score plus the items that contributed to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub aggregate: f64,
    pub items: Vec<SentimentResult>,
}

impl SentimentScore {
    /// Result for "no news": zero score, no items
    pub fn neutral() -> Self {
        Self { aggregate: 0.0, items: vec![] }
    }
}

/// Payload of the news-impact surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsImpact {
    pub impact: f64,
    pub sentiment_score: f64,
    pub reasons: Vec<String>,
}

/// Convert a sentiment score into a market-impact estimate, rounded to 2 places.
pub fn impact(score: f64) -> f64 {
    let multiplier = if score.abs() > IMPACT_THRESHOLD {
        IMPACT_STRONG_MULTIPLIER
    } else {
        IMPACT_WEAK_MULTIPLIER
    };
    round_to(score * multiplier, 2)
}

/// Keep at most `budget` whitespace-separated tokens.
pub fn truncate_tokens(text: &str, budget: usize) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= budget {
        return text.trim().to_string();
    }
    tokens[..budget].join(" ")
}

fn reason_line(label: SentimentLabel, text: &str) -> String {
    let preview: String = text.chars().take(REASON_PREVIEW_CHARS).collect();
    format!("{} {}...", label.tag(), preview)
}

/// Fetch news for a company, treating a failure, a timeout and an empty result alike.
pub async fn fetch_news_or_empty(
    source: &dyn NewsSource,
    company: &str,
    timeout: Duration,
) -> Vec<NewsItem> {
    match tokio::time::timeout(timeout, source.fetch_news(company)).await {
        Ok(Ok(items)) => {
            if items.is_empty() {
                tracing::info!("No news found for {}", company);
            } else {
                tracing::info!("Fetched {} news items for {}", items.len(), company);
            }
            items
        }
        Ok(Err(e)) => {
            tracing::warn!("News fetch failed for {}: {}", company, e);
            vec![]
        }
        Err(_) => {
            tracing::warn!("News fetch for {} timed out after {:?}", company, timeout);
            vec![]
        }
    }
}

/// Turns news text into per-item sentiment and one aggregate score.
///
/// The classifier is built by the caller and shared; the scorer itself keeps no
/// state between calls.
pub struct SentimentScorer {
    classifier: Arc<dyn SentimentClassifier>,
    mode: ScoringMode,
}

impl SentimentScorer {
    pub fn new(classifier: Arc<dyn SentimentClassifier>, mode: ScoringMode) -> Self {
        Self { classifier, mode }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn backend_name(&self) -> &'static str {
        self.classifier.backend_name()
    }

    /// Same scorer over the same classifier, in another mode
    pub fn with_mode(&self, mode: ScoringMode) -> Self {
        Self {
            classifier: Arc::clone(&self.classifier),
            mode,
        }
    }

    /// Score bare texts. Each text doubles as its item title.
    pub async fn score(&self, texts: &[String]) -> SentimentScore {
        let items: Vec<NewsItem> = texts
            .iter()
            .map(|t| NewsItem { title: t.clone(), text: t.clone() })
            .collect();
        self.score_news(&items).await
    }

    /// Score news items; the aggregate is the mean of the items that scored.
    ///
    /// Items the classifier rejects are logged and skipped. An empty input makes
    /// no classifier call.
    pub async fn score_news(&self, news: &[NewsItem]) -> SentimentScore {
        if news.is_empty() {
            return SentimentScore::neutral();
        }

        let mut items = Vec::with_capacity(news.len());

        for item in news {
            let text = truncate_tokens(&item.text, TOKEN_BUDGET);
            let output = match self.classifier.classify(&text).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(
                        "{} classifier failed on '{}': {}",
                        self.classifier.backend_name(),
                        item.title,
                        e
                    );
                    continue;
                }
            };

            match self.item_score(output) {
                Ok((label, probabilities, score)) => items.push(SentimentResult {
                    title: item.title.clone(),
                    label,
                    probabilities,
                    score,
                    reason: reason_line(label, &item.text),
                }),
                Err(e) => tracing::warn!("Skipping '{}': {}", item.title, e),
            }
        }

        if items.is_empty() {
            tracing::warn!("No news item could be scored, using neutral sentiment");
            return SentimentScore::neutral();
        }

        let aggregate = items.iter().map(|i| i.score).sum::<f64>() / items.len() as f64;
        tracing::debug!(
            "Scored {}/{} items in {:?} mode, aggregate {:.4}",
            items.len(),
            news.len(),
            self.mode,
            aggregate
        );

        SentimentScore { aggregate, items }
    }

    /// Score news and package it for display, with a reason line per article.
    pub async fn assess(&self, news: &[NewsItem]) -> NewsImpact {
        let score = self.score_news(news).await;

        let reasons = if score.items.is_empty() {
            vec![NO_NEWS_REASON.to_string()]
        } else {
            score.items.iter().map(|i| i.reason.clone()).collect()
        };

        NewsImpact {
            impact: impact(score.aggregate),
            sentiment_score: round_to(score.aggregate, 4),
            reasons,
        }
    }

    fn item_score(
        &self,
        output: ClassifierOutput,
    ) -> Result<(SentimentLabel, Option<ClassProbabilities>, f64), AnalysisError> {
        let probabilities = match output {
            ClassifierOutput::Logits { values } => {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(AnalysisError::NumericDegenerate("non-finite logits".to_string()));
                }
                Some(ClassProbabilities::from_logits(values))
            }
            ClassifierOutput::Probabilities(p) => Some(p.normalized().ok_or_else(|| {
                AnalysisError::NumericDegenerate("probabilities do not sum to a positive value".to_string())
            })?),
            ClassifierOutput::Label { .. } => None,
        };

        match (self.mode, probabilities, output) {
            (ScoringMode::Continuous, Some(p), _) => {
                Ok((p.top_label(), Some(p), (p.positive - p.negative) * CONTINUOUS_SCALE))
            }
            (ScoringMode::Continuous, None, _) => Err(AnalysisError::InvalidData(
                "continuous scoring needs class probabilities, classifier gave a label".to_string(),
            )),
            (ScoringMode::Label, Some(p), _) => {
                let label = p.top_label();
                let confidence = match label {
                    SentimentLabel::Negative => p.negative,
                    SentimentLabel::Neutral => p.neutral,
                    SentimentLabel::Positive => p.positive,
                };
                Ok((label, Some(p), label.sign() * confidence))
            }
            (ScoringMode::Label, None, ClassifierOutput::Label { label, confidence }) => {
                if !(confidence > 0.0 && confidence <= 1.0) {
                    return Err(AnalysisError::InvalidData(format!(
                        "label confidence {} outside (0, 1]",
                        confidence
                    )));
                }
                Ok((label, None, label.sign() * confidence))
            }
            (ScoringMode::Label, None, _) => Err(AnalysisError::InvalidData(
                "classifier output carried neither probabilities nor a label".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns canned outputs keyed by text and records what it was asked
    struct StubClassifier {
        outputs: HashMap<String, Result<ClassifierOutput, AnalysisError>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl StubClassifier {
        fn new(outputs: Vec<(&str, Result<ClassifierOutput, AnalysisError>)>) -> Arc<Self> {
            Arc::new(Self {
                outputs: outputs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl SentimentClassifier for StubClassifier {
        async fn classify(&self, text: &str) -> Result<ClassifierOutput, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            self.outputs
                .get(text)
                .cloned()
                .unwrap_or(Ok(ClassifierOutput::Label { label: SentimentLabel::Neutral, confidence: 1.0 }))
        }

        fn backend_name(&self) -> &'static str {
            "stub"
        }
    }

    fn label(label: SentimentLabel, confidence: f64) -> Result<ClassifierOutput, AnalysisError> {
        Ok(ClassifierOutput::Label { label, confidence })
    }

    fn probs(negative: f64, neutral: f64, positive: f64) -> Result<ClassifierOutput, AnalysisError> {
        Ok(ClassifierOutput::Probabilities(ClassProbabilities { negative, neutral, positive }))
    }

    #[tokio::test]
    async fn test_balanced_headline_scores_zero_in_label_mode() {
        let scorer = SentimentScorer::new(Arc::new(LexiconClassifier::new()), ScoringMode::Label);

        let result = scorer.score(&["Profit offset by losses".to_string()]).await;

        assert_eq!(result.aggregate, 0.0);
        assert_eq!(result.items[0].label, SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn test_empty_input_is_neutral_without_classifier_call() {
        let stub = StubClassifier::new(vec![]);
        let scorer = SentimentScorer::new(stub.clone(), ScoringMode::Label);

        let result = scorer.score(&[]).await;

        assert_eq!(result, SentimentScore::neutral());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_label_mode_mean_of_signed_confidences() {
        let stub = StubClassifier::new(vec![
            ("good", label(SentimentLabel::Positive, 0.9)),
            ("bad", label(SentimentLabel::Negative, 0.5)),
            ("meh", label(SentimentLabel::Neutral, 0.8)),
        ]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Label);

        let texts: Vec<String> = ["good", "bad", "meh"].iter().map(|s| s.to_string()).collect();
        let result = scorer.score(&texts).await;

        assert_eq!(result.items.len(), 3);
        assert!((result.aggregate - (0.9 - 0.5 + 0.0) / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_continuous_mode_scales_probability_gap() {
        let stub = StubClassifier::new(vec![("beat", probs(0.1, 0.2, 0.7))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Continuous);

        let result = scorer.score(&["beat".to_string()]).await;

        assert!((result.aggregate - 6.0).abs() < 1e-9);
        assert_eq!(result.items[0].label, SentimentLabel::Positive);
        assert!(result.items[0].probabilities.is_some());
    }

    #[tokio::test]
    async fn test_continuous_mode_applies_softmax_to_logits() {
        let logits = [0.0, 0.0, 0.0];
        let stub = StubClassifier::new(vec![("flat", Ok(ClassifierOutput::Logits { values: logits }))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Continuous);

        let result = scorer.score(&["flat".to_string()]).await;

        assert!(result.aggregate.abs() < 1e-12);
        let p = result.items[0].probabilities.unwrap();
        assert!((p.positive - 1.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_label_mode_uses_top_probability() {
        let stub = StubClassifier::new(vec![("drop", probs(0.8, 0.15, 0.05))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Label);

        let result = scorer.score(&["drop".to_string()]).await;

        assert!((result.aggregate + 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failed_items_are_skipped() {
        let stub = StubClassifier::new(vec![
            ("ok", label(SentimentLabel::Positive, 0.6)),
            ("boom", Err(AnalysisError::UpstreamUnavailable("down".to_string()))),
            ("nan", probs(f64::NAN, 0.0, 0.0)),
        ]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Label);

        let texts: Vec<String> = ["ok", "boom", "nan"].iter().map(|s| s.to_string()).collect();
        let result = scorer.score(&texts).await;

        assert_eq!(result.items.len(), 1);
        assert!((result.aggregate - 0.6).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_all_items_failing_is_neutral() {
        let stub = StubClassifier::new(vec![("x", Err(AnalysisError::UpstreamUnavailable("down".to_string())))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Label);

        assert_eq!(scorer.score(&["x".to_string()]).await, SentimentScore::neutral());
    }

    #[tokio::test]
    async fn test_continuous_mode_rejects_label_only_output() {
        let stub = StubClassifier::new(vec![("x", label(SentimentLabel::Positive, 0.9))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Continuous);

        assert!(scorer.score(&["x".to_string()]).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_truncated_before_classification() {
        let stub = StubClassifier::new(vec![]);
        let scorer = SentimentScorer::new(stub.clone(), ScoringMode::Label);
        let long_text = vec!["word"; TOKEN_BUDGET + 100].join(" ");

        scorer.score(&[long_text]).await;

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].split_whitespace().count(), TOKEN_BUDGET);
    }

    #[tokio::test]
    async fn test_assess_reasons() {
        let stub = StubClassifier::new(vec![("Tata Motors posts record sales", label(SentimentLabel::Positive, 0.9))]);
        let scorer = SentimentScorer::new(stub, ScoringMode::Label);

        let news = vec![NewsItem::new("Tata Motors posts record sales", None)];
        let result = scorer.assess(&news).await;

        assert_eq!(result.reasons, vec!["[Positive] Tata Motors posts record sales...".to_string()]);
        assert_eq!(result.impact, 1.8);
        assert_eq!(result.sentiment_score, 0.9);
    }

    #[tokio::test]
    async fn test_assess_without_news() {
        let scorer = SentimentScorer::new(Arc::new(LexiconClassifier::new()), ScoringMode::Continuous);

        let result = scorer.assess(&[]).await;

        assert_eq!(result.impact, 0.0);
        assert_eq!(result.reasons, vec![NO_NEWS_REASON.to_string()]);
    }

    #[test]
    fn test_reason_preview_is_capped() {
        let text = "a".repeat(400);
        let reason = reason_line(SentimentLabel::Negative, &text);
        assert_eq!(reason, format!("[Negative] {}...", "a".repeat(REASON_PREVIEW_CHARS)));
    }

    #[test]
    fn test_impact_policy() {
        assert_eq!(impact(0.6), 1.2);
        assert_eq!(impact(0.3), 0.3);
        assert_eq!(impact(-0.6), -1.2);
        assert_eq!(impact(0.5), 0.5);
        assert_eq!(impact(0.0), 0.0);
    }

    #[test]
    fn test_scoring_mode_parse() {
        assert_eq!("Continuous".parse::<ScoringMode>().unwrap(), ScoringMode::Continuous);
        assert_eq!("label".parse::<ScoringMode>().unwrap(), ScoringMode::Label);
        assert!("votes".parse::<ScoringMode>().is_err());
    }

    struct FailingNews;

    #[async_trait]
    impl NewsSource for FailingNews {
        async fn fetch_news(&self, _company: &str) -> Result<Vec<NewsItem>, AnalysisError> {
            Err(AnalysisError::UpstreamUnavailable("connection refused".to_string()))
        }
    }

    struct SlowNews;

    #[async_trait]
    impl NewsSource for SlowNews {
        async fn fetch_news(&self, _company: &str) -> Result<Vec<NewsItem>, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![NewsItem::new("late", None)])
        }
    }

    #[tokio::test]
    async fn test_news_failure_degrades_to_empty() {
        let items = fetch_news_or_empty(&FailingNews, "Reliance", Duration::from_secs(1)).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_news_timeout_degrades_to_empty() {
        let items = fetch_news_or_empty(&SlowNews, "Reliance", Duration::from_millis(50)).await;
        assert!(items.is_empty());
    }

    #[test]
    fn test_score_serializes() {
        let json = serde_json::to_value(SentimentScore::neutral()).unwrap();
        assert_eq!(json["aggregate"], 0.0);
    }
}
