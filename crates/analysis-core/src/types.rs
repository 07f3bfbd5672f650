use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar. A history is ordered by `date`, one bar per trading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// News item as returned by a news source.
///
/// `text` is the title joined with the description and is what gets classified;
/// `title` is kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub text: String,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, description: Option<&str>) -> Self {
        let title = title.into();
        let text = format!("{} {}", title, description.unwrap_or("")).trim().to_string();
        Self { title, text }
    }
}

/// Three-class sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    /// Parse a classifier label. Accepts any casing and the `LABEL_n` ids some
    /// checkpoints emit (0 = negative, 1 = neutral, 2 = positive).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "negative" | "neg" | "label_0" => Some(SentimentLabel::Negative),
            "neutral" | "neu" | "label_1" => Some(SentimentLabel::Neutral),
            "positive" | "pos" | "label_2" => Some(SentimentLabel::Positive),
            _ => None,
        }
    }

    /// Sign applied to a label's confidence when scoring
    pub fn sign(&self) -> f64 {
        match self {
            SentimentLabel::Negative => -1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Positive => 1.0,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "[Negative]",
            SentimentLabel::Neutral => "[Neutral]",
            SentimentLabel::Positive => "[Positive]",
        }
    }
}

/// Class probabilities for one text, in (negative, neutral, positive) order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    /// Softmax over raw classifier logits
    pub fn from_logits(logits: [f64; 3]) -> Self {
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        Self {
            negative: exps[0] / sum,
            neutral: exps[1] / sum,
            positive: exps[2] / sum,
        }
    }

    /// Normalise a triple so it sums to one. Inputs that already sum to one pass through.
    pub fn normalized(self) -> Option<Self> {
        let sum = self.negative + self.neutral + self.positive;
        if !sum.is_finite() || sum <= 0.0 {
            return None;
        }
        Some(Self {
            negative: self.negative / sum,
            neutral: self.neutral / sum,
            positive: self.positive / sum,
        })
    }

    /// Most likely class. A polar class must beat the opposite pole outright;
    /// a positive/negative tie is Neutral.
    pub fn top_label(&self) -> SentimentLabel {
        if self.positive > self.negative && self.positive >= self.neutral {
            SentimentLabel::Positive
        } else if self.negative > self.positive && self.negative >= self.neutral {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// What a classifier returns for one text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierOutput {
    /// Raw scores, softmax not yet applied
    Logits { values: [f64; 3] },
    Probabilities(ClassProbabilities),
    /// Single best label with its confidence in (0, 1]
    Label { label: SentimentLabel, confidence: f64 },
}

/// Scored news item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub title: String,
    pub label: SentimentLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ClassProbabilities>,
    pub score: f64,
    pub reason: String,
}

/// Whether a forecast point is observed or predicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Historical,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: PointKind,
}

impl ForecastPoint {
    pub fn historical(date: NaiveDate, price: f64) -> Self {
        Self { date, price, kind: PointKind::Historical }
    }

    pub fn prediction(date: NaiveDate, price: f64) -> Self {
        Self { date, price, kind: PointKind::Prediction }
    }
}

/// Discrete action suggested from sentiment and momentum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSignal {
    Buy,
    Sell,
    Avoid,
    Hold,
    NoAction,
}

impl TradeSignal {
    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            TradeSignal::Buy => "Buy",
            TradeSignal::Sell => "Sell",
            TradeSignal::Avoid => "Avoid",
            TradeSignal::Hold => "Hold",
            TradeSignal::NoAction => "No Action",
        }
    }
}

/// Round to `places` decimal places for presentation
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let p = ClassProbabilities::from_logits([-1.2, 0.3, 2.5]);
        let sum = p.negative + p.neutral + p.positive;
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(p.top_label(), SentimentLabel::Positive);
    }

    #[test]
    fn test_softmax_large_logits_stay_finite() {
        let p = ClassProbabilities::from_logits([1000.0, 999.0, -1000.0]);
        assert!(p.negative.is_finite() && p.neutral.is_finite() && p.positive.is_finite());
        assert_eq!(p.top_label(), SentimentLabel::Negative);
    }

    #[test]
    fn test_top_label_ties() {
        let third = 1.0 / 3.0;
        let balanced = ClassProbabilities { negative: third, neutral: third, positive: third };
        assert_eq!(balanced.top_label(), SentimentLabel::Neutral);

        let split = ClassProbabilities { negative: 0.45, neutral: 0.1, positive: 0.45 };
        assert_eq!(split.top_label(), SentimentLabel::Neutral);

        let leaning = ClassProbabilities { negative: 0.5, neutral: 0.5, positive: 0.0 };
        assert_eq!(leaning.top_label(), SentimentLabel::Negative);
    }

    #[test]
    fn test_normalized_rejects_zero_mass() {
        let p = ClassProbabilities { negative: 0.0, neutral: 0.0, positive: 0.0 };
        assert!(p.normalized().is_none());
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(SentimentLabel::parse("Positive"), Some(SentimentLabel::Positive));
        assert_eq!(SentimentLabel::parse("LABEL_0"), Some(SentimentLabel::Negative));
        assert_eq!(SentimentLabel::parse("bullish"), None);
    }

    #[test]
    fn test_news_item_joins_title_and_description() {
        let item = NewsItem::new("Reliance beats estimates", Some("Profit up 12%"));
        assert_eq!(item.text, "Reliance beats estimates Profit up 12%");
        let bare = NewsItem::new("Only a title", None);
        assert_eq!(bare.text, "Only a title");
    }

    #[test]
    fn test_forecast_point_serializes_type_field() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let json = serde_json::to_value(ForecastPoint::prediction(date, 101.5)).unwrap();
        assert_eq!(json["type"], "prediction");
        assert_eq!(json["date"], "2025-03-03");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-1.236, 2), -1.24);
    }
}
