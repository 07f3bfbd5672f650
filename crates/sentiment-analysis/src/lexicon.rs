use analysis_core::{AnalysisError, ClassProbabilities, ClassifierOutput, SentimentClassifier};
use async_trait::async_trait;
use std::collections::HashSet;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "gains", "profit", "growth", "beat", "beats",
    "upgrade", "outperform", "strong", "positive", "rise", "rises", "increase",
    "breakthrough", "innovation", "success", "exceed", "momentum", "record",
    "optimistic", "high", "advance", "soar", "soars", "jump", "jumps",
    // Financial-specific terms
    "dividend", "buyback", "repurchase", "accretive", "upside", "recovery",
    "rebound", "expansion", "robust", "accelerating", "overweight", "raised",
    "upgraded", "outpacing", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls", "plunge",
    "crash", "miss", "misses", "downgrade", "underperform", "weak", "negative",
    "drop", "drops", "decrease", "concern", "risk", "fail", "disappoint", "slump",
    "warning", "pessimistic", "low", "retreat", "fear", "trouble", "tumble",
    // Financial-specific terms
    "dilution", "dilutive", "headwind", "lawsuit", "litigation", "recall",
    "investigation", "probe", "default", "bankruptcy", "restructuring", "layoff",
    "layoffs", "downside", "overvalued", "bubble", "underweight", "lowered",
    "suspended", "fraud", "penalty",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

/// A sentiment word preceded by a negation this many words back flips polarity
const NEGATION_WINDOW: usize = 3;

/// Offline word-list classifier.
///
/// Counts positive and negative hits (with negation flipping) and turns the
/// counts into a probability triple, so it serves both scoring modes.
pub struct LexiconClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl LexiconClassifier {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Positive and negative hit counts after negation handling
    fn count_hits(&self, text: &str) -> (usize, usize) {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '"' | '(' | ')'))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut positive = 0;
        let mut negative = 0;

        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(*word);
            let is_negative = self.negative.contains(*word);
            if !is_positive && !is_negative {
                continue;
            }

            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && i - neg_pos <= NEGATION_WINDOW);

            if is_positive != negated {
                positive += 1;
            } else {
                negative += 1;
            }
        }

        (positive, negative)
    }

    pub fn probabilities(&self, text: &str) -> ClassProbabilities {
        let (positive, negative) = self.count_hits(text);
        // One pseudo-count of neutral mass keeps a text with no hits neutral
        let total = (positive + negative + 1) as f64;
        ClassProbabilities {
            negative: negative as f64 / total,
            neutral: 1.0 / total,
            positive: positive as f64 / total,
        }
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierOutput, AnalysisError> {
        Ok(ClassifierOutput::Probabilities(self.probabilities(text)))
    }

    fn backend_name(&self) -> &'static str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::SentimentLabel;

    #[test]
    fn test_positive_headline() {
        let lexicon = LexiconClassifier::new();
        let p = lexicon.probabilities("Infosys shares surge after strong quarterly profit");
        assert_eq!(p.top_label(), SentimentLabel::Positive);
        assert!(p.positive > p.negative);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let lexicon = LexiconClassifier::new();
        let p = lexicon.probabilities("Results were not strong this quarter");
        assert_eq!(p.top_label(), SentimentLabel::Negative);
    }

    #[test]
    fn test_negation_outside_window_is_ignored() {
        let lexicon = LexiconClassifier::new();
        let (positive, negative) = lexicon.count_hits("no change in the board, growth continues");
        assert_eq!((positive, negative), (1, 0));
    }

    #[test]
    fn test_no_hits_is_neutral() {
        let lexicon = LexiconClassifier::new();
        let p = lexicon.probabilities("The company held its annual meeting");
        assert_eq!(p.neutral, 1.0);
        assert_eq!(p.top_label(), SentimentLabel::Neutral);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let lexicon = LexiconClassifier::new();
        let p = lexicon.probabilities("Profit beat estimates but layoffs raise concern");
        assert!((p.negative + p.neutral + p.positive - 1.0).abs() < 1e-12);
    }
}
