use analysis_core::{
    AnalysisError, ClassProbabilities, ClassifierOutput, SentimentClassifier, SentimentLabel,
};
use async_trait::async_trait;
use ml_client::{MLError, SentimentClient, SentimentPrediction};

/// Three-class classifier backed by the FinBERT inference service
pub struct FinbertClassifier {
    client: SentimentClient,
}

impl FinbertClassifier {
    pub fn new(client: SentimentClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SentimentClassifier for FinbertClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierOutput, AnalysisError> {
        let response = self
            .client
            .predict(vec![text.to_string()])
            .await
            .map_err(upstream_error)?;

        let prediction = response
            .predictions
            .first()
            .ok_or_else(|| AnalysisError::InvalidData("classifier returned no prediction".to_string()))?;

        prediction_to_output(prediction)
    }

    fn backend_name(&self) -> &'static str {
        "finbert"
    }
}

fn upstream_error(e: MLError) -> AnalysisError {
    AnalysisError::UpstreamUnavailable(format!("sentiment service: {}", e))
}

/// Prefer the full probability triple; fall back to the single label.
fn prediction_to_output(prediction: &SentimentPrediction) -> Result<ClassifierOutput, AnalysisError> {
    if prediction.has_probabilities() {
        let probabilities = ClassProbabilities {
            negative: prediction.negative,
            neutral: prediction.neutral,
            positive: prediction.positive,
        };
        return Ok(ClassifierOutput::Probabilities(probabilities));
    }

    let label = SentimentLabel::parse(&prediction.label).ok_or_else(|| {
        AnalysisError::InvalidData(format!("unknown sentiment label '{}'", prediction.label))
    })?;

    Ok(ClassifierOutput::Label {
        label,
        confidence: prediction.confidence,
    })
}
