//! Text classification model.
//!
//! # Responsibilities
//! - Define the `Classifier` seam the orchestrator depends on
//! - Provide a bag-of-words linear model loadable from JSON
//! - Bootstrap: load from `model.path`, fall back to a built-in model
//!
//! # Design Decisions
//! - Model file format is plain JSON: labels, per-label bias, per-token weights
//! - A missing or invalid file never aborts startup; the built-in model is used

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::observability::metrics;

/// Model output for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
}

/// A text classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify already-normalized text.
    async fn predict(&self, text: &str) -> Result<Prediction, ModelError>;

    fn is_ready(&self) -> bool;
}

/// Serialized model definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelSpec {
    pub labels: Vec<String>,
    #[serde(default)]
    pub bias: Vec<f64>,
    /// token → one weight per label
    pub weights: HashMap<String, Vec<f64>>,
}

/// Bag-of-words linear classifier with softmax output.
#[derive(Debug, Clone)]
pub struct LinearTextModel {
    labels: Vec<String>,
    bias: Vec<f64>,
    weights: HashMap<String, Vec<f64>>,
}

impl LinearTextModel {
    pub fn from_spec(spec: LinearModelSpec) -> Result<Self, ModelError> {
        if spec.labels.is_empty() {
            return Err(ModelError::InvalidModel("no labels".into()));
        }
        let width = spec.labels.len();

        let bias = if spec.bias.is_empty() {
            vec![0.0; width]
        } else if spec.bias.len() == width {
            spec.bias
        } else {
            return Err(ModelError::InvalidModel(format!(
                "bias has {} entries, expected {}",
                spec.bias.len(),
                width
            )));
        };

        if let Some((token, w)) = spec.weights.iter().find(|(_, w)| w.len() != width) {
            return Err(ModelError::InvalidModel(format!(
                "token '{}' has {} weights, expected {}",
                token,
                w.len(),
                width
            )));
        }

        let weights = spec
            .weights
            .into_iter()
            .map(|(token, w)| (token.to_lowercase(), w))
            .collect();

        Ok(Self {
            labels: spec.labels,
            bias,
            weights,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let spec: LinearModelSpec =
            serde_json::from_str(raw).map_err(|e| ModelError::InvalidModel(e.to_string()))?;
        Self::from_spec(spec)
    }

    /// Small sentiment model used when no model file is available.
    pub fn builtin() -> Self {
        const POSITIVE: [&str; 6] = ["great", "awesome", "amazing", "good", "excellent", "love"];
        const NEGATIVE: [&str; 6] = ["terrible", "bad", "worst", "horrible", "awful", "hate"];
        const NEUTRAL: [&str; 4] = ["okay", "fine", "average", "normal"];

        let mut weights = HashMap::new();
        for token in NEGATIVE {
            weights.insert(token.to_string(), vec![2.0, -0.5, -1.0]);
        }
        for token in NEUTRAL {
            weights.insert(token.to_string(), vec![-0.5, 1.5, -0.5]);
        }
        for token in POSITIVE {
            weights.insert(token.to_string(), vec![-1.0, -0.5, 2.0]);
        }

        Self {
            labels: vec!["negative".into(), "neutral".into(), "positive".into()],
            bias: vec![0.0, 0.1, 0.0],
            weights,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, text: &str) -> Prediction {
        let mut logits = self.bias.clone();
        for token in tokenize(text) {
            if let Some(w) = self.weights.get(token) {
                for (logit, weight) in logits.iter_mut().zip(w) {
                    *logit += weight;
                }
            }
        }

        let probabilities = softmax(&logits);
        let mut best = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = i;
            }
        }

        Prediction {
            prediction: self.labels[best].clone(),
            confidence: probabilities[best],
            probabilities: self
                .labels
                .iter()
                .cloned()
                .zip(probabilities.iter().copied())
                .collect(),
        }
    }
}

#[async_trait]
impl Classifier for LinearTextModel {
    async fn predict(&self, text: &str) -> Result<Prediction, ModelError> {
        let prediction = self.classify(text);
        if !prediction.confidence.is_finite() {
            return Err(ModelError::Inference("non-finite model output".into()));
        }
        Ok(prediction)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Load the configured model, falling back to the built-in one.
pub async fn load_classifier(config: &ModelConfig) -> LinearTextModel {
    let start = Instant::now();

    let model = match config.path.as_deref() {
        None => {
            tracing::info!("No model path configured, using built-in model");
            LinearTextModel::builtin()
        }
        Some(path) if !Path::new(path).exists() => {
            tracing::warn!(model_path = %path, "Model file not found, using built-in model");
            LinearTextModel::builtin()
        }
        Some(path) => match read_model(path).await {
            Ok(model) => {
                tracing::info!(model_path = %path, labels = ?model.labels(), "Model loaded");
                model
            }
            Err(e) => {
                tracing::error!(model_path = %path, error = %e, "Failed to load model, using built-in model");
                LinearTextModel::builtin()
            }
        },
    };

    let elapsed = start.elapsed();
    metrics::record_model_load(elapsed);
    tracing::info!(load_duration_ms = elapsed.as_millis() as u64, "Model loading completed");
    model
}

async fn read_model(path: &str) -> Result<LinearTextModel, ModelError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModelError::InvalidModel(e.to_string()))?;
    LinearTextModel::from_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn builtin_model_classifies_sentiment() {
        let model = LinearTextModel::builtin();

        let positive = model.predict("this is a great product!").await.unwrap();
        assert_eq!(positive.prediction, "positive");

        let negative = model.predict("the worst, truly awful").await.unwrap();
        assert_eq!(negative.prediction, "negative");

        let neutral = model.predict("it was okay").await.unwrap();
        assert_eq!(neutral.prediction, "neutral");

        let total: f64 = positive.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(positive.confidence, positive.probabilities["positive"]);
    }

    #[test]
    fn rejects_mismatched_weights() {
        let raw = r#"{"labels": ["a", "b"], "weights": {"x": [1.0]}}"#;
        assert!(matches!(
            LinearTextModel::from_json(raw),
            Err(ModelError::InvalidModel(_))
        ));
    }

    #[tokio::test]
    async fn loads_model_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"labels": ["ham", "spam"], "bias": [0.5, 0.0], "weights": {{"Winner": [0.0, 3.0]}}}}"#
        )
        .unwrap();

        let model = load_classifier(&ModelConfig {
            path: Some(file.path().display().to_string()),
        })
        .await;
        assert_eq!(model.labels(), ["ham", "spam"]);
        assert_eq!(model.predict("you are a winner").await.unwrap().prediction, "spam");
        assert_eq!(model.predict("lunch at noon").await.unwrap().prediction, "ham");
    }

    #[tokio::test]
    async fn missing_or_invalid_file_falls_back() {
        let model = load_classifier(&ModelConfig {
            path: Some("/nonexistent/model.json".into()),
        })
        .await;
        assert_eq!(model.labels().len(), 3);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let model = load_classifier(&ModelConfig {
            path: Some(file.path().display().to_string()),
        })
        .await;
        assert!(model.is_ready());
        assert_eq!(model.labels()[2], "positive");
    }
}
