//! Response types produced by the service.

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeBase;
use crate::model::Classification;

/// The JSON body returned by `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Label predicted by the model (as emitted, even when it has no entry)
    pub prediction: String,

    /// Softmax probability of `prediction`, percent, 2 decimals
    pub confidence: f64,

    /// Description from the knowledge base ("Unknown" entry as fallback)
    pub description: String,

    /// Precautions from the knowledge base, in order
    pub precautions: Vec<String>,
}

impl PredictionResult {
    /// Join a classification with its knowledge base entry.
    pub fn new(classification: Classification, knowledge: &KnowledgeBase) -> Self {
        let entry = knowledge.lookup(&classification.label);
        Self {
            description: entry.description.clone(),
            precautions: entry.precautions.clone(),
            prediction: classification.label,
            confidence: classification.confidence,
        }
    }
}

/// The JSON body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

impl HealthStatus {
    pub fn healthy(model_loaded: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            model_loaded,
        }
    }
}
