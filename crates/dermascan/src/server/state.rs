//! Shared application state for the HTTP server.

use std::sync::Arc;

use dermascan_core::config::LimitsConfig;
use dermascan_core::{ImageClassifier, ImageDecoder, KnowledgeBase};

/// Everything a request handler needs. Immutable after startup.
pub struct AppState {
    /// Loaded classifier, injected at startup
    pub classifier: Arc<dyn ImageClassifier>,
    /// Disease descriptions and precautions
    pub knowledge: KnowledgeBase,
    /// Upload decoder with the configured limits
    pub decoder: ImageDecoder,
    /// Maximum request body size in bytes
    pub upload_limit: usize,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        knowledge: KnowledgeBase,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            classifier,
            knowledge,
            decoder: ImageDecoder::new(limits.clone()),
            upload_limit: limits.max_upload_bytes(),
        }
    }

    /// Whether the injected classifier is usable.
    pub fn model_loaded(&self) -> bool {
        !self.classifier.labels().is_empty()
    }
}

pub type SharedState = Arc<AppState>;
