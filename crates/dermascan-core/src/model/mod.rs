//! Pretrained image classifier running locally via ONNX Runtime.
//!
//! The model, its label vocabulary and its preprocessing parameters are all
//! fetched from the model hub at startup. Nothing about the architecture is
//! hardcoded: any single-input image classifier exported to ONNX together
//! with Hugging Face style `config.json` and `preprocessor_config.json`
//! works.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dermascan_core::{Config, ModelHandle, ImageClassifier};
//!
//! let config = Config::load()?;
//! let handle = ModelHandle::initialize(&config).await?;
//! let result = handle.classify(&image)?;
//! println!("{} ({}%)", result.label, result.confidence);
//! ```

pub mod hub;
pub(crate) mod labels;
pub mod preprocess;
pub(crate) mod session;

use image::DynamicImage;
use serde::Serialize;

use crate::config::{Config, LimitsConfig};
use crate::error::{InferenceError, ModelLoadError};
use crate::math;

use self::hub::{ModelArtifacts, ModelHub};
use self::preprocess::PreprocessConfig;
use self::session::ClassifierSession;

/// Top prediction for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Label of the most probable class
    pub label: String,
    /// Its softmax probability as a percentage in [0, 100], 2 decimals
    pub confidence: f64,
}

impl Classification {
    /// Pick the top class from raw logits.
    ///
    /// Softmax over all classes, argmax (lowest index wins ties), probability
    /// scaled to a rounded percentage.
    pub fn from_logits(logits: &[f32], labels: &[String]) -> Result<Self, InferenceError> {
        if logits.len() != labels.len() {
            return Err(InferenceError::ClassCountMismatch {
                logits: logits.len(),
                labels: labels.len(),
            });
        }

        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::Output("model produced non-finite logits".to_string()));
        }

        let probabilities = math::softmax(logits);
        let (idx, probability) = math::argmax(&probabilities)
            .ok_or_else(|| InferenceError::Output("no finite class probability".to_string()))?;

        Ok(Self {
            label: labels[idx].clone(),
            confidence: math::to_percent(probability),
        })
    }
}

/// Anything that can label a decoded image.
///
/// The HTTP layer depends on this trait rather than on ONNX Runtime, so a
/// handle is shared as `Arc<dyn ImageClassifier>`.
pub trait ImageClassifier: Send + Sync {
    /// Classify one image. Blocking; call from a blocking-capable thread.
    fn classify(&self, image: &DynamicImage) -> Result<Classification, InferenceError>;

    /// Every label the classifier can emit, in class-index order.
    fn labels(&self) -> &[String];
}

/// Loaded classifier with its label vocabulary and preprocessing config.
///
/// Built once at startup and shared read-only across requests.
pub struct ModelHandle {
    session: ClassifierSession,
    labels: Vec<String>,
    preprocess: PreprocessConfig,
    /// Largest side allowed for the intermediate resize
    max_dim: u32,
}

impl ModelHandle {
    /// Fetch (or find cached) artifacts for the configured model and load them.
    pub async fn initialize(config: &Config) -> Result<Self, ModelLoadError> {
        let hub = ModelHub::from_config(&config.model);
        let artifacts = hub.fetch(config).await?;
        let limits = config.limits.clone();
        tokio::task::spawn_blocking(move || Self::load(&artifacts, &limits))
            .await
            .map_err(|e| ModelLoadError::Session {
                path: Default::default(),
                message: format!("Model load task failed: {e}"),
            })?
    }

    /// Load from artifacts already on disk.
    pub fn load(artifacts: &ModelArtifacts, limits: &LimitsConfig) -> Result<Self, ModelLoadError> {
        let labels = labels::load_labels(&artifacts.config)?;
        let preprocess = PreprocessConfig::from_file(&artifacts.preprocessor)?;

        tracing::info!("Loading classifier from {:?}", artifacts.onnx);
        let session = ClassifierSession::load(&artifacts.onnx)?;
        tracing::info!("Classifier loaded ({} classes)", labels.len());

        Ok(Self {
            session,
            labels,
            preprocess,
            max_dim: limits.max_image_dimension,
        })
    }

    /// Preprocessing parameters read from the model.
    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }
}

impl ImageClassifier for ModelHandle {
    fn classify(&self, image: &DynamicImage) -> Result<Classification, InferenceError> {
        let tensor = self.preprocess.apply(image, self.max_dim)?;
        let logits = self.session.logits(&tensor)?;
        Classification::from_logits(&logits, &self.labels)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}
