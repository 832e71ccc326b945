//! DermaScan Core - skin-condition classification library.
//!
//! DermaScan classifies an uploaded photo with a pretrained image classifier
//! fetched from a model hub, then attaches a description and precautions for
//! the predicted condition from a static knowledge base.
//!
//! # Architecture
//!
//! ```text
//! Upload bytes → Decode → Preprocess (model config) → ONNX forward pass
//!              → softmax/argmax → Knowledge base lookup → JSON
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use dermascan_core::{Config, ImageClassifier, ImageDecoder, KnowledgeBase, ModelHandle, PredictionResult};
//!
//! #[tokio::main]
//! async fn main() -> dermascan_core::Result<()> {
//!     let config = Config::load()?;
//!     let knowledge = KnowledgeBase::load(config.knowledge_path().as_deref())?;
//!     let model = ModelHandle::initialize(&config).await?;
//!
//!     let decoded = ImageDecoder::new(config.limits.clone())
//!         .decode(std::fs::read("./rash.jpg")?)
//!         .await?;
//!     let classification = model.classify(&decoded.image).map_err(dermascan_core::ProcessingError::from)?;
//!     let result = PredictionResult::new(classification, &knowledge);
//!     println!("{}: {}%", result.prediction, result.confidence);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod knowledge;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    ConfigError, DermaError, InferenceError, KnowledgeError, ModelLoadError, ProcessingError,
    Result,
};
pub use knowledge::{DiseaseEntry, KnowledgeBase, UNKNOWN_LABEL};
pub use model::{Classification, ImageClassifier, ModelHandle};
pub use pipeline::{DecodedImage, ImageDecoder};
pub use types::{HealthStatus, PredictionResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
