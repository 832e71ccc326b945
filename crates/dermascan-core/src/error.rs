//! Error types for the DermaScan service.
//!
//! Errors are split by lifetime: startup errors (`ConfigError`,
//! `KnowledgeError`, `ModelLoadError`) abort the process, while per-request
//! errors (`ProcessingError`, `InferenceError`) are turned into HTTP
//! responses at the endpoint boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for DermaScan operations.
#[derive(Error, Debug)]
pub enum DermaError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Knowledge base could not be built
    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    /// Model could not be fetched or loaded
    #[error("Model load error: {0}")]
    ModelLoad(#[from] ModelLoadError),

    /// Per-request processing errors
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while building the disease knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge base {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse knowledge base: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Knowledge base has no \"{0}\" fallback entry")]
    MissingUnknown(&'static str),

    #[error("Duplicate knowledge base label: {0}")]
    Duplicate(String),

    #[error("Knowledge base entry {index} has an empty label")]
    EmptyLabel { index: usize },
}

/// Errors raised while fetching or loading the classifier. Always fatal.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    /// Network fetch from the model hub failed
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Downloaded artifact failed BLAKE3 verification
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Artifact is not cached and fetching is disabled
    #[error("Model file not found: {0} (offline mode, run `dermascan models download`)")]
    Missing(PathBuf),

    /// `config.json` or `preprocessor_config.json` is malformed
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// ONNX Runtime rejected the model
    #[error("Failed to create ONNX session from {path}: {message}")]
    Session { path: PathBuf, message: String },

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised by a forward pass. Never fatal.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to create input tensor: {0}")]
    Tensor(String),

    #[error("ONNX inference failed: {0}")]
    Run(String),

    #[error("Unexpected model output: {0}")]
    Output(String),

    /// Model emitted a different number of logits than it has labels
    #[error("Model produced {logits} logits but has {labels} labels")]
    ClassCountMismatch { logits: usize, labels: usize },

    #[error("Session lock poisoned")]
    LockPoisoned,

    /// Resizing to the model's input size would produce an oversized image
    #[error("Resize target {width}x{height} exceeds {max_dim}")]
    ResizeTooLarge { width: u32, height: u32, max_dim: u32 },
}

/// Per-request processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Upload bytes could not be decoded as an image
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Image dimensions exceed limit
    #[error("Image too large: {width}x{height} > {max_dim}")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Blocking task panicked or was cancelled
    #[error("Task join error in {stage} stage: {message}")]
    Task { stage: String, message: String },

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Convenience type alias for DermaScan results.
pub type Result<T> = std::result::Result<T, DermaError>;
