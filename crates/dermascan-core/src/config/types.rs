//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for cached model artifacts
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.dermascan/models"),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Pretrained classifier source on the model hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hub repository id ("owner/name")
    pub repo: String,

    /// Branch, tag or commit to resolve files from
    pub revision: String,

    /// Hub base URL. `HF_ENDPOINT` overrides this when set.
    pub endpoint: String,

    /// Path of the ONNX export inside the repository
    pub onnx_file: String,

    /// Expected BLAKE3 hex digest of the ONNX file (verified after download)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onnx_blake3: Option<String>,

    /// Never touch the network; fail if artifacts are not cached
    pub offline: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo: "Jayanth2002/dinov2-base-finetuned-SkinDisease".to_string(),
            revision: "main".to_string(),
            endpoint: "https://huggingface.co".to_string(),
            onnx_file: "onnx/model.onnx".to_string(),
            onnx_blake3: None,
            offline: false,
        }
    }
}

/// Resource limits to protect against problematic uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in megabytes
    pub max_upload_mb: u64,

    /// Maximum image dimension (width or height).
    ///
    /// Bounds both the decoded upload and the intermediate image produced by
    /// the model's resize step, so a thin image whose shortest-edge resize
    /// would exceed it is rejected before any pixels are resampled.
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: 20,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
        }
    }
}

impl LimitsConfig {
    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Knowledge base source.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// External TOML file replacing the embedded disease table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
