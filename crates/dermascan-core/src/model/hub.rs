//! Fetching model artifacts from a Hugging Face compatible hub.
//!
//! Files are resolved as `{endpoint}/{repo}/resolve/{revision}/{file}` and
//! cached under `{model_dir}/{owner}--{name}/`. Cached files are reused
//! as-is; only missing files are downloaded.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::{Config, ModelConfig};
use crate::error::ModelLoadError;

/// Label vocabulary (`id2label`).
pub const CONFIG_FILE: &str = "config.json";

/// Resize/crop/normalize parameters.
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// Environment variable holding a hub access token.
const TOKEN_ENV: &str = "HF_TOKEN";

/// Environment variable overriding the hub endpoint.
const ENDPOINT_ENV: &str = "HF_ENDPOINT";

/// Local paths of everything the adapter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub onnx: PathBuf,
    pub config: PathBuf,
    pub preprocessor: PathBuf,
}

impl ModelArtifacts {
    /// Artifact paths inside a repo cache directory.
    pub fn in_dir(cache_dir: &Path, model: &ModelConfig) -> Self {
        Self {
            onnx: cache_dir.join(&model.onnx_file),
            config: cache_dir.join(CONFIG_FILE),
            preprocessor: cache_dir.join(PREPROCESSOR_FILE),
        }
    }

    /// `(remote file, local path)` pairs, ONNX weights last.
    fn files<'a>(&'a self, model: &'a ModelConfig) -> [(&'a str, &'a Path); 3] {
        [
            (CONFIG_FILE, self.config.as_path()),
            (PREPROCESSOR_FILE, self.preprocessor.as_path()),
            (model.onnx_file.as_str(), self.onnx.as_path()),
        ]
    }

    /// Whether every artifact is already on disk.
    pub fn all_present(&self) -> bool {
        self.onnx.exists() && self.config.exists() && self.preprocessor.exists()
    }
}

/// Client for the model hub.
pub struct ModelHub {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    offline: bool,
}

impl ModelHub {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, offline: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            offline,
        }
    }

    /// Build a hub client from config, honouring `HF_ENDPOINT` and `HF_TOKEN`.
    pub fn from_config(model: &ModelConfig) -> Self {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| model.endpoint.clone());
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self::new(endpoint, token, model.offline)
    }

    /// Download URL for one file of a repository.
    pub fn file_url(&self, repo: &str, revision: &str, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            repo,
            revision,
            file.trim_start_matches('/')
        )
    }

    /// Local cache directory for a repository.
    pub fn cache_dir(model_dir: &Path, repo: &str) -> PathBuf {
        model_dir.join(repo.replace('/', "--"))
    }

    /// Make sure all artifacts for the configured model are cached locally.
    pub async fn fetch(&self, config: &Config) -> Result<ModelArtifacts, ModelLoadError> {
        let model = &config.model;
        let cache_dir = Self::cache_dir(&config.model_dir(), &model.repo);
        let artifacts = ModelArtifacts::in_dir(&cache_dir, model);

        for (remote, dest) in artifacts.files(model) {
            if dest.exists() {
                tracing::debug!("Using cached {:?}", dest);
                continue;
            }
            if self.offline {
                return Err(ModelLoadError::Missing(dest.to_path_buf()));
            }

            let url = self.file_url(&model.repo, &model.revision, remote);
            let checksum = if remote == model.onnx_file {
                model.onnx_blake3.as_deref()
            } else {
                None
            };

            tracing::info!("Downloading {} from {}", remote, model.repo);
            tracing::info!("  Source: {}", url);
            tracing::info!("  Destination: {:?}", dest);
            self.download_file(&url, dest, checksum).await?;

            if let Ok(meta) = std::fs::metadata(dest) {
                tracing::info!(
                    "  {} complete ({:.1} MB)",
                    remote,
                    meta.len() as f64 / (1024.0 * 1024.0)
                );
            }
        }

        Ok(artifacts)
    }

    /// Stream a file to disk via a `.part` file, then rename it into place.
    ///
    /// If `expected_blake3` is provided, the file is verified before the
    /// rename; on mismatch the partial file is removed.
    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        expected_blake3: Option<&str>,
    ) -> Result<(), ModelLoadError> {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        let fetch_err = |message: String| ModelLoadError::Fetch {
            url: url.to_string(),
            message,
        };
        let io_err = |path: &Path, source: std::io::Error| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;

        let total_size = response.content_length();
        if let Some(size) = total_size {
            tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
        }

        let part = part_path(dest);
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| io_err(part.as_path(), e))?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_err(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| io_err(part.as_path(), e))?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total_size {
                if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                    tracing::info!(
                        "  Progress: {:.0}%",
                        downloaded as f64 / total as f64 * 100.0
                    );
                }
            }
        }

        file.flush().await.map_err(|e| io_err(part.as_path(), e))?;
        drop(file);

        if let Some(expected) = expected_blake3 {
            verify_blake3(&part, expected)?;
        }

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| io_err(dest, e))?;
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Generate a BLAKE3 hash of file contents, streaming in 64KB blocks.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Verify a downloaded file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
pub fn verify_blake3(path: &Path, expected: &str) -> Result<(), ModelLoadError> {
    let actual = content_hash(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if !actual.eq_ignore_ascii_case(expected) {
        let _ = std::fs::remove_file(path);
        return Err(ModelLoadError::Checksum {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }

    tracing::debug!("  Checksum verified: {}…", &actual[..16]);
    Ok(())
}
