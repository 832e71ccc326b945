//! Label vocabulary from the model's `config.json` (`id2label`).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ModelLoadError;

#[derive(Debug, Deserialize)]
struct RawModelConfig {
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
}

/// Load `id2label` and return the labels ordered by class index.
pub fn load_labels(path: &Path) -> Result<Vec<String>, ModelLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_labels(&content).map_err(|message| ModelLoadError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a `config.json` document into an index-ordered label list.
///
/// Indices must form the contiguous range `0..n`.
pub fn parse_labels(content: &str) -> Result<Vec<String>, String> {
    let raw: RawModelConfig = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let id2label = raw
        .id2label
        .filter(|m| !m.is_empty())
        .ok_or_else(|| "config has no id2label mapping".to_string())?;

    let mut labels: Vec<Option<String>> = vec![None; id2label.len()];
    for (key, label) in id2label {
        let idx: usize = key
            .trim()
            .parse()
            .map_err(|_| format!("id2label key {key:?} is not a class index"))?;
        let slot = labels
            .get_mut(idx)
            .ok_or_else(|| format!("id2label index {idx} is out of range"))?;
        *slot = Some(label);
    }

    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| label.ok_or_else(|| format!("id2label is missing index {i}")))
        .collect()
}
