//! Disease knowledge base: label → description and precautions.
//!
//! The table is built once at startup, either from the copy embedded in the
//! binary (`data/diseases.toml`) or from a file named in the config, and is
//! read-only afterwards. Lookups never fail: any label without an entry
//! resolves to the [`UNKNOWN_LABEL`] entry, whose presence is checked at load.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// Label of the fallback entry.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Embedded default table.
const EMBEDDED_DISEASES: &str = include_str!("../data/diseases.toml");

/// Descriptive text for one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub description: String,
    pub precautions: Vec<String>,
}

/// On-disk row shape.
#[derive(Debug, Deserialize)]
struct DiseaseRecord {
    label: String,
    description: String,
    #[serde(default)]
    precautions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiseaseFile {
    #[serde(default)]
    disease: Vec<DiseaseRecord>,
}

/// Immutable mapping from disease label to [`DiseaseEntry`].
///
/// Labels keep their declaration order so `/diseases` output is stable.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<(String, DiseaseEntry)>,
    index: HashMap<String, usize>,
    unknown: usize,
}

impl KnowledgeBase {
    /// Build the knowledge base from the table compiled into the binary.
    pub fn embedded() -> Result<Self, KnowledgeError> {
        Self::from_toml(EMBEDDED_DISEASES)
    }

    /// Build from an external TOML file with the same `[[disease]]` schema.
    pub fn from_file(path: &Path) -> Result<Self, KnowledgeError> {
        let content = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_toml(&content)?;
        tracing::info!("Loaded {} disease entries from {:?}", kb.len(), path);
        Ok(kb)
    }

    /// Use `path` when given, otherwise the embedded table.
    pub fn load(path: Option<&Path>) -> Result<Self, KnowledgeError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::embedded(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, KnowledgeError> {
        let file: DiseaseFile = toml::from_str(content)?;

        let mut entries = Vec::with_capacity(file.disease.len());
        let mut index = HashMap::with_capacity(file.disease.len());

        for (i, record) in file.disease.into_iter().enumerate() {
            let label = record.label.trim().to_string();
            if label.is_empty() {
                return Err(KnowledgeError::EmptyLabel { index: i });
            }
            if index.contains_key(&label) {
                return Err(KnowledgeError::Duplicate(label));
            }
            index.insert(label.clone(), entries.len());
            entries.push((
                label,
                DiseaseEntry {
                    description: record.description,
                    precautions: record.precautions,
                },
            ));
        }

        let unknown = *index
            .get(UNKNOWN_LABEL)
            .ok_or(KnowledgeError::MissingUnknown(UNKNOWN_LABEL))?;

        Ok(Self {
            entries,
            index,
            unknown,
        })
    }

    /// Look up a label, falling back to the "Unknown" entry.
    pub fn lookup(&self, label: &str) -> &DiseaseEntry {
        let idx = self.index.get(label).copied().unwrap_or(self.unknown);
        &self.entries[idx].1
    }

    /// Whether `label` has its own entry.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// All labels in declaration order, "Unknown" included.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// The fallback entry.
    pub fn unknown(&self) -> &DiseaseEntry {
        &self.entries[self.unknown].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model labels that will resolve to the fallback entry.
    pub fn unmatched<'a>(&self, model_labels: &'a [String]) -> Vec<&'a str> {
        model_labels
            .iter()
            .map(String::as_str)
            .filter(|label| !self.contains(label))
            .collect()
    }
}
