//! JSON file passage provider.
//!
//! Reads a JSON array of `{"title", "content", "page"}` records, the format of
//! the hand-curated passage corpus.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{PassageProvider, ProviderError, ProviderResult};
use crate::models::Passage;

/// Passage provider backed by a JSON file, parsed once on load.
#[derive(Debug, Clone)]
pub struct JsonFilePassageProvider {
    path: PathBuf,
    passages: Vec<Passage>,
    name: String,
}

impl JsonFilePassageProvider {
    /// Load and parse a JSON passage file.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` if it is not a valid passage array
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await?;
        let passages = parse_passages(&raw)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), count = passages.len(), "Loaded passage file");

        Ok(Self {
            name: format!("JSON file {}", path.display()),
            path,
            passages,
        })
    }

    /// Path the passages were loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a JSON array of passages.
pub fn parse_passages(raw: &str) -> Result<Vec<Passage>, serde_json::Error> {
    serde_json::from_str(raw)
}

#[async_trait]
impl PassageProvider for JsonFilePassageProvider {
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>> {
        Ok(self.passages.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
