//! Plain-text directory passage provider.
//!
//! Every `*.txt` file in the directory is one paper summary. Files are read in
//! file-name order and split into overlapping chunks; each chunk becomes a
//! passage titled after the file stem, with its 1-based chunk number as the
//! page. Summaries are used as written. Raw text extracted from papers can be
//! passed through [`clean_text`](super::chunker::clean_text) first with
//! [`TextDirectoryProvider::with_cleaning`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::chunker::{clean_text, TextChunker};
use super::{PassageProvider, ProviderError, ProviderResult};
use crate::models::Passage;

/// Passage provider over a directory of `.txt` summaries.
#[derive(Debug, Clone)]
pub struct TextDirectoryProvider {
    dir: PathBuf,
    chunker: TextChunker,
    clean: bool,
    name: String,
}

impl TextDirectoryProvider {
    /// Create a provider with the default chunker (800 characters, 200 overlap).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_chunker(dir, TextChunker::default())
    }

    pub fn with_chunker(dir: impl Into<PathBuf>, chunker: TextChunker) -> Self {
        let dir = dir.into();
        Self {
            name: format!("text directory {}", dir.display()),
            dir,
            chunker,
            clean: false,
        }
    }

    /// Strip paper boilerplate (headers, references, URLs) before chunking.
    pub fn with_cleaning(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted list of `.txt` files in the directory.
    async fn text_files(&self) -> ProviderResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_txt = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
            if is_txt && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn passages_for(&self, path: &Path, raw: &str) -> Vec<Passage> {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let text = if self.clean {
            clean_text(raw)
        } else {
            raw.to_string()
        };

        self.chunker
            .split(&text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Passage::new(title.clone(), chunk, (i + 1) as u32))
            .collect()
    }
}

#[async_trait]
impl PassageProvider for TextDirectoryProvider {
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>> {
        let files = self.text_files().await?;
        if files.is_empty() {
            tracing::warn!(dir = %self.dir.display(), "No .txt files found");
        }

        let mut passages = Vec::new();
        for path in files {
            let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ProviderError::ParseError(format!("{}: {}", path.display(), e))
            })?;
            let chunks = self.passages_for(&path, &raw);
            tracing::debug!(file = %path.display(), chunks = chunks.len(), "Chunked summary");
            passages.extend(chunks);
        }

        Ok(passages)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
