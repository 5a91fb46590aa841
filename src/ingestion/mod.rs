//! Index builder.
//!
//! Turns a passage corpus into a [`KnowledgeBase`]: every passage is embedded
//! once, in corpus order, and inserted into a fresh vector store with its
//! corpus position as payload.
//!
//! # Usage
//!
//! ```ignore
//! use scholar_kb::embedding::fastembed::FastEmbedProvider;
//! use scholar_kb::ingestion::IndexBuilder;
//! use scholar_kb::provider::json::JsonFilePassageProvider;
//!
//! let embedder = FastEmbedProvider::new(None, None)?;
//! let builder = IndexBuilder::new(embedder).with_batch_size(16);
//!
//! let provider = JsonFilePassageProvider::from_file("passages.json").await?;
//! let stats = builder.build_from_provider(&provider, "kb.bin").await?;
//! println!("Indexed {} passages in {:?}", stats.passages, stats.elapsed);
//! ```
//!
//! The build happens fully in memory. Nothing is written until every passage
//! has been embedded, and the file is replaced atomically, so a failed build
//! leaves any previously saved knowledge base untouched.

use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::models::{EmbeddingConfig, Passage};
use crate::provider::{PassageProvider, ProviderError};
use crate::storage::{KnowledgeBase, StorageError};
use crate::store::{StoreError, VectorStore};

/// Passages embedded per `embed_batch` call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Errors that can occur while building a knowledge base.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Vector store rejected an embedding
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// Saving the knowledge base failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    /// Number of passages embedded and indexed
    pub passages: usize,

    /// Dimension of the stored vectors
    pub dimension: usize,

    /// Wall-clock time spent embedding and indexing
    pub elapsed: Duration,
}

type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Builds knowledge bases with an explicitly supplied embedding provider.
pub struct IndexBuilder<E>
where
    E: EmbeddingProvider,
{
    embedding_provider: E,
    batch_size: usize,
    progress: Option<ProgressFn>,
}

impl<E> IndexBuilder<E>
where
    E: EmbeddingProvider,
{
    /// Create a builder with the default batch size.
    pub fn new(embedding_provider: E) -> Self {
        Self {
            embedding_provider,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        }
    }

    /// Set the number of passages embedded per batch (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Register a callback invoked after each batch with `(done, total)`.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// The embedding provider this builder uses.
    pub fn embedding_provider(&self) -> &E {
        &self.embedding_provider
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embedding configuration recorded in built knowledge bases.
    pub fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: self.embedding_provider.model_name().to_string(),
            dimension: self.embedding_provider.dimension(),
        }
    }

    /// Embed every passage and build an in-memory knowledge base.
    ///
    /// Passages are embedded in corpus order; passage `i` is stored with
    /// payload `i`.
    ///
    /// # Errors
    /// - `IngestionError::InvalidInput` for an empty corpus or a passage with
    ///   no text
    /// - `IngestionError::EmbeddingError` if the provider fails or returns the
    ///   wrong number of vectors for a batch
    /// - `IngestionError::StoreError` if a vector has the wrong dimension
    pub async fn build(&self, passages: Vec<Passage>) -> IngestionResult<(KnowledgeBase, BuildStats)> {
        if passages.is_empty() {
            return Err(IngestionError::InvalidInput(
                "Cannot build a knowledge base from an empty corpus".to_string(),
            ));
        }

        let normalized: Vec<String> = passages.iter().map(|p| normalize_text(&p.content)).collect();
        if let Some(i) = normalized.iter().position(|text| text.is_empty()) {
            return Err(IngestionError::InvalidInput(format!(
                "Passage {} ('{}') has no content",
                i, passages[i].title
            )));
        }

        let config = self.config();
        let total = passages.len();
        let started = Instant::now();
        let mut store = VectorStore::with_capacity(config.dimension, total)?;

        tracing::info!(
            passages = total,
            model = %config.model_name,
            dimension = config.dimension,
            batch_size = self.batch_size,
            "Building knowledge base"
        );

        for (batch_index, batch) in normalized.chunks(self.batch_size).enumerate() {
            let refs: Vec<&str> = batch.iter().map(|s| s.as_str()).collect();
            let embeddings = self
                .embedding_provider
                .embed_batch(&refs)
                .await
                .map_err(|e| IngestionError::EmbeddingError(e.to_string()))?;

            if embeddings.len() != batch.len() {
                return Err(IngestionError::EmbeddingError(format!(
                    "Provider returned {} embeddings for a batch of {}",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let offset = batch_index * self.batch_size;
            for (i, embedding) in embeddings.into_iter().enumerate() {
                store.insert(embedding, offset + i)?;
            }

            let done = store.len();
            tracing::debug!(done, total, "Embedded batch");
            if let Some(progress) = &self.progress {
                progress(done, total);
            }
        }

        let stats = BuildStats {
            passages: total,
            dimension: config.dimension,
            elapsed: started.elapsed(),
        };
        let kb = KnowledgeBase::new(config, passages, store)?;

        Ok((kb, stats))
    }

    /// Build a knowledge base and atomically save it to `path`.
    ///
    /// The file is written only after every passage has been embedded; if
    /// anything fails, an existing file at `path` is left unchanged.
    pub async fn build_and_persist(
        &self,
        passages: Vec<Passage>,
        path: impl AsRef<Path>,
    ) -> IngestionResult<BuildStats> {
        let path = path.as_ref();
        let (kb, stats) = self.build(passages).await?;
        kb.save(path)?;

        tracing::info!(
            path = %path.display(),
            passages = stats.passages,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Knowledge base built"
        );
        Ok(stats)
    }

    /// Fetch the corpus from a provider, then [`build_and_persist`](Self::build_and_persist).
    pub async fn build_from_provider<P>(
        &self,
        provider: &P,
        path: impl AsRef<Path>,
    ) -> IngestionResult<BuildStats>
    where
        P: PassageProvider + ?Sized,
    {
        let passages = provider.fetch_passages().await?;
        tracing::info!(provider = provider.name(), passages = passages.len(), "Fetched corpus");
        self.build_and_persist(passages, path).await
    }
}
