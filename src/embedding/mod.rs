//! Turning passage and question text into vectors.
//!
//! The knowledge base never computes embeddings itself. It consumes vectors from
//! an explicitly constructed `EmbeddingProvider` that is loaded once and passed
//! by reference into the build and query paths.
//!
//! Two providers ship with the crate:
//! - [`fastembed::FastEmbedProvider`]: local ONNX models, no network after download
//! - [`openai::OpenAIEmbedding`]: OpenAI embeddings API
//!
//! [`dynamic::DynamicEmbeddingProvider`] picks one of them at runtime.

pub mod dynamic;
pub mod fastembed;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Failure to produce an embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Remote embedding service rejected or failed the request
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., missing API key, unknown model)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Model runtime failure or malformed provider output
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result alias for this module.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// A source of fixed-dimension text embeddings.
///
/// Async so remote services fit behind the same seam. Providers are
/// expected to be deterministic enough that repeated calls on the same text
/// rank the corpus the same way.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text.
    ///
    /// # Errors
    /// `InvalidInput` for blank text, otherwise whatever the backend reports
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// The default implementation calls [`embed`](Self::embed) once per text;
    /// providers with a native batch API should override it.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Model identifier, persisted with the knowledge base.
    fn model_name(&self) -> &str;
}

/// Canonical form of text before it is embedded.
///
/// Trims and collapses runs of whitespace into a single space. Case and
/// punctuation are kept, since cased models embed them. Applied identically
/// to passages at build time and to questions at query time.
///
/// # Example
/// ```
/// use scholar_kb::embedding::normalize_text;
///
/// assert_eq!(normalize_text("  Digital   Democracy\n"), "Digital Democracy");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
