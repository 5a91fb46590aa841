//! Passage provider module.
//!
//! This module defines the interface for sourcing the passage corpus the
//! knowledge base is built from, and ships two implementations:
//!
//! - [`json::JsonFilePassageProvider`]: a curated JSON array of passages
//! - [`text_dir::TextDirectoryProvider`]: a folder of plain-text paper summaries,
//!   split into overlapping chunks
//!
//! Providers return passages in a stable order; that order becomes the
//! positional index stored as the vector payload.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Passage;

pub mod chunker;
pub mod json;
pub mod text_dir;

/// Errors that can occur when loading passages from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration (e.g., chunk overlap larger than chunk size)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing the passage corpus.
#[async_trait]
pub trait PassageProvider: Send + Sync {
    /// Fetch all passages, in corpus order.
    ///
    /// # Errors
    /// Returns `ProviderError` if passages cannot be read or parsed
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>>;

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}
