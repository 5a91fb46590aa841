//! Runtime-selected embedding provider.
//!
//! The binaries choose a provider from CLI flags at build time and from the
//! stored [`EmbeddingConfig`] at query time. `DynamicEmbeddingProvider` wraps
//! the concrete providers so the generic builder and search engine can take
//! either.

use async_trait::async_trait;
use std::path::PathBuf;

use super::fastembed::{self, FastEmbedProvider};
use super::openai::{self, OpenAIEmbedding};
use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::models::EmbeddingConfig;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Which backend a model name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    FastEmbed,
    OpenAI,
}

impl ProviderKind {
    /// Guess the backend from a stored model name.
    ///
    /// Known OpenAI models and anything named `text-embedding-*` go to OpenAI;
    /// everything else is assumed to be a local FastEmbed model.
    pub fn detect(model_name: &str) -> Self {
        if openai::model_dimension(model_name).is_some() || model_name.starts_with("text-embedding") {
            ProviderKind::OpenAI
        } else {
            ProviderKind::FastEmbed
        }
    }
}

/// Wrapper enum for embedding providers to allow dynamic dispatch
#[derive(Debug)]
pub enum DynamicEmbeddingProvider {
    FastEmbed(FastEmbedProvider),
    OpenAI(OpenAIEmbedding),
}

impl DynamicEmbeddingProvider {
    /// Create a provider of the given kind.
    ///
    /// `model` defaults to the backend's default model. For OpenAI the API key
    /// is read from `OPENAI_API_KEY`.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` for an unknown model, a missing
    /// API key, or a FastEmbed model that fails to load
    pub fn create(
        kind: ProviderKind,
        model: Option<&str>,
        cache_dir: Option<PathBuf>,
    ) -> EmbeddingResult<Self> {
        match kind {
            ProviderKind::FastEmbed => {
                let model = model.map(fastembed::parse_model).transpose()?;
                let cache_dir = cache_dir.or_else(default_cache_dir);
                tracing::debug!(cache_dir = ?cache_dir, "Using FastEmbed cache directory");
                Ok(Self::FastEmbed(FastEmbedProvider::new(model, cache_dir)?))
            }
            ProviderKind::OpenAI => {
                let api_key = std::env::var(OPENAI_API_KEY_VAR).map_err(|_| {
                    EmbeddingError::ConfigError(format!(
                        "{} environment variable must be set when using OpenAI embeddings",
                        OPENAI_API_KEY_VAR
                    ))
                })?;
                Ok(Self::OpenAI(OpenAIEmbedding::new(api_key, model.map(str::to_string))?))
            }
        }
    }

    /// Create the provider a knowledge base was built with.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the provider cannot be created
    /// or its dimension differs from `config.dimension`
    pub fn for_config(config: &EmbeddingConfig, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let kind = ProviderKind::detect(&config.model_name);
        tracing::info!(model = %config.model_name, kind = ?kind, "Auto-detected embedding provider");

        let provider = Self::create(kind, Some(&config.model_name), cache_dir)?;
        provider.ensure_matches(config)?;
        Ok(provider)
    }

    fn ensure_matches(&self, config: &EmbeddingConfig) -> EmbeddingResult<()> {
        if self.dimension() != config.dimension {
            return Err(EmbeddingError::ConfigError(format!(
                "Dimension mismatch: knowledge base expects {}, model '{}' produces {}",
                config.dimension,
                config.model_name,
                self.dimension()
            )));
        }
        Ok(())
    }
}

/// `<cache dir>/fastembed`, if the platform has a cache directory.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fastembed"))
}

#[async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAI(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAI(p) => p.model_name(),
        }
    }
}
