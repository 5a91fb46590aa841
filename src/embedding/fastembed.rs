//! FastEmbed embedding provider implementation.
//!
//! Runs embedding models locally through the fastembed library (ONNX runtime).
//! Model weights are downloaded once into a cache directory; after that no
//! network access is needed, which suits building the knowledge base offline.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Model used when none is requested: BGE base, 768 dimensions.
pub const DEFAULT_FASTEMBED_MODEL: &str = "BGEBaseENV15";

/// Resolve a model name to a fastembed model.
///
/// Accepts the enum-style names (`BGEBaseENV15`) as well as the Hugging Face
/// identifiers (`BAAI/bge-base-en-v1.5`), case-insensitively.
///
/// # Errors
/// Returns `EmbeddingError::ConfigError` for an unsupported model
pub fn parse_model(name: &str) -> EmbeddingResult<EmbeddingModel> {
    let model = match name.trim().to_ascii_lowercase().as_str() {
        "allminilml6v2" | "sentence-transformers/all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "bgesmallenv15" | "baai/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" | "baai/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" | "baai/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "nomicembedtextv1" | "nomic-ai/nomic-embed-text-v1" => EmbeddingModel::NomicEmbedTextV1,
        "nomicembedtextv15" | "nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        "paraphrasemlminilml12v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        "paraphrasemlmpnetbasev2" => EmbeddingModel::ParaphraseMLMpnetBaseV2,
        _ => {
            return Err(EmbeddingError::ConfigError(format!(
                "Unsupported FastEmbed model: {}",
                name
            )))
        }
    };
    Ok(model)
}

/// Output dimension of a fastembed model.
pub fn model_dimension(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::AllMiniLML6V2 => 384,
        EmbeddingModel::BGESmallENV15 => 384,
        EmbeddingModel::BGEBaseENV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        EmbeddingModel::NomicEmbedTextV1 => 768,
        EmbeddingModel::NomicEmbedTextV15 => 768,
        EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
        EmbeddingModel::ParaphraseMLMpnetBaseV2 => 768,
        _ => 384,
    }
}

/// Local embedding provider backed by fastembed.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The model instance (wrapped in Arc<Mutex> for thread-safety)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Dimension of the produced vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Load a FastEmbed model.
    ///
    /// # Arguments
    /// * `model` - Model to load (defaults to BGEBaseENV15)
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if model initialization fails
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::BGEBaseENV15);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = model_dimension(&model_type);

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model: {}", e))
        })?;

        tracing::debug!(model = %model_name, dimension = embedding_dimension, "FastEmbed model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    /// Load a model by name (see [`parse_model`]).
    pub fn from_name(name: &str, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        Self::new(Some(parse_model(name)?), cache_dir)
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        #[allow(unused_mut)]
        let mut model = self.model.lock().await;

        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Other(format!("Embedding generation failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Other("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        #[allow(unused_mut)]
        let mut model = self.model.lock().await;

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        model
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Other(format!("Batch embedding generation failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
