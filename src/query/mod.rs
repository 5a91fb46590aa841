//! Query processing module.
//!
//! Embeds a question with the same provider configuration the knowledge base
//! was built with, ranks the stored vectors under the requested metric and
//! resolves the payload indices back into passages.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scholar_kb::embedding::fastembed::FastEmbedProvider;
//! use scholar_kb::query::{KnowledgeBaseSearchEngine, SearchEngine, SearchQuery};
//! use scholar_kb::storage::KnowledgeBase;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kb = Arc::new(KnowledgeBase::load("kb.bin")?);
//! let embedder = FastEmbedProvider::from_name(&kb.config.model_name, None)?;
//! let engine = KnowledgeBaseSearchEngine::new(embedder, kb)?;
//!
//! let query = SearchQuery::new("What is participatory budgeting?".to_string(), None, None);
//! for hit in engine.search(&query).await? {
//!     println!("{} (p. {}) - {:.3}", hit.passage.title, hit.passage.page, hit.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Questions are trimmed and their whitespace collapsed before embedding, the
//! same way passages were at build time.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::models::RetrievedPassage;
use crate::storage::KnowledgeBase;
use crate::store::{Metric, StoreError};

/// Number of passages returned when a query does not set `top_k`.
pub const DEFAULT_TOP_K: usize = 5;

/// Errors that can occur during query processing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Vector store rejected the query (dimension, degenerate vector)
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// Provider does not match the knowledge base it is queried against
    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Invalid query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Search query parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// The question text (whitespace-normalized, then embedded)
    pub question: String,

    /// Ranking metric
    pub metric: Metric,

    /// Maximum number of passages to return
    pub top_k: usize,
}

impl SearchQuery {
    /// Create a new search query.
    ///
    /// # Arguments
    /// * `question` - The question text
    /// * `metric` - Ranking metric (default: cosine similarity)
    /// * `top_k` - Maximum number of results (default: 5)
    pub fn new(question: String, metric: Option<Metric>, top_k: Option<usize>) -> Self {
        Self {
            question,
            metric: metric.unwrap_or_default(),
            top_k: top_k.unwrap_or(DEFAULT_TOP_K),
        }
    }
}

/// Trait for search engines over a knowledge base.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a query and return ranked passages, best first.
    ///
    /// # Errors
    /// Returns `QueryError` if the question cannot be embedded or ranked
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<RetrievedPassage>>;
}

/// Search engine over a loaded [`KnowledgeBase`].
///
/// The knowledge base is shared behind an `Arc`; any number of searches may
/// run against it concurrently.
pub struct KnowledgeBaseSearchEngine<E>
where
    E: EmbeddingProvider,
{
    embedding_provider: E,
    kb: Arc<KnowledgeBase>,
}

impl<E> KnowledgeBaseSearchEngine<E>
where
    E: EmbeddingProvider,
{
    /// Create a search engine, checking the provider against the stored config.
    ///
    /// # Errors
    /// Returns `QueryError::ConfigMismatch` if the provider's dimension differs
    /// from the knowledge base's. A differing model name with the same
    /// dimension is only logged.
    pub fn new(embedding_provider: E, kb: Arc<KnowledgeBase>) -> QueryResult<Self> {
        if embedding_provider.dimension() != kb.config.dimension {
            return Err(QueryError::ConfigMismatch(format!(
                "provider '{}' produces {}-dimensional vectors but the knowledge base was built with '{}' ({} dimensions)",
                embedding_provider.model_name(),
                embedding_provider.dimension(),
                kb.config.model_name,
                kb.config.dimension
            )));
        }

        if embedding_provider.model_name() != kb.config.model_name {
            tracing::warn!(
                provider = embedding_provider.model_name(),
                stored = %kb.config.model_name,
                "Query model differs from build model; rankings may be meaningless"
            );
        }

        Ok(Self {
            embedding_provider,
            kb,
        })
    }

    /// The knowledge base being searched.
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Passage texts for the best matches, ready to paste into a prompt.
    pub async fn context_passages(&self, query: &SearchQuery) -> QueryResult<Vec<String>> {
        Ok(self
            .search(query)
            .await?
            .into_iter()
            .map(|hit| hit.passage.content)
            .collect())
    }
}

#[async_trait]
impl<E> SearchEngine for KnowledgeBaseSearchEngine<E>
where
    E: EmbeddingProvider,
{
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<RetrievedPassage>> {
        let normalized = normalize_text(&query.question);
        if normalized.is_empty() {
            return Err(QueryError::InvalidQuery("Question cannot be empty".to_string()));
        }

        let query_embedding = self
            .embedding_provider
            .embed(&normalized)
            .await
            .map_err(|e| QueryError::EmbeddingError(e.to_string()))?;

        let hits = self
            .kb
            .store
            .retrieve_scored(&query_embedding, query.metric, query.top_k)?;

        tracing::debug!(
            metric = %query.metric,
            top_k = query.top_k,
            hits = hits.len(),
            "Ranked knowledge base"
        );

        hits.into_iter()
            .enumerate()
            .map(|(rank, hit)| {
                let index = *hit.payload;
                // only reachable for a knowledge base assembled without validate()
                let passage = self.kb.passage(index).cloned().ok_or_else(|| {
                    QueryError::InvalidQuery(format!("payload {} has no passage", index))
                })?;
                Ok(RetrievedPassage::new(rank + 1, index, passage, hit.score, query.metric))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::models::{EmbeddingConfig, Passage, RelevanceLevel};
    use crate::store::VectorStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock provider answering from a fixed question -> vector table.
    struct MockEmbeddingProvider {
        dimension: usize,
        model_name: String,
        vectors: HashMap<String, Vec<f32>>,
        calls: Arc<Mutex<Vec<String>>>,
        should_fail: bool,
    }

    impl MockEmbeddingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                model_name: "mock-model".to_string(),
                vectors: HashMap::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
                should_fail: false,
            }
        }

        fn answer(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        fn with_failure(mut self) -> Self {
            self.should_fail = true;
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.should_fail {
                return Err(EmbeddingError::ApiError("Mock embedding failure".to_string()));
            }
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::InvalidInput(format!("no vector for '{}'", text)))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }

    fn create_test_kb() -> Arc<KnowledgeBase> {
        let passages = vec![
            Passage::new("Digital Democracy", "Digital democracy refers to...", 2),
            Passage::new("Participatory Budgeting", "PB involves citizens...", 14),
            Passage::new("Collective Intelligence", "Collective intelligence is...", 15),
            Passage::new("Digital Twins", "A digital twin is...", 26),
        ];
        let mut store = VectorStore::new(3).unwrap();
        store.insert(vec![1.0, 0.0, 0.0], 0).unwrap();
        store.insert(vec![0.8, 0.6, 0.0], 1).unwrap();
        store.insert(vec![0.0, 1.0, 0.0], 2).unwrap();
        store.insert(vec![0.0, 0.0, 2.0], 3).unwrap();

        let config = EmbeddingConfig {
            model_name: "mock-model".to_string(),
            dimension: 3,
        };
        Arc::new(KnowledgeBase::new(config, passages, store).unwrap())
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new("test query".to_string(), None, None);
        assert_eq!(query.top_k, 5);
        assert_eq!(query.metric, Metric::CosineSimilarity);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = KnowledgeBaseSearchEngine::new(MockEmbeddingProvider::new(768), create_test_kb());
        match result {
            Err(QueryError::ConfigMismatch(msg)) => {
                assert!(msg.contains("768"));
                assert!(msg.contains("3 dimensions"));
            }
            _ => panic!("Expected ConfigMismatch"),
        }
    }

    #[tokio::test]
    async fn test_cosine_search_resolves_passages() {
        let provider = MockEmbeddingProvider::new(3).answer("What is PB?", vec![1.0, 0.0, 0.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let query = SearchQuery::new("What is PB?".to_string(), None, Some(2));
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[0].passage.title, "Digital Democracy");
        assert_eq!(results[0].relevance, Some(RelevanceLevel::Identical));
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].passage.page, 14);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_question_whitespace_is_collapsed_before_embedding() {
        let provider = MockEmbeddingProvider::new(3).answer("Digital TWINS", vec![0.0, 0.0, 1.0]);
        let calls = Arc::clone(&provider.calls);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let query = SearchQuery::new("  Digital\n  TWINS ".to_string(), None, Some(1));
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results[0].passage.title, "Digital Twins");
        assert_eq!(*calls.lock().unwrap(), vec!["Digital TWINS".to_string()]);
    }

    #[tokio::test]
    async fn test_metric_changes_ranking() {
        let provider = MockEmbeddingProvider::new(3).answer("q", vec![0.0, 0.0, 1.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        // inner product rewards the long [0,0,2] vector, L2 punishes it
        let ip = engine
            .search(&SearchQuery::new("q".to_string(), Some(Metric::InnerProduct), Some(1)))
            .await
            .unwrap();
        assert_eq!(ip[0].index, 3);
        assert_eq!(ip[0].score, 2.0);
        assert!(ip[0].relevance.is_none());

        let l2 = engine
            .search(&SearchQuery::new("q".to_string(), Some(Metric::EuclideanDistance), Some(4)))
            .await
            .unwrap();
        assert_eq!(l2[0].index, 3);
        assert_eq!(l2[0].score, 1.0);
        assert!(l2.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus() {
        let provider = MockEmbeddingProvider::new(3).answer("q", vec![1.0, 1.0, 1.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let results = engine
            .search(&SearchQuery::new("q".to_string(), None, Some(50)))
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_context_passages() {
        let provider = MockEmbeddingProvider::new(3).answer("q", vec![0.0, 1.0, 0.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let texts = engine
            .context_passages(&SearchQuery::new("q".to_string(), None, Some(1)))
            .await
            .unwrap();
        assert_eq!(texts, vec!["Collective intelligence is...".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let provider = MockEmbeddingProvider::new(3);
        let calls = Arc::clone(&provider.calls);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let result = engine.search(&SearchQuery::new("   ".to_string(), None, None)).await;
        assert!(matches!(result, Err(QueryError::InvalidQuery(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_error_propagation() {
        let provider = MockEmbeddingProvider::new(3).with_failure();
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let result = engine.search(&SearchQuery::new("test".to_string(), None, None)).await;
        match result.unwrap_err() {
            QueryError::EmbeddingError(_) => {}
            other => panic!("Expected EmbeddingError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_query_vector_under_cosine() {
        let provider = MockEmbeddingProvider::new(3).answer("zero", vec![0.0, 0.0, 0.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let result = engine.search(&SearchQuery::new("zero".to_string(), None, None)).await;
        assert!(matches!(
            result,
            Err(QueryError::StoreError(StoreError::DegenerateVector(_)))
        ));

        // the same vector is fine under L2
        let result = engine
            .search(&SearchQuery::new("zero".to_string(), Some(Metric::EuclideanDistance), Some(1)))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].index < 3, "the long [0,0,2] vector is farthest from the origin");
    }

    #[tokio::test]
    async fn test_provider_returning_wrong_length() {
        let provider = MockEmbeddingProvider::new(3).answer("short", vec![1.0, 0.0]);
        let engine = KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap();

        let result = engine.search(&SearchQuery::new("short".to_string(), None, None)).await;
        assert!(matches!(
            result,
            Err(QueryError::StoreError(StoreError::InvalidDimension { expected: 3, actual: 2 }))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_searches_share_knowledge_base() {
        let provider = MockEmbeddingProvider::new(3).answer("q", vec![1.0, 0.0, 0.0]);
        let engine = Arc::new(KnowledgeBaseSearchEngine::new(provider, create_test_kb()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .search(&SearchQuery::new("q".to_string(), None, Some(1)))
                        .await
                        .map(|hits| hits[0].index)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }
    }
}
