//! Scholar KB - an in-memory vector knowledge base over a scholar's publications.
//!
//! This library holds the retrieval core of a conversational "digital twin":
//! passages from the scholar's papers are embedded once, stored with their
//! corpus position in an exhaustive-scan vector store, and ranked against a
//! question under a choice of metric.
//!
//! # Architecture
//!
//! - **store**: `VectorStore` with Euclidean, cosine and inner-product ranking,
//!   plus byte-stream persistence
//! - **models**: Passages, embedding configuration and query results
//! - **embedding**: Embedding provider trait and implementations (FastEmbed, OpenAI)
//! - **provider**: Passage corpus sources (JSON file, directory of summaries)
//! - **ingestion**: Index builder that embeds a corpus and saves it atomically
//! - **storage**: `KnowledgeBase` file holding config, corpus and store together
//! - **query**: Question embedding, ranking and passage resolution
//!
//! # Workflow
//!
//! ## Offline Build
//!
//! 1. Load the passage corpus from a provider
//! 2. Normalize and embed every passage, in corpus order
//! 3. Insert each vector with its corpus position as payload
//! 4. Save config, corpus and store to one file, replacing the old one atomically
//!
//! ## Query
//!
//! 1. Load the knowledge base and a matching embedding provider
//! 2. Normalize and embed the question
//! 3. Rank all stored vectors under the chosen metric
//! 4. Resolve the top-k payloads back into passages
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scholar_kb::{
//!     embedding::fastembed::FastEmbedProvider,
//!     ingestion::IndexBuilder,
//!     query::{KnowledgeBaseSearchEngine, SearchEngine, SearchQuery},
//!     storage::KnowledgeBase,
//!     Passage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let passages = vec![Passage::new("Participatory Budgeting", "PB involves citizens...", 14)];
//!     let builder = IndexBuilder::new(FastEmbedProvider::new(None, None)?);
//!     builder.build_and_persist(passages, "kb.bin").await?;
//!
//!     let kb = Arc::new(KnowledgeBase::load("kb.bin")?);
//!     let engine = KnowledgeBaseSearchEngine::new(FastEmbedProvider::new(None, None)?, kb)?;
//!     let query = SearchQuery::new("Who decides on the budget?".to_string(), None, Some(3));
//!     for hit in engine.search(&query).await? {
//!         println!("{}: {:.3}", hit.passage.title, hit.score);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod embedding;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;
pub mod store;

pub use embedding::EmbeddingProvider;
pub use ingestion::{BuildStats, IndexBuilder};
pub use models::{EmbeddingConfig, Passage, RelevanceLevel, RetrievedPassage};
pub use provider::PassageProvider;
pub use query::{KnowledgeBaseSearchEngine, SearchEngine, SearchQuery};
pub use storage::KnowledgeBase;
pub use store::{Metric, StoreError, VectorStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default knowledge base file name
pub const DEFAULT_KB_FILE: &str = "knowledge_base.skb";
