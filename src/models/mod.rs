//! Core data models for the knowledge base.
//!
//! This module contains the passage records the knowledge base is built from,
//! the embedding configuration stored with a built index, and the result type
//! returned to query callers.

use serde::{Deserialize, Serialize};

use crate::store::Metric;

/// A single passage of the corpus.
///
/// Passages are static reference data: a summary chunk of one of the scholar's
/// papers, with the page (or chunk number) it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passage {
    /// Section or paper title
    pub title: String,

    /// Passage text; this is what gets embedded
    pub content: String,

    /// Source page reference
    pub page: u32,
}

impl Passage {
    /// Create a new passage.
    pub fn new(title: impl Into<String>, content: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            page,
        }
    }
}

/// Relevance classification for cosine-ranked results.
///
/// Only meaningful for cosine similarity, whose scores live in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelevanceLevel {
    /// Cosine similarity > 0.95
    Identical,

    /// Cosine similarity > 0.85
    HighlySimilar,

    /// Cosine similarity > 0.70
    Similar,

    /// Anything lower
    Relevant,
}

impl RelevanceLevel {
    /// Determine relevance level from a cosine similarity score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.95 {
            RelevanceLevel::Identical
        } else if score > 0.85 {
            RelevanceLevel::HighlySimilar
        } else if score > 0.70 {
            RelevanceLevel::Similar
        } else {
            RelevanceLevel::Relevant
        }
    }
}

/// A passage returned by a knowledge-base query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// 1-based rank in the result list
    pub rank: usize,

    /// Position of the passage in the corpus
    pub index: usize,

    /// The resolved passage
    pub passage: Passage,

    /// Metric score (distance for L2, similarity otherwise)
    pub score: f32,

    /// Relevance bucket, set only for cosine similarity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<RelevanceLevel>,
}

impl RetrievedPassage {
    /// Create a retrieved passage, classifying relevance when `metric` is cosine.
    pub fn new(rank: usize, index: usize, passage: Passage, score: f32, metric: Metric) -> Self {
        let relevance = match metric {
            Metric::CosineSimilarity => Some(RelevanceLevel::from_score(score)),
            _ => None,
        };
        Self {
            rank,
            index,
            passage,
            score,
            relevance,
        }
    }
}

/// Configuration of the embedding model a knowledge base was built with.
///
/// Stored alongside the index so query-time embeddings come from the same
/// model and dimension as build-time embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Name/identifier of the embedding model (e.g., "BGEBaseENV15")
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_level_from_score() {
        assert_eq!(RelevanceLevel::from_score(0.96), RelevanceLevel::Identical);
        assert_eq!(RelevanceLevel::from_score(0.90), RelevanceLevel::HighlySimilar);
        assert_eq!(RelevanceLevel::from_score(0.75), RelevanceLevel::Similar);
        assert_eq!(RelevanceLevel::from_score(0.60), RelevanceLevel::Relevant);
        assert_eq!(RelevanceLevel::from_score(-0.5), RelevanceLevel::Relevant);
    }

    #[test]
    fn test_relevance_only_for_cosine() {
        let passage = Passage::new("Collective Intelligence", "text", 15);
        let cos = RetrievedPassage::new(1, 0, passage.clone(), 0.9, Metric::CosineSimilarity);
        assert_eq!(cos.relevance, Some(RelevanceLevel::HighlySimilar));

        let l2 = RetrievedPassage::new(1, 0, passage, 0.9, Metric::EuclideanDistance);
        assert!(l2.relevance.is_none());
    }

    #[test]
    fn test_passage_json_shape() {
        let json = r#"{"title": "Participatory Budgeting", "content": "PB involves citizens.", "page": 14}"#;
        let passage: Passage = serde_json::from_str(json).unwrap();
        assert_eq!(passage, Passage::new("Participatory Budgeting", "PB involves citizens.", 14));
    }
}
