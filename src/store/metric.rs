//! Similarity and distance metrics used to rank stored vectors.
//!
//! Three metrics are supported, and they do not all sort the same way:
//!
//! | Metric | Score | Better is |
//! |---|---|---|
//! | `EuclideanDistance` | L2 norm of `a - b` | smaller |
//! | `CosineSimilarity` | `dot(a, b) / (‖a‖ · ‖b‖)` | larger |
//! | `InnerProduct` | `dot(a, b)` | larger |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::StoreError;

/// Metric used to score a query vector against stored vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean (L2) distance, ranked ascending.
    EuclideanDistance,

    /// Cosine of the angle between the vectors, ranked descending.
    #[default]
    CosineSimilarity,

    /// Raw dot product, ranked descending.
    InnerProduct,
}

impl Metric {
    /// All supported metrics.
    pub const ALL: [Metric; 3] = [
        Metric::EuclideanDistance,
        Metric::CosineSimilarity,
        Metric::InnerProduct,
    ];

    /// Short identifier accepted by [`Metric::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::EuclideanDistance => "l2",
            Metric::CosineSimilarity => "cos",
            Metric::InnerProduct => "ip",
        }
    }

    /// Whether a larger score means a closer match.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::EuclideanDistance)
    }

    /// Order two scores so that the better one comes first.
    ///
    /// Uses `total_cmp`, so the ordering is total even for NaN scores.
    pub fn rank_order(&self, a: f32, b: f32) -> Ordering {
        if self.higher_is_better() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    /// Score a stored vector against a query vector.
    ///
    /// Both slices must have the same length; the store checks this before
    /// calling. For cosine similarity the caller is expected to have rejected a
    /// zero-norm query already (see [`check_query`](Self::check_query)); a
    /// zero-norm *stored* vector scores `0.0`.
    pub fn score(&self, query: &[f32], stored: &[f32]) -> f32 {
        match self {
            Metric::EuclideanDistance => euclidean_distance(query, stored),
            Metric::CosineSimilarity => cosine_similarity(query, stored).unwrap_or(0.0),
            Metric::InnerProduct => inner_product(query, stored),
        }
    }

    /// Reject query vectors this metric cannot score.
    ///
    /// # Errors
    /// Returns `StoreError::DegenerateVector` for a zero-norm query under
    /// cosine similarity.
    pub fn check_query(&self, query: &[f32]) -> Result<(), StoreError> {
        if *self == Metric::CosineSimilarity && l2_norm(query) == 0.0 {
            return Err(StoreError::DegenerateVector(
                "cosine similarity is undefined for a zero-norm query vector".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" | "euclidean_distance" => Ok(Metric::EuclideanDistance),
            "cos" | "cosine" | "cosine_similarity" => Ok(Metric::CosineSimilarity),
            "ip" | "inner" | "dot" | "inner_product" => Ok(Metric::InnerProduct),
            _ => Err(StoreError::UnknownMetric(s.to_string())),
        }
    }
}

/// Dot product of two equal-length vectors.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    dot_f64(a, b) as f32
}

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// L2 distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Cosine similarity between two equal-length vectors, clamped to `[-1, 1]`.
///
/// Returns `None` when either vector has zero norm, since the similarity is
/// undefined there.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    let norm_a = norm_f64(a);
    let norm_b = norm_f64(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot_f64(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32)
}

// f32 components squared overflow past ~1.8e19; accumulate in f64.
fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
}

fn norm_f64(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}
