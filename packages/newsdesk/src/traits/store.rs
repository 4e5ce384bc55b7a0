//! Read-only access to the article corpus and its vector index.

use async_trait::async_trait;

use crate::error::CapabilityResult;
use crate::types::article::{Article, ArticleId};

/// Article store. The pipeline never writes through this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch articles by id. Unknown ids are skipped, not errors.
    async fn find_articles_by_ids(&self, ids: &[ArticleId]) -> CapabilityResult<Vec<Article>>;
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub article_id: ArticleId,
    pub score: f32,
}

impl VectorHit {
    pub fn new(article_id: impl Into<ArticleId>, score: f32) -> Self {
        Self {
            article_id: article_id.into(),
            score,
        }
    }
}

/// Nearest-neighbour search over article embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` hits ordered by similarity (highest first).
    async fn search(&self, embedding: &[f32], top_k: usize) -> CapabilityResult<Vec<VectorHit>>;
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
