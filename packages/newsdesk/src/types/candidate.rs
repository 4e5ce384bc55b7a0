//! Retrieval candidates and their filtering outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::article::{Article, ArticleId};

/// Why the relevance filter dropped a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// Combined score fell under the configured threshold.
    BelowThreshold { combined_score: f32, threshold: f32 },

    /// The relevance judgment said the article does not answer the query.
    JudgedIrrelevant,
}

/// An article retrieved for a query, with its scores.
///
/// The retriever sets `similarity_score` and `entity_overlap_score`; the
/// relevance filter sets `combined_score`, `kept` and `drop_reason` once.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub article: Arc<Article>,

    /// Vector similarity in `[0, 1]`.
    pub similarity_score: f32,

    /// Fraction of query entities found verbatim in the article, in `[0, 1]`.
    pub entity_overlap_score: f32,

    pub combined_score: Option<f32>,
    pub kept: bool,
    pub drop_reason: Option<DropReason>,
}

impl Candidate {
    pub fn new(article: Arc<Article>, similarity_score: f32, entity_overlap_score: f32) -> Self {
        Self {
            article,
            similarity_score: unit_score(similarity_score),
            entity_overlap_score: unit_score(entity_overlap_score),
            combined_score: None,
            kept: false,
            drop_reason: None,
        }
    }

    pub fn article_id(&self) -> &ArticleId {
        &self.article.id
    }
}

/// Clamp into `[0, 1]`; NaN and infinities count as no signal.
fn unit_score(score: f32) -> f32 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Serialized view of a candidate on the answer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub article_id: ArticleId,
    pub title: String,
    pub url: Option<String>,
    pub similarity_score: f32,
    pub entity_overlap_score: f32,
    pub combined_score: Option<f32>,
    pub kept: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_reason: Option<DropReason>,
}

impl From<&Candidate> for CandidateSummary {
    fn from(c: &Candidate) -> Self {
        Self {
            article_id: c.article.id.clone(),
            title: c.article.title.clone(),
            url: c.article.url.clone(),
            similarity_score: c.similarity_score,
            entity_overlap_score: c.entity_overlap_score,
            combined_score: c.combined_score,
            kept: c.kept,
            drop_reason: c.drop_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::article::NewsSource;
    use chrono::Utc;

    fn article() -> Arc<Article> {
        Arc::new(Article::new("nw-1", NewsSource::NewsWire, "t", "b", Utc::now()))
    }

    #[test]
    fn test_scores_are_clamped() {
        let c = Candidate::new(article(), 1.4, -0.2);
        assert_eq!(c.similarity_score, 1.0);
        assert_eq!(c.entity_overlap_score, 0.0);
    }

    #[test]
    fn test_non_finite_scores_become_zero() {
        let c = Candidate::new(article(), f32::NAN, f32::INFINITY);
        assert_eq!(c.similarity_score, 0.0);
        assert_eq!(c.entity_overlap_score, 0.0);
    }
}
