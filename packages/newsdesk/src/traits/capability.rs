//! LLM, NER and embedding capability contracts.
//!
//! Each component depends on one narrow contract so any of them can be
//! swapped for a different provider or a test double.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CapabilityResult;
use crate::types::{
    answer::AnswerStyle,
    article::Article,
    claim::Entailment,
    query::Entity,
};

/// Text embedding into the same vector space as stored articles.
///
/// Implementations must be deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>>;
}

/// Outcome of a refinement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub needs_refinement: bool,

    /// The rewritten query; ignored unless `needs_refinement` is set.
    pub refined_text: Option<String>,
}

impl Refinement {
    /// The query is fine as written.
    pub fn unchanged() -> Self {
        Self {
            needs_refinement: false,
            refined_text: None,
        }
    }

    /// The query should be replaced by `text`.
    pub fn rewrite(text: impl Into<String>) -> Self {
        Self {
            needs_refinement: true,
            refined_text: Some(text.into()),
        }
    }
}

/// Decides whether a query needs rewriting into formal news terminology.
#[async_trait]
pub trait QueryRefinement: Send + Sync {
    async fn refine(&self, query: &str) -> CapabilityResult<Refinement>;
}

/// Finds named entities in text.
///
/// Implemented by both the LLM capability and deterministic NER.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    async fn extract_entities(&self, text: &str) -> CapabilityResult<Vec<Entity>>;
}

/// Judges whether an article is relevant to this specific query.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn judge_relevance(&self, query: &str, article: &Article) -> CapabilityResult<bool>;
}

/// Judges whether an article supports, contradicts, or is neutral to a claim.
#[async_trait]
pub trait EntailmentJudge: Send + Sync {
    async fn entail(&self, claim: &str, article: &Article) -> CapabilityResult<Entailment>;
}

/// Drafts the answer body and splits it into atomic claims.
///
/// Drafting happens outside the core; this is its interface.
#[async_trait]
pub trait AnswerDrafter: Send + Sync {
    /// Write an answer to `query` from `articles`, formatted as `style`.
    async fn draft(
        &self,
        query: &str,
        style: AnswerStyle,
        articles: &[Arc<Article>],
    ) -> CapabilityResult<String>;

    /// Split a drafted body into atomic factual claims.
    async fn extract_claims(&self, body: &str) -> CapabilityResult<Vec<String>>;
}
