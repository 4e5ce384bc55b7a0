//! Configuration types for the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::types::article::{Article, NewsSource};

/// Which entity extraction capability to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStrategy {
    /// LLM-based extraction.
    #[default]
    Llm,

    /// Deterministic named-entity recognition.
    Ner,
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub relevance: RelevanceConfig,
    pub verification: VerificationConfig,
    pub resilience: ResilienceConfig,

    /// Maximum in-flight capability calls within one stage.
    ///
    /// Default: 8.
    pub concurrency: usize,

    pub entity_strategy: EntityStrategy,

    /// Refinements longer than this multiple of the raw query are discarded.
    ///
    /// Default: 3.0.
    pub refinement_growth_limit: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            relevance: RelevanceConfig::default(),
            verification: VerificationConfig::default(),
            resilience: ResilienceConfig::default(),
            concurrency: 8,
            entity_strategy: EntityStrategy::default(),
            refinement_growth_limit: 3.0,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of candidates kept after retrieval.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.retrieval.top_k = top_k;
        self
    }

    /// Set the combined-score threshold for keeping a candidate.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.relevance.threshold = threshold;
        self
    }

    /// Set scoring weights for similarity and entity overlap.
    pub fn with_weights(mut self, similarity: f32, entity: f32) -> Self {
        self.relevance.similarity_weight = similarity;
        self.relevance.entity_weight = entity;
        self
    }

    /// Set worker concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Select the entity extraction strategy.
    pub fn with_entity_strategy(mut self, strategy: EntityStrategy) -> Self {
        self.entity_strategy = strategy;
        self
    }

    /// Set per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.resilience.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Check for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.relevance;
        for (name, w) in [
            ("similarity_weight", r.similarity_weight),
            ("entity_weight", r.entity_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(PipelineError::Config(format!(
                    "{name} must be a non-negative number, got {w}"
                )));
            }
        }
        if r.similarity_weight + r.entity_weight == 0.0 {
            return Err(PipelineError::Config("scoring weights sum to zero".into()));
        }
        if !(0.0..=1.0).contains(&r.threshold) {
            return Err(PipelineError::Config(format!(
                "threshold must be within [0, 1], got {}",
                r.threshold
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(PipelineError::Config("top_k must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".into()));
        }
        if self.verification.min_supporting_sources == 0 {
            return Err(PipelineError::Config(
                "min_supporting_sources must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for vector retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates handed to the relevance filter. Default: 5.
    pub top_k: usize,

    /// Neighbours requested from the index before trimming to `top_k`.
    ///
    /// Default: 30.
    pub search_depth: usize,

    /// Ranking bonus per unit of entity overlap when choosing the top K.
    ///
    /// Default: 0.1. Set to 0.0 to rank on similarity alone.
    pub entity_boost: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            search_depth: 30,
            entity_boost: 0.1,
        }
    }
}

/// Configuration for relevance filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    pub similarity_weight: f32,
    pub entity_weight: f32,

    /// Minimum combined score to keep a candidate. Default: 0.4.
    pub threshold: f32,

    /// Ask the relevance judgment capability about each candidate.
    ///
    /// When false, filtering is score-only.
    pub use_llm_judgment: bool,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.5,
            entity_weight: 0.5,
            threshold: 0.4,
            use_llm_judgment: true,
        }
    }
}

/// Configuration for fact verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Fully supporting articles needed for `Verified`.
    ///
    /// Claims with less full support (but some support) are
    /// `PartiallyVerified`. Default: 1.
    pub min_supporting_sources: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            min_supporting_sources: 1,
        }
    }
}

/// Timeouts and retry for external capability calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub call_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 20_000,
            retry_backoff_ms: 250,
        }
    }
}

impl ResilienceConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Restricts which articles a run may use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Only these outlets (empty = all).
    #[serde(default)]
    pub sources: Vec<NewsSource>,

    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
}

impl SearchFilter {
    /// Create a new empty filter (matches all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to specific outlets.
    pub fn for_sources(sources: impl IntoIterator<Item = NewsSource>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_published_after(mut self, date: DateTime<Utc>) -> Self {
        self.published_after = Some(date);
        self
    }

    pub fn with_published_before(mut self, date: DateTime<Utc>) -> Self {
        self.published_before = Some(date);
        self
    }

    /// Check if an article passes this filter.
    pub fn matches(&self, article: &Article) -> bool {
        if !self.sources.is_empty() && !self.sources.contains(&article.source) {
            return false;
        }
        if let Some(after) = self.published_after {
            if article.published_at < after {
                return false;
            }
        }
        if let Some(before) = self.published_before {
            if article.published_at > before {
                return false;
            }
        }
        true
    }
}
