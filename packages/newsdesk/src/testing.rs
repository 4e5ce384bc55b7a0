//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the newsdesk library
//! without making real model or network calls. Every double is
//! deterministic: identical inputs give identical outputs.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{CapabilityError, CapabilityResult, Result};
use crate::pipeline::{
    entities::RuleBasedNer,
    orchestrator::{Orchestrator, OrchestratorBuilder},
    verify::split_claims,
};
use crate::stores::MemoryStore;
use crate::traits::{
    capability::{
        AnswerDrafter, Embedder, EntailmentJudge, EntityRecognizer, QueryRefinement, Refinement,
        RelevanceJudge,
    },
    store::{VectorHit, VectorIndex},
};
use crate::types::{
    answer::AnswerStyle,
    article::{Article, ArticleId, NewsSource},
    claim::Entailment,
    config::PipelineConfig,
    query::Entity,
};

// =============================================================================
// MockLlm
// =============================================================================

/// A mock for every model-backed capability.
///
/// Scripted responses win; otherwise each call has a deterministic default:
/// - `refine`: no refinement needed
/// - `extract_entities`: [`RuleBasedNer`]
/// - `judge_relevance`: relevant
/// - `entail`: `Supports` when the claim quotes the article title, else `Neutral`
/// - `draft`: one line per article, shaped by the style
/// - `extract_claims`: local sentence splitting
#[derive(Clone, Default)]
pub struct MockLlm {
    refinements: HashMap<String, Refinement>,
    entities: HashMap<String, Vec<Entity>>,
    relevance: HashMap<ArticleId, bool>,
    entailments: HashMap<(String, ArticleId), Entailment>,
    draft: Option<String>,
    claims: Option<Vec<String>>,
    failing: HashSet<&'static str>,
    failing_articles: HashSet<(&'static str, ArticleId)>,
    delay: Option<Duration>,
    calls: CallLog,
    in_flight: Arc<InFlight>,
}

/// Calls currently inside the mock, and the most seen at once.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Leaves the in-flight count when dropped, including on cancellation.
struct InFlightGuard<'a>(&'a InFlight);

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a InFlight) -> Self {
        let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.peak.fetch_max(now, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Record of a call made to the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Refine { query: String },
    ExtractEntities { text: String },
    JudgeRelevance { article_id: ArticleId },
    Entail { claim: String, article_id: ArticleId },
    Draft { style: AnswerStyle, article_count: usize },
    ExtractClaims { body_len: usize },
}

impl MockCall {
    /// Operation name, as used by [`MockLlm::failing`].
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Refine { .. } => "refine",
            Self::ExtractEntities { .. } => "extract_entities",
            Self::JudgeRelevance { .. } => "judge_relevance",
            Self::Entail { .. } => "entail",
            Self::Draft { .. } => "draft",
            Self::ExtractClaims { .. } => "extract_claims",
        }
    }
}

/// Shared call history. Clones see the same history.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<MockCall>>>);

impl CallLog {
    async fn record(&self, call: MockCall) {
        self.0.lock().await.push(call);
    }

    /// Get all calls made so far.
    pub async fn all(&self) -> Vec<MockCall> {
        self.0.lock().await.clone()
    }

    /// Number of calls to `operation`.
    pub async fn count(&self, operation: &str) -> usize {
        self.0
            .lock()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the refinement for a raw query.
    pub fn with_refinement(mut self, query: impl Into<String>, refinement: Refinement) -> Self {
        self.refinements.insert(query.into(), refinement);
        self
    }

    /// Script the entities for a text.
    pub fn with_entities(mut self, text: impl Into<String>, entities: Vec<Entity>) -> Self {
        self.entities.insert(text.into(), entities);
        self
    }

    /// Script the relevance judgment for an article.
    pub fn with_relevance(mut self, article_id: impl Into<ArticleId>, relevant: bool) -> Self {
        self.relevance.insert(article_id.into(), relevant);
        self
    }

    /// Script the entailment of a claim by an article.
    pub fn with_entailment(
        mut self,
        claim: impl Into<String>,
        article_id: impl Into<ArticleId>,
        entailment: Entailment,
    ) -> Self {
        self.entailments
            .insert((claim.into(), article_id.into()), entailment);
        self
    }

    /// Script the drafted body.
    pub fn with_draft(mut self, body: impl Into<String>) -> Self {
        self.draft = Some(body.into());
        self
    }

    /// Script the claims extracted from any body.
    pub fn with_claims(mut self, claims: Vec<String>) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Make every call to `operation` fail.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Make `operation` fail only for one article (relevance and entailment).
    pub fn failing_for(mut self, operation: &'static str, article_id: impl Into<ArticleId>) -> Self {
        self.failing_articles.insert((operation, article_id.into()));
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle on the call history, usable after the mock is moved.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Most calls that were inside the mock at the same time.
    ///
    /// Shared across clones. Only meaningful with [`MockLlm::with_delay`].
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: MockCall, article_id: Option<&ArticleId>) -> CapabilityResult<()> {
        let operation = call.operation();
        self.calls.record(call).await;
        if let Some(delay) = self.delay {
            let _guard = InFlightGuard::enter(&self.in_flight);
            tokio::time::sleep(delay).await;
        }

        let fails_for_article = article_id
            .map(|id| self.failing_articles.contains(&(operation, id.clone())))
            .unwrap_or(false);
        if self.failing.contains(operation) || fails_for_article {
            return Err(CapabilityError::unavailable(format!(
                "mock {operation} failure"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl QueryRefinement for MockLlm {
    async fn refine(&self, query: &str) -> CapabilityResult<Refinement> {
        self.enter(MockCall::Refine { query: query.into() }, None)
            .await?;
        Ok(self
            .refinements
            .get(query)
            .cloned()
            .unwrap_or_else(Refinement::unchanged))
    }
}

#[async_trait]
impl EntityRecognizer for MockLlm {
    async fn extract_entities(&self, text: &str) -> CapabilityResult<Vec<Entity>> {
        self.enter(MockCall::ExtractEntities { text: text.into() }, None)
            .await?;
        Ok(self
            .entities
            .get(text)
            .cloned()
            .unwrap_or_else(|| RuleBasedNer::new().recognize(text)))
    }
}

#[async_trait]
impl RelevanceJudge for MockLlm {
    async fn judge_relevance(&self, _query: &str, article: &Article) -> CapabilityResult<bool> {
        self.enter(
            MockCall::JudgeRelevance {
                article_id: article.id.clone(),
            },
            Some(&article.id),
        )
        .await?;
        Ok(self.relevance.get(&article.id).copied().unwrap_or(true))
    }
}

#[async_trait]
impl EntailmentJudge for MockLlm {
    async fn entail(&self, claim: &str, article: &Article) -> CapabilityResult<Entailment> {
        self.enter(
            MockCall::Entail {
                claim: claim.into(),
                article_id: article.id.clone(),
            },
            Some(&article.id),
        )
        .await?;

        if let Some(e) = self.entailments.get(&(claim.to_string(), article.id.clone())) {
            return Ok(*e);
        }
        let title = clean_title(article).to_lowercase();
        if !title.is_empty() && claim.to_lowercase().contains(&title) {
            Ok(Entailment::Supports)
        } else {
            Ok(Entailment::Neutral)
        }
    }
}

#[async_trait]
impl AnswerDrafter for MockLlm {
    async fn draft(
        &self,
        _query: &str,
        style: AnswerStyle,
        articles: &[Arc<Article>],
    ) -> CapabilityResult<String> {
        self.enter(
            MockCall::Draft {
                style,
                article_count: articles.len(),
            },
            None,
        )
        .await?;
        Ok(self
            .draft
            .clone()
            .unwrap_or_else(|| default_draft(style, articles)))
    }

    async fn extract_claims(&self, body: &str) -> CapabilityResult<Vec<String>> {
        self.enter(
            MockCall::ExtractClaims {
                body_len: body.len(),
            },
            None,
        )
        .await?;
        Ok(self.claims.clone().unwrap_or_else(|| split_claims(body)))
    }
}

/// One line (or sentence) per article, in the given order.
fn default_draft(style: AnswerStyle, articles: &[Arc<Article>]) -> String {
    match style {
        AnswerStyle::EventList => articles
            .iter()
            .map(|a| format!("- {}: {}.", a.published_at.format("%Y-%m-%d"), clean_title(a)))
            .collect::<Vec<_>>()
            .join("\n"),
        AnswerStyle::BulletPoints => articles
            .iter()
            .map(|a| format!("- {}.", clean_title(a)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => articles
            .iter()
            .map(|a| format!("According to {}, {}.", a.source, clean_title(a)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn clean_title(article: &Article) -> &str {
    article.title.trim().trim_end_matches('.')
}

// =============================================================================
// HashEmbedder
// =============================================================================

/// Deterministic bag-of-words embedding.
///
/// Each lowercase word is hashed into one of `dim` buckets, so texts that
/// share words have positive cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Synchronous form of [`Embedder::embed`].
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for word in text.unicode_words() {
            let hash = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&hash[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dim as u64) as usize;
            vector[idx] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

// =============================================================================
// StaticIndex
// =============================================================================

/// A vector index that returns scripted hits for any embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    hits: Vec<VectorHit>,
    unreachable: bool,
}

impl StaticIndex {
    pub fn new(hits: Vec<VectorHit>) -> Self {
        Self {
            hits,
            unreachable: false,
        }
    }

    /// Fail every search as if the index were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn search(&self, _embedding: &[f32], top_k: usize) -> CapabilityResult<Vec<VectorHit>> {
        if self.unreachable {
            return Err(CapabilityError::unavailable("vector index unreachable"));
        }
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

// =============================================================================
// TestScenario
// =============================================================================

/// Builder for a complete test world: articles, index hits, and a mock LLM.
///
/// Articles are stored in a [`MemoryStore`]; the index returns the scripted
/// similarity for each article regardless of the query.
#[derive(Clone, Default)]
pub struct TestScenario {
    llm: MockLlm,
    embedder: HashEmbedder,
    articles: Vec<Article>,
    hits: Vec<VectorHit>,
    unreachable: bool,
}

impl TestScenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Five articles about the CEB restructuring, all mentioning "CEB".
    pub fn ceb_restructuring() -> Self {
        let day = |d: u32| {
            chrono::NaiveDate::from_ymd_opt(2024, 6, d)
                .and_then(|date| date.and_hms_opt(8, 0, 0))
                .map(|dt| dt.and_utc())
                .unwrap_or_default()
        };
        Self::new()
            .with_article(
                Article::new(
                    "nw-101",
                    NewsSource::NewsWire,
                    "Cabinet approves CEB restructuring plan",
                    "The Cabinet approved the plan to restructure the Ceylon Electricity Board (CEB) into separate entities.",
                    day(3),
                ),
                0.91,
            )
            .with_article(
                Article::new(
                    "nf-202",
                    NewsSource::NewsFirst,
                    "CEB unions protest restructuring",
                    "Trade unions at the CEB staged a protest against the restructuring process.",
                    day(6),
                ),
                0.88,
            )
            .with_article(
                Article::new(
                    "ad-303",
                    NewsSource::AdaDerana,
                    "Electricity bill tabled to split CEB",
                    "A new electricity bill tabled in Parliament would split the CEB into generation, transmission and distribution companies.",
                    day(10),
                ),
                0.85,
            )
            .with_article(
                Article::new(
                    "nw-104",
                    NewsSource::NewsWire,
                    "CEB restructuring to finish by year end",
                    "The Power Ministry said the CEB restructuring process would be completed by the end of the year.",
                    day(14),
                ),
                0.83,
            )
            .with_article(
                Article::new(
                    "nf-205",
                    NewsSource::NewsFirst,
                    "IMF welcomes CEB reforms",
                    "The IMF welcomed the CEB reforms as part of the energy sector programme.",
                    day(20),
                ),
                0.80,
            )
    }

    /// Add an article and the similarity the index reports for it.
    pub fn with_article(mut self, article: Article, similarity: f32) -> Self {
        self.hits.push(VectorHit::new(article.id.clone(), similarity));
        self.articles.push(article);
        self
    }

    /// Add an index hit with no stored article.
    pub fn with_dangling_hit(mut self, id: impl Into<ArticleId>, similarity: f32) -> Self {
        self.hits.push(VectorHit::new(id, similarity));
        self
    }

    pub fn with_llm(mut self, llm: MockLlm) -> Self {
        self.llm = llm;
        self
    }

    /// Make the vector index unreachable.
    pub fn with_unreachable_index(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn llm(&self) -> &MockLlm {
        &self.llm
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Orchestrator builder wired to this scenario's doubles.
    pub fn builder(&self, config: PipelineConfig) -> OrchestratorBuilder {
        let store = MemoryStore::with_articles(
            self.articles
                .iter()
                .map(|a| (a.clone(), self.embedder.embed_text(&a.title))),
        );
        let mut index = StaticIndex::new(self.hits.clone());
        if self.unreachable {
            index = index.unreachable();
        }

        Orchestrator::builder(config)
            .embedder(Arc::new(self.embedder.clone()))
            .vector_index(Arc::new(index))
            .document_store(Arc::new(store))
            .llm(Arc::new(self.llm.clone()))
    }

    /// Orchestrator with the default config.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        self.builder(PipelineConfig::default()).build()
    }
}
