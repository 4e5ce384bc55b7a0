//! News Query Pipeline
//!
//! Answers natural-language questions about Sri Lankan news from a corpus of
//! scraped articles, and says how well each statement in the answer is
//! backed by those articles.
//!
//! One run per query: refine the query, extract its entities, retrieve
//! candidate articles by vector similarity, filter them for relevance, pick
//! an answer style, draft, then verify every claim of the draft against the
//! kept articles. The result is an [`AnswerRecord`].
//!
//! # Design Philosophy
//!
//! - Every model-backed decision sits behind a narrow capability trait
//! - Degraded capabilities are reported on the record, never guessed around
//! - "No evidence" is an answer; only unreachable data is an error
//! - A claim can only cite articles the filter kept
//!
//! # Usage
//!
//! ```rust,ignore
//! use newsdesk::{Orchestrator, PipelineConfig, SearchFilter};
//! use newsdesk::testing::TestScenario;
//!
//! let orchestrator = TestScenario::ceb_restructuring().orchestrator()?;
//! let record = orchestrator
//!     .run("What happened to CEB restructuring process?", &SearchFilter::new())
//!     .await?;
//!
//! for claim in record.claims_by_status() {
//!     println!("{:?}: {}", claim.status, claim.text);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability and storage contracts
//! - [`types`] - Query, article, candidate, claim and record types
//! - [`pipeline`] - The pipeline stages and the orchestrator
//! - [`stores`] - Storage implementations (MemoryStore, PineconeIndex)
//! - [`ai`] - Model-backed capabilities (OpenAI)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{CapabilityError, CapabilityResult, PipelineError, Result};
pub use pipeline::{
    EntityExtractor, FactVerifier, Orchestrator, OrchestratorBuilder, QueryRefiner,
    RelevanceFilter, Retriever, RuleBasedNer, StyleSelector,
};
pub use stores::MemoryStore;
pub use traits::{
    capability::{
        AnswerDrafter, Embedder, EntailmentJudge, EntityRecognizer, QueryRefinement, Refinement,
        RelevanceJudge,
    },
    store::{DocumentStore, VectorHit, VectorIndex},
};
pub use types::{
    answer::{AnswerRecord, AnswerStyle, Degradation, FilterReport},
    article::{Article, ArticleId, NewsSource},
    candidate::{Candidate, CandidateSummary, DropReason},
    claim::{Claim, ClaimStatus, Entailment},
    config::{
        EntityStrategy, PipelineConfig, RelevanceConfig, ResilienceConfig, RetrievalConfig,
        SearchFilter, VerificationConfig,
    },
    query::{Entity, EntityKind, Query, Span},
};

#[cfg(feature = "openai")]
pub use ai::OpenAI;

#[cfg(feature = "pinecone")]
pub use stores::PineconeIndex;
