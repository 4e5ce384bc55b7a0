//! The query pipeline - the core of the library.
//!
//! Stages, in run order:
//! - Query refinement
//! - Entity extraction (LLM or deterministic NER)
//! - Vector retrieval with entity overlap
//! - Relevance filtering (combined score plus judgment)
//! - Style selection
//! - Claim verification against kept articles

pub mod entities;
pub mod orchestrator;
pub mod prompts;
pub mod refine;
pub mod relevance;
pub mod resilience;
pub mod retrieve;
pub mod style;
pub mod verify;

pub use entities::{normalize_entities, EntityExtractor, RuleBasedNer};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use refine::QueryRefiner;
pub use relevance::{FilterOutcome, RelevanceFilter};
pub use resilience::call_with_retry;
pub use retrieve::{entity_overlap, Retriever};
pub use style::StyleSelector;
pub use verify::{aggregate, split_claims, FactVerifier};
