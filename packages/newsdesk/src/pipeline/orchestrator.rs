//! The Orchestrator - main entry point for the newsdesk library.
//!
//! Sequences one run per query:
//! refine, extract entities, retrieve, filter, select style, draft, verify.
//! Each run owns its values outright; nothing is carried between runs.
//!
//! # Example
//!
//! ```rust,ignore
//! let llm = Arc::new(OpenAI::from_env()?);
//! let store = Arc::new(MemoryStore::new());
//!
//! let orchestrator = Orchestrator::builder(PipelineConfig::default())
//!     .embedder(llm.clone())
//!     .vector_index(store.clone())
//!     .document_store(store)
//!     .llm(llm)
//!     .build()?;
//!
//! let record = orchestrator
//!     .run("What happened to CEB restructuring process?", &SearchFilter::new())
//!     .await?;
//! ```

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    entities::{EntityExtractor, RuleBasedNer},
    refine::QueryRefiner,
    relevance::RelevanceFilter,
    resilience::call_with_retry,
    retrieve::Retriever,
    style::StyleSelector,
    verify::{split_claims, FactVerifier},
};
use crate::error::{PipelineError, Result};
use crate::traits::{
    capability::{
        AnswerDrafter, Embedder, EntailmentJudge, EntityRecognizer, QueryRefinement,
        RelevanceJudge,
    },
    store::{DocumentStore, VectorIndex},
};
use crate::types::{
    answer::{AnswerRecord, AnswerStyle, Degradation, FilterReport},
    article::Article,
    candidate::CandidateSummary,
    config::{EntityStrategy, PipelineConfig, ResilienceConfig, SearchFilter},
    query::Query,
};

/// Runs the full pipeline for one query at a time.
///
/// Shared capabilities are read-only, so one orchestrator can serve
/// concurrent runs.
pub struct Orchestrator {
    refiner: QueryRefiner,
    extractor: EntityExtractor,
    retriever: Retriever,
    filter: RelevanceFilter,
    selector: StyleSelector,
    verifier: FactVerifier,
    drafter: Arc<dyn AnswerDrafter>,
    resilience: ResilienceConfig,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn builder(config: PipelineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for `raw_query`.
    pub async fn run(&self, raw_query: &str, filter: &SearchFilter) -> Result<AnswerRecord> {
        self.run_with_cancel(raw_query, filter, CancellationToken::new())
            .await
    }

    /// Run with cancellation support.
    ///
    /// Cancelling drops whichever stage is in flight, including its
    /// concurrent sub-calls. No partial record is returned.
    pub async fn run_with_cancel(
        &self,
        raw_query: &str,
        filter: &SearchFilter,
        cancel: CancellationToken,
    ) -> Result<AnswerRecord> {
        let run_id = Uuid::now_v7();
        let span = info_span!("pipeline_run", %run_id);

        async {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Pipeline run cancelled");
                    Err(PipelineError::Cancelled)
                }
                result = self.execute(raw_query, filter) => result,
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, raw_query: &str, filter: &SearchFilter) -> Result<AnswerRecord> {
        let query = Query::new(raw_query)?;
        let mut degradations = Vec::new();

        let (query, degradation) = self.refiner.refine(query).await;
        degradations.extend(degradation);
        let search_text = query.search_text().to_string();

        let (entities, degradation) = self.extractor.extract(&search_text).await;
        degradations.extend(degradation);

        let candidates = self
            .retriever
            .retrieve(&search_text, &entities, filter)
            .await?;

        if candidates.is_empty() {
            info!(query = %search_text, "No candidates retrieved, insufficient evidence");
            return Ok(AnswerRecord::insufficient_evidence(
                &query,
                entities,
                Vec::new(),
                FilterReport::default(),
                degradations,
            ));
        }

        let outcome = self
            .filter
            .filter(&search_text, !entities.is_empty(), candidates)
            .await;
        degradations.extend(outcome.degradation.clone());
        let summaries: Vec<CandidateSummary> =
            outcome.candidates.iter().map(CandidateSummary::from).collect();

        if !outcome.has_evidence() {
            info!(
                query = %search_text,
                dropped = outcome.report.dropped,
                "All candidates filtered out, insufficient evidence"
            );
            return Ok(AnswerRecord::insufficient_evidence(
                &query,
                entities,
                summaries,
                outcome.report,
                degradations,
            ));
        }

        let kept: Vec<Arc<Article>> = outcome.kept().map(|c| c.article.clone()).collect();
        let style = self.selector.select(&search_text, kept.len());
        debug!(style = %style, kept = kept.len(), "Style selected");

        let (body_text, claims) = match self.draft(&search_text, style, &kept).await {
            Ok(body) => {
                let (claim_texts, degradation) = self.claims_from(&body).await;
                degradations.extend(degradation);
                let (claims, degradation) = self.verifier.verify(claim_texts, &kept).await;
                degradations.extend(degradation);
                (Some(body), claims)
            }
            Err(degradation) => {
                degradations.push(degradation);
                (None, Vec::new())
            }
        };

        info!(
            style = %style,
            kept = kept.len(),
            claims = claims.len(),
            degradations = degradations.len(),
            "Pipeline run complete"
        );

        Ok(AnswerRecord {
            query: query.raw_text().to_string(),
            refined_query: search_text,
            needs_refinement: query.needs_refinement(),
            entities,
            style,
            body_text,
            claims,
            candidates_used: summaries,
            filter: outcome.report,
            insufficient_evidence: false,
            degradations,
            generated_at: chrono::Utc::now(),
        })
    }

    async fn draft(
        &self,
        query: &str,
        style: AnswerStyle,
        kept: &[Arc<Article>],
    ) -> std::result::Result<String, Degradation> {
        call_with_retry(&self.resilience, "draft", || {
            self.drafter.draft(query, style, kept)
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "Drafting unavailable");
            Degradation::DraftingUnavailable {
                detail: e.to_string(),
            }
        })
    }

    /// Claims from the drafter, falling back to local sentence splitting.
    async fn claims_from(&self, body: &str) -> (Vec<String>, Option<Degradation>) {
        let outcome = call_with_retry(&self.resilience, "extract_claims", || {
            self.drafter.extract_claims(body)
        })
        .await;

        match outcome {
            Ok(claims) => (
                claims
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                None,
            ),
            Err(e) => {
                warn!(error = %e, "Claim extraction unavailable, splitting locally");
                (
                    split_claims(body),
                    Some(Degradation::ClaimExtractionUnavailable {
                        detail: e.to_string(),
                    }),
                )
            }
        }
    }
}

/// Assembles an [`Orchestrator`] from its capabilities.
pub struct OrchestratorBuilder {
    config: PipelineConfig,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    store: Option<Arc<dyn DocumentStore>>,
    refiner: Option<Arc<dyn QueryRefinement>>,
    recognizer: Option<Arc<dyn EntityRecognizer>>,
    ner: Option<Arc<dyn EntityRecognizer>>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    entailment: Option<Arc<dyn EntailmentJudge>>,
    drafter: Option<Arc<dyn AnswerDrafter>>,
}

impl OrchestratorBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            embedder: None,
            index: None,
            store: None,
            refiner: None,
            recognizer: None,
            ner: None,
            judge: None,
            entailment: None,
            drafter: None,
        }
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use one LLM for every model-backed decision.
    pub fn llm<L>(mut self, llm: Arc<L>) -> Self
    where
        L: QueryRefinement
            + EntityRecognizer
            + RelevanceJudge
            + EntailmentJudge
            + AnswerDrafter
            + 'static,
    {
        self.refiner = Some(llm.clone());
        self.recognizer = Some(llm.clone());
        self.judge = Some(llm.clone());
        self.entailment = Some(llm.clone());
        self.drafter = Some(llm);
        self
    }

    pub fn refiner(mut self, refiner: Arc<dyn QueryRefinement>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Recognizer used with [`EntityStrategy::Llm`].
    pub fn entity_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Recognizer used with [`EntityStrategy::Ner`]. Defaults to [`RuleBasedNer`].
    pub fn ner(mut self, ner: Arc<dyn EntityRecognizer>) -> Self {
        self.ner = Some(ner);
        self
    }

    pub fn relevance_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn entailment_judge(mut self, judge: Arc<dyn EntailmentJudge>) -> Self {
        self.entailment = Some(judge);
        self
    }

    pub fn drafter(mut self, drafter: Arc<dyn AnswerDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Validate the config and wire the stages.
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let config = self.config;
        let resilience = config.resilience.clone();

        let recognizer = match config.entity_strategy {
            EntityStrategy::Llm => required(self.recognizer, "entity recognizer")?,
            EntityStrategy::Ner => self
                .ner
                .unwrap_or_else(|| Arc::new(RuleBasedNer::new()) as Arc<dyn EntityRecognizer>),
        };

        Ok(Orchestrator {
            refiner: QueryRefiner::new(
                required(self.refiner, "query refiner")?,
                config.refinement_growth_limit,
                resilience.clone(),
            ),
            extractor: EntityExtractor::new(recognizer, config.entity_strategy, resilience.clone()),
            retriever: Retriever::new(
                required(self.embedder, "embedder")?,
                required(self.index, "vector index")?,
                required(self.store, "document store")?,
                config.retrieval.clone(),
                resilience.clone(),
            ),
            filter: RelevanceFilter::new(
                required(self.judge, "relevance judge")?,
                config.relevance.clone(),
                resilience.clone(),
                config.concurrency,
            ),
            selector: StyleSelector::new(),
            verifier: FactVerifier::new(
                required(self.entailment, "entailment judge")?,
                config.verification.clone(),
                resilience.clone(),
                config.concurrency,
            ),
            drafter: required(self.drafter, "answer drafter")?,
            resilience,
            config,
        })
    }
}

fn required<T: ?Sized>(value: Option<Arc<T>>, name: &str) -> Result<Arc<T>> {
    value.ok_or_else(|| PipelineError::Config(format!("{name} not configured")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestScenario;

    #[test]
    fn test_build_requires_capabilities() {
        let err = Orchestrator::builder(PipelineConfig::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let scenario = TestScenario::new();
        let result = scenario
            .builder(PipelineConfig::default().with_top_k(0))
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let orchestrator = TestScenario::new().orchestrator().unwrap();
        let err = orchestrator
            .run("   ", &SearchFilter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_pre_cancelled_run() {
        let orchestrator = TestScenario::new().orchestrator().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .run_with_cancel("CEB", &SearchFilter::new(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn test_ner_strategy_needs_no_llm_recognizer() {
        let scenario = TestScenario::new();
        let built = scenario
            .builder(PipelineConfig::default().with_entity_strategy(EntityStrategy::Ner))
            .build();
        assert!(built.is_ok());
    }
}
