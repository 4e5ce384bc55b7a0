//! Query refinement stage.
//!
//! Asks the refinement capability whether the raw query should be rewritten
//! into formal news terminology. Never blocks the run: any failure keeps the
//! raw query and records a degradation.

use std::sync::Arc;
use tracing::{debug, warn};

use super::resilience::call_with_retry;
use crate::traits::capability::QueryRefinement;
use crate::types::{answer::Degradation, config::ResilienceConfig, query::Query};

/// Rewrites ambiguous or colloquial queries.
pub struct QueryRefiner {
    capability: Arc<dyn QueryRefinement>,
    growth_limit: f32,
    resilience: ResilienceConfig,
}

impl QueryRefiner {
    pub fn new(
        capability: Arc<dyn QueryRefinement>,
        growth_limit: f32,
        resilience: ResilienceConfig,
    ) -> Self {
        Self {
            capability,
            growth_limit,
            resilience,
        }
    }

    /// Commit the refinement for `query`.
    ///
    /// The returned query always has non-empty refined text, equal to the raw
    /// text unless a rewrite was accepted.
    pub async fn refine(&self, query: Query) -> (Query, Option<Degradation>) {
        let raw = query.raw_text().to_string();
        let outcome = call_with_retry(&self.resilience, "refine", || {
            self.capability.refine(&raw)
        })
        .await;

        match outcome {
            Ok(refinement) if refinement.needs_refinement => {
                let rewrite = refinement.refined_text.filter(|text| {
                    let accepted = self.within_growth_limit(&raw, text);
                    if !accepted {
                        debug!(
                            raw = %raw,
                            rewrite = %text,
                            "Refinement grew too much, keeping raw query"
                        );
                    }
                    accepted
                });
                let refined = query.refined(true, rewrite);
                debug!(
                    raw = %raw,
                    refined = %refined.search_text(),
                    needs_refinement = refined.needs_refinement(),
                    "Query refined"
                );
                (refined, None)
            }
            Ok(_) => (query.refined(false, None), None),
            Err(e) => {
                warn!(error = %e, "Query refinement unavailable, using raw query");
                (
                    query.refined(false, None),
                    Some(Degradation::RefinementUnavailable {
                        detail: e.to_string(),
                    }),
                )
            }
        }
    }

    fn within_growth_limit(&self, raw: &str, rewrite: &str) -> bool {
        let raw_len = raw.chars().count() as f32;
        let rewrite_len = rewrite.trim().chars().count() as f32;
        rewrite_len <= raw_len * self.growth_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use crate::traits::capability::Refinement;

    fn refiner(llm: MockLlm) -> QueryRefiner {
        QueryRefiner::new(
            Arc::new(llm),
            3.0,
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_rewrite_is_accepted() {
        let llm = MockLlm::new().with_refinement(
            "ceb stuff",
            Refinement::rewrite("Ceylon Electricity Board restructuring"),
        );
        let (query, degradation) = refiner(llm)
            .refine(Query::new("ceb stuff").unwrap())
            .await;

        assert!(degradation.is_none());
        assert!(query.needs_refinement());
        assert_eq!(query.search_text(), "Ceylon Electricity Board restructuring");
    }

    #[tokio::test]
    async fn test_no_refinement_keeps_raw() {
        let llm = MockLlm::new().with_refinement("CEB tariff hike", Refinement::unchanged());
        let (query, _) = refiner(llm)
            .refine(Query::new("CEB tariff hike").unwrap())
            .await;

        assert!(!query.needs_refinement());
        assert_eq!(query.refined_text(), Some("CEB tariff hike"));
    }

    #[tokio::test]
    async fn test_overlong_rewrite_is_rejected() {
        let llm = MockLlm::new().with_refinement(
            "ceb",
            Refinement::rewrite("Ceylon Electricity Board restructuring process in Sri Lanka"),
        );
        let (query, degradation) = refiner(llm).refine(Query::new("ceb").unwrap()).await;

        assert!(degradation.is_none());
        assert!(!query.needs_refinement());
        assert_eq!(query.search_text(), "ceb");
    }

    #[tokio::test]
    async fn test_unavailable_capability_degrades() {
        let llm = MockLlm::new().failing("refine");
        let (query, degradation) = refiner(llm)
            .refine(Query::new("fuel prices").unwrap())
            .await;

        assert_eq!(query.refined_text(), Some("fuel prices"));
        assert!(!query.needs_refinement());
        assert!(matches!(
            degradation,
            Some(Degradation::RefinementUnavailable { .. })
        ));
    }
}
