//! Property tests for query refinement.
//!
//! Whatever the refinement capability answers, the committed query must
//! have non-empty search text, and that text is the raw query whenever no
//! rewrite was accepted.

use std::sync::Arc;

use newsdesk::{testing::MockLlm, Query, QueryRefiner, Refinement, ResilienceConfig};
use proptest::prelude::*;

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

fn refinement() -> impl Strategy<Value = Refinement> {
    (any::<bool>(), proptest::option::of("[ a-zA-Z?]{0,120}")).prop_map(
        |(needs_refinement, refined_text)| Refinement {
            needs_refinement,
            refined_text,
        },
    )
}

proptest! {
    #[test]
    fn refined_text_is_never_empty(raw in "[a-zA-Z][ a-zA-Z?]{0,40}", answer in refinement()) {
        let llm = MockLlm::new().with_refinement(raw.trim(), answer);
        let query = Query::new(raw.as_str()).unwrap();

        let (refined, degradation) = tokio_test::block_on(refiner(llm).refine(query));

        prop_assert!(degradation.is_none());
        prop_assert!(!refined.search_text().is_empty());
        if !refined.needs_refinement() {
            prop_assert_eq!(refined.search_text(), raw.trim());
        }
    }

    #[test]
    fn accepted_rewrite_stays_within_growth_limit(raw in "[a-zA-Z][ a-zA-Z]{0,40}", answer in refinement()) {
        let llm = MockLlm::new().with_refinement(raw.trim(), answer);
        let query = Query::new(raw.as_str()).unwrap();

        let (refined, _) = tokio_test::block_on(refiner(llm).refine(query));

        let raw_len = raw.trim().chars().count() as f32;
        prop_assert!(refined.search_text().chars().count() as f32 <= raw_len * 3.0);
    }

    #[test]
    fn unavailable_refinement_keeps_raw(raw in "[a-zA-Z][ a-zA-Z?]{0,40}") {
        let query = Query::new(raw.as_str()).unwrap();

        let (refined, degradation) =
            tokio_test::block_on(refiner(MockLlm::new().failing("refine")).refine(query));

        prop_assert!(degradation.is_some());
        prop_assert!(!refined.needs_refinement());
        prop_assert_eq!(refined.search_text(), raw.trim());
    }
}
