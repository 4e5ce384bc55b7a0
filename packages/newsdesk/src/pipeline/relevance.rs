//! Relevance filtering: combined scoring plus a per-candidate judgment.

use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::resilience::call_with_retry;
use crate::traits::capability::RelevanceJudge;
use crate::types::{
    answer::{Degradation, FilterReport},
    candidate::{Candidate, DropReason},
    config::{RelevanceConfig, ResilienceConfig},
};

/// Output of [`RelevanceFilter::filter`].
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Every candidate, kept or not, by combined score (highest first).
    pub candidates: Vec<Candidate>,
    pub report: FilterReport,
    pub degradation: Option<Degradation>,
}

impl FilterOutcome {
    pub fn kept(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.kept)
    }

    pub fn has_evidence(&self) -> bool {
        self.report.kept > 0
    }
}

/// Re-scores and prunes retrieved candidates.
pub struct RelevanceFilter {
    judge: Arc<dyn RelevanceJudge>,
    config: RelevanceConfig,
    resilience: ResilienceConfig,
    concurrency: usize,
}

enum Judgment {
    Relevant,
    Irrelevant,
    Unavailable,
}

impl RelevanceFilter {
    pub fn new(
        judge: Arc<dyn RelevanceJudge>,
        config: RelevanceConfig,
        resilience: ResilienceConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            judge,
            config,
            resilience,
            concurrency: concurrency.max(1),
        }
    }

    /// Combined score of one candidate.
    ///
    /// Weights are normalised so the result stays in `[0, 1]`. With no query
    /// entities the overlap carries no signal, so similarity takes all the
    /// weight.
    pub fn combined_score(&self, candidate: &Candidate, has_entities: bool) -> f32 {
        if !has_entities {
            return candidate.similarity_score;
        }
        let ws = self.config.similarity_weight;
        let we = self.config.entity_weight;
        let total = ws + we;
        if total <= 0.0 {
            return candidate.similarity_score;
        }
        ((ws * candidate.similarity_score + we * candidate.entity_overlap_score) / total)
            .clamp(0.0, 1.0)
    }

    /// Decide `kept` for each candidate.
    ///
    /// Never force-keeps: an empty kept set is a valid outcome. Only
    /// candidates at or above the threshold are sent for judgment; a failed
    /// judgment keeps the candidate on score alone.
    pub async fn filter(
        &self,
        query: &str,
        has_entities: bool,
        candidates: Vec<Candidate>,
    ) -> FilterOutcome {
        let threshold = self.config.threshold;
        let total = candidates.len();

        let scored: Vec<Candidate> = candidates
            .into_iter()
            .map(|mut c| {
                let combined = self.combined_score(&c, has_entities);
                c.combined_score = Some(combined);
                if combined < threshold {
                    c.drop_reason = Some(DropReason::BelowThreshold {
                        combined_score: combined,
                        threshold,
                    });
                }
                c
            })
            .collect();

        let judgments: Vec<Judgment> = stream::iter(scored.iter())
            .map(|c| async move {
                if c.drop_reason.is_some() {
                    Judgment::Irrelevant
                } else if !self.config.use_llm_judgment {
                    Judgment::Relevant
                } else {
                    self.judge(query, c).await
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut unavailable = 0;
        let mut decided: Vec<Candidate> = scored
            .into_iter()
            .zip(judgments)
            .map(|(mut c, judgment)| {
                if c.drop_reason.is_none() {
                    match judgment {
                        Judgment::Relevant => c.kept = true,
                        Judgment::Unavailable => {
                            unavailable += 1;
                            c.kept = true;
                        }
                        Judgment::Irrelevant => c.drop_reason = Some(DropReason::JudgedIrrelevant),
                    }
                }
                c
            })
            .collect();

        decided.sort_by(by_combined_score);

        let kept = decided.iter().filter(|c| c.kept).count();
        let report = FilterReport {
            total,
            kept,
            dropped: total - kept,
            judgments_unavailable: unavailable,
        };

        info!(
            total = report.total,
            kept = report.kept,
            dropped = report.dropped,
            judgments_unavailable = report.judgments_unavailable,
            "Relevance filter complete"
        );

        let degradation = (unavailable > 0).then_some(Degradation::FilterJudgmentUnavailable {
            candidates: unavailable,
        });

        FilterOutcome {
            candidates: decided,
            report,
            degradation,
        }
    }

    async fn judge(&self, query: &str, candidate: &Candidate) -> Judgment {
        let article = candidate.article.as_ref();
        let outcome = call_with_retry(&self.resilience, "judge_relevance", || {
            self.judge.judge_relevance(query, article)
        })
        .await;

        match outcome {
            Ok(true) => Judgment::Relevant,
            Ok(false) => {
                debug!(article_id = %article.id, "Judged irrelevant");
                Judgment::Irrelevant
            }
            Err(e) => {
                warn!(
                    article_id = %article.id,
                    error = %e,
                    "Relevance judgment unavailable, keeping on score"
                );
                Judgment::Unavailable
            }
        }
    }
}

fn by_combined_score(a: &Candidate, b: &Candidate) -> Ordering {
    let score = |c: &Candidate| c.combined_score.unwrap_or(0.0);
    score(b)
        .partial_cmp(&score(a))
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.article.published_at.cmp(&a.article.published_at))
        .then_with(|| a.article.id.cmp(&b.article.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use crate::types::article::{Article, NewsSource};
    use chrono::{TimeZone, Utc};

    fn candidate(id: &str, similarity: f32, overlap: f32) -> Candidate {
        let article = Article::new(
            id,
            NewsSource::NewsFirst,
            format!("Title {id}"),
            "body",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        Candidate::new(Arc::new(article), similarity, overlap)
    }

    fn filter(llm: MockLlm, config: RelevanceConfig) -> RelevanceFilter {
        RelevanceFilter::new(
            Arc::new(llm),
            config,
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
            4,
        )
    }

    #[tokio::test]
    async fn test_scores_and_orders() {
        let f = filter(MockLlm::new(), RelevanceConfig::default());
        let outcome = f
            .filter(
                "q",
                true,
                vec![candidate("a", 0.6, 0.0), candidate("b", 0.8, 1.0)],
            )
            .await;

        let ids: Vec<_> = outcome.candidates.iter().map(|c| c.article_id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        let combined = outcome.candidates[0].combined_score.unwrap();
        assert!((combined - 0.9).abs() < 1e-6);
        assert!(outcome.candidates[0].kept);
        assert!(matches!(
            outcome.candidates[1].drop_reason,
            Some(DropReason::BelowThreshold { .. })
        ));
        assert_eq!(outcome.report.dropped, 1);
    }

    #[tokio::test]
    async fn test_no_entities_uses_similarity_alone() {
        let f = filter(MockLlm::new(), RelevanceConfig::default());
        let outcome = f.filter("q", false, vec![candidate("a", 0.6, 0.0)]).await;

        assert_eq!(outcome.candidates[0].combined_score, Some(0.6));
        assert!(outcome.has_evidence());
    }

    #[tokio::test]
    async fn test_judged_irrelevant_is_dropped() {
        let llm = MockLlm::new().with_relevance("b", false);
        let f = filter(llm, RelevanceConfig::default());
        let outcome = f
            .filter("q", true, vec![candidate("a", 0.9, 1.0), candidate("b", 0.9, 1.0)])
            .await;

        let dropped: Vec<_> = outcome
            .candidates
            .iter()
            .filter(|c| !c.kept)
            .map(|c| (c.article_id().as_str(), c.drop_reason.clone()))
            .collect();
        assert_eq!(dropped, vec![("b", Some(DropReason::JudgedIrrelevant))]);
    }

    #[tokio::test]
    async fn test_all_dropped_is_not_force_kept() {
        let f = filter(MockLlm::new(), RelevanceConfig::default());
        let outcome = f
            .filter("q", true, vec![candidate("a", 0.1, 0.0), candidate("b", 0.2, 0.0)])
            .await;

        assert!(!outcome.has_evidence());
        assert_eq!(outcome.kept().count(), 0);
        assert_eq!(outcome.report.total, 2);
        assert_eq!(outcome.report.dropped, 2);
    }

    #[tokio::test]
    async fn test_judgment_failure_falls_back_to_score() {
        let llm = MockLlm::new().failing("judge_relevance");
        let f = filter(llm, RelevanceConfig::default());
        let outcome = f
            .filter("q", true, vec![candidate("a", 0.9, 1.0), candidate("b", 0.1, 0.0)])
            .await;

        assert_eq!(outcome.report.kept, 1);
        assert_eq!(outcome.report.judgments_unavailable, 1);
        assert_eq!(
            outcome.degradation,
            Some(Degradation::FilterJudgmentUnavailable { candidates: 1 })
        );
    }

    #[tokio::test]
    async fn test_below_threshold_is_never_judged() {
        let llm = MockLlm::new();
        let calls = llm.calls();
        let f = filter(llm, RelevanceConfig::default());
        f.filter("q", true, vec![candidate("a", 0.1, 0.0)]).await;

        assert_eq!(calls.count("judge_relevance").await, 0);
    }

    #[tokio::test]
    async fn test_score_only_mode() {
        let llm = MockLlm::new().with_relevance("a", false);
        let config = RelevanceConfig {
            use_llm_judgment: false,
            ..Default::default()
        };
        let outcome = filter(llm, config)
            .filter("q", true, vec![candidate("a", 0.9, 1.0)])
            .await;

        assert!(outcome.candidates[0].kept);
    }

    #[tokio::test]
    async fn test_nan_similarity_is_below_threshold() {
        let llm = MockLlm::new();
        let calls = llm.calls();
        let outcome = filter(llm, RelevanceConfig::default())
            .filter("q", false, vec![candidate("a", f32::NAN, 0.0)])
            .await;

        assert_eq!(outcome.candidates[0].combined_score, Some(0.0));
        assert!(!outcome.has_evidence());
        assert_eq!(calls.count("judge_relevance").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_judgments_respect_concurrency_limit() {
        let llm = MockLlm::new().with_delay(std::time::Duration::from_millis(50));
        let handle = llm.clone();
        let f = RelevanceFilter::new(
            Arc::new(llm),
            RelevanceConfig::default(),
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
            2,
        );
        let candidates = (0..6).map(|i| candidate(&format!("c{i}"), 0.9, 1.0)).collect();

        let outcome = f.filter("q", true, candidates).await;

        assert_eq!(outcome.report.kept, 6);
        assert_eq!(handle.peak_in_flight(), 2);
    }
}
