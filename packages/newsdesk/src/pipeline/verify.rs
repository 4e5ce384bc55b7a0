//! Claim verification against the kept articles.
//!
//! Every claim is checked against every kept article; checks run
//! concurrently up to the configured limit. Contradiction takes precedence
//! over any amount of support.

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::resilience::call_with_retry;
use crate::error::CapabilityResult;
use crate::traits::capability::EntailmentJudge;
use crate::types::{
    answer::Degradation,
    article::{Article, ArticleId},
    claim::{Claim, ClaimCheck, ClaimStatus, Entailment},
    config::{ResilienceConfig, VerificationConfig},
};

/// Checks drafted claims against kept articles.
pub struct FactVerifier {
    judge: Arc<dyn EntailmentJudge>,
    config: VerificationConfig,
    resilience: ResilienceConfig,
    concurrency: usize,
}

impl FactVerifier {
    pub fn new(
        judge: Arc<dyn EntailmentJudge>,
        config: VerificationConfig,
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

    /// Verify `claims` against `kept`, preserving claim order.
    ///
    /// Supporting sources are always drawn from `kept`. Failed checks are
    /// counted in the returned degradation; a claim whose checks all failed
    /// is `Unverified` with a note.
    pub async fn verify(
        &self,
        claims: Vec<String>,
        kept: &[Arc<Article>],
    ) -> (Vec<Claim>, Option<Degradation>) {
        let mut checks: Vec<ClaimCheck> = claims.into_iter().map(ClaimCheck::new).collect();
        for check in checks.iter_mut() {
            check.begin();
        }

        let pairs = checks
            .iter()
            .enumerate()
            .flat_map(|(i, check)| kept.iter().map(move |article| (i, check.text(), article)));

        let results: Vec<(usize, ArticleId, CapabilityResult<Entailment>)> = stream::iter(pairs)
            .map(|(i, claim, article)| async move {
                let outcome = call_with_retry(&self.resilience, "entail", || {
                    self.judge.entail(claim, article)
                })
                .await;
                (i, article.id.clone(), outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut per_claim: Vec<Vec<(ArticleId, Entailment)>> = vec![Vec::new(); checks.len()];
        let mut failures = vec![0usize; checks.len()];
        for (i, article_id, outcome) in results {
            match outcome {
                Ok(entailment) => per_claim[i].push((article_id, entailment)),
                Err(e) => {
                    warn!(article_id = %article_id, error = %e, "Entailment check unavailable");
                    failures[i] += 1;
                }
            }
        }

        let failed_checks: usize = failures.iter().sum();
        let verified: Vec<Claim> = checks
            .into_iter()
            .zip(per_claim)
            .zip(failures)
            .map(|((check, judgments), failed)| {
                let verdict = aggregate(&judgments, self.config.min_supporting_sources);
                let note = failure_note(failed, kept.len());
                debug!(claim = %check.text(), status = ?verdict.0, "Claim settled");
                check.settle(verdict.0, verdict.1, note)
            })
            .collect();

        info!(
            claims = verified.len(),
            articles = kept.len(),
            failed_checks,
            "Verification complete"
        );

        let degradation =
            (failed_checks > 0).then_some(Degradation::VerificationUnavailable { failed_checks });

        (verified, degradation)
    }
}

/// Status and cited sources for one claim.
///
/// Contradicted cites the contradicting articles; the other statuses cite
/// the supporting ones.
pub fn aggregate(
    judgments: &[(ArticleId, Entailment)],
    min_supporting_sources: usize,
) -> (ClaimStatus, BTreeSet<ArticleId>) {
    let with = |wanted: &dyn Fn(Entailment) -> bool| -> BTreeSet<ArticleId> {
        judgments
            .iter()
            .filter(|(_, e)| wanted(*e))
            .map(|(id, _)| id.clone())
            .collect()
    };

    // Conflicts take precedence over support.
    let contradicting = with(&|e| e == Entailment::Contradicts);
    if !contradicting.is_empty() {
        return (ClaimStatus::Contradicted, contradicting);
    }

    let full = judgments
        .iter()
        .filter(|(_, e)| *e == Entailment::Supports)
        .count();
    let supporting = with(&Entailment::is_support);

    if full >= min_supporting_sources.max(1) {
        (ClaimStatus::Verified, supporting)
    } else if !supporting.is_empty() {
        (ClaimStatus::PartiallyVerified, supporting)
    } else {
        (ClaimStatus::Unverified, BTreeSet::new())
    }
}

fn failure_note(failed: usize, total: usize) -> Option<String> {
    match failed {
        0 => None,
        n if n >= total => Some("verification unavailable: no entailment check succeeded".into()),
        n => Some(format!("entailment unavailable for {n} of {total} articles")),
    }
}

/// Split a drafted body into claims without a model.
///
/// One claim per sentence; list markers are stripped and headings dropped.
pub fn split_claims(body: &str) -> Vec<String> {
    body.lines()
        .map(strip_list_marker)
        .flat_map(|line| line.unicode_sentences().map(str::trim).collect::<Vec<_>>())
        .filter(|s| !s.is_empty() && !s.ends_with(':') && !s.ends_with('?'))
        .filter(|s| s.split_whitespace().count() >= 3)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•', '–']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && digits < 3 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use crate::types::article::NewsSource;
    use chrono::Utc;

    fn article(id: &str) -> Arc<Article> {
        Arc::new(Article::new(id, NewsSource::AdaDerana, "t", "b", Utc::now()))
    }

    fn id(s: &str) -> ArticleId {
        ArticleId::from(s)
    }

    fn verifier(llm: MockLlm, min_supporting_sources: usize) -> FactVerifier {
        FactVerifier::new(
            Arc::new(llm),
            VerificationConfig {
                min_supporting_sources,
            },
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
            4,
        )
    }

    #[test]
    fn test_aggregate_contradiction_dominates() {
        let judgments = vec![
            (id("a"), Entailment::Supports),
            (id("c"), Entailment::Supports),
            (id("b"), Entailment::Contradicts),
        ];
        let (status, sources) = aggregate(&judgments, 1);

        assert_eq!(status, ClaimStatus::Contradicted);
        assert_eq!(sources, BTreeSet::from([id("b")]));
    }

    #[test]
    fn test_aggregate_partial_and_unverified() {
        let partial = vec![
            (id("a"), Entailment::PartiallySupports),
            (id("b"), Entailment::Neutral),
        ];
        assert_eq!(aggregate(&partial, 1).0, ClaimStatus::PartiallyVerified);
        assert_eq!(aggregate(&partial, 1).1, BTreeSet::from([id("a")]));

        let neutral = vec![(id("a"), Entailment::Neutral)];
        assert_eq!(aggregate(&neutral, 1).0, ClaimStatus::Unverified);
        assert_eq!(aggregate(&[], 1).0, ClaimStatus::Unverified);
    }

    #[test]
    fn test_aggregate_min_supporting_sources() {
        let one = vec![(id("a"), Entailment::Supports)];
        assert_eq!(aggregate(&one, 1).0, ClaimStatus::Verified);
        assert_eq!(aggregate(&one, 2).0, ClaimStatus::PartiallyVerified);
    }

    #[tokio::test]
    async fn test_support_and_contradiction_is_contradicted() {
        let claim = "CEB will be split into separate companies.";
        let llm = MockLlm::new()
            .with_entailment(claim, "a", Entailment::Supports)
            .with_entailment(claim, "b", Entailment::Contradicts);

        let (claims, degradation) = verifier(llm, 1)
            .verify(vec![claim.to_string()], &[article("a"), article("b")])
            .await;

        assert!(degradation.is_none());
        assert_eq!(claims[0].status, ClaimStatus::Contradicted);
        assert!(claims[0].supporting_sources.contains(&id("b")));
        assert!(!claims[0].supporting_sources.contains(&id("a")));
    }

    #[tokio::test]
    async fn test_claim_order_is_preserved() {
        let llm = MockLlm::new()
            .with_entailment("first claim here", "a", Entailment::Supports)
            .with_entailment("third claim here", "a", Entailment::Contradicts);
        let claims = vec![
            "first claim here".to_string(),
            "second claim here".to_string(),
            "third claim here".to_string(),
        ];

        let (verified, _) = verifier(llm, 1).verify(claims, &[article("a")]).await;

        let statuses: Vec<_> = verified.iter().map(|c| (c.text.as_str(), c.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("first claim here", ClaimStatus::Verified),
                ("second claim here", ClaimStatus::Unverified),
                ("third claim here", ClaimStatus::Contradicted),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_checks_default_to_unverified_with_note() {
        let llm = MockLlm::new().failing("entail");
        let (claims, degradation) = verifier(llm, 1)
            .verify(vec!["The tariff rose by 18 percent.".into()], &[article("a"), article("b")])
            .await;

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].status, ClaimStatus::Unverified);
        assert!(claims[0].note.is_some());
        assert_eq!(
            degradation,
            Some(Degradation::VerificationUnavailable { failed_checks: 2 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entailment_respects_concurrency_limit() {
        let llm = MockLlm::new().with_delay(std::time::Duration::from_millis(50));
        let handle = llm.clone();
        let verifier = FactVerifier::new(
            Arc::new(llm),
            VerificationConfig::default(),
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
            2,
        );
        let claims = vec![
            "first claim here".to_string(),
            "second claim here".to_string(),
            "third claim here".to_string(),
        ];

        let (verified, degradation) = verifier
            .verify(claims, &[article("a"), article("b")])
            .await;

        assert_eq!(verified.len(), 3);
        assert!(degradation.is_none());
        assert_eq!(handle.peak_in_flight(), 2);
    }

    #[test]
    fn test_split_claims() {
        let body = "Key developments:\n\
                    - 2024-01-10: Cabinet approved the CEB restructuring plan.\n\
                    2. The plan splits CEB into several entities. Unions protested.\n\
                    What comes next?";
        let claims = split_claims(body);

        assert_eq!(
            claims,
            vec![
                "2024-01-10: Cabinet approved the CEB restructuring plan.",
                "The plan splits CEB into several entities.",
            ]
        );
    }
}
