//! The terminal artifact of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    candidate::CandidateSummary,
    claim::{Claim, ClaimStatus},
    query::{Entity, Query},
};

/// Output format of the answer body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    Paragraph,
    EventList,
    Summary,
    BulletPoints,

    /// Used only when there is no evidence to answer from.
    Notice,
}

impl AnswerStyle {
    /// Formatting instruction handed to the drafting collaborator.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Paragraph => "a single well-structured paragraph that answers the question directly",
            Self::EventList => "a chronologically ordered list of events, one per line, each starting with its date",
            Self::Summary => "a concise summary paragraph covering the key developments",
            Self::BulletPoints => "a bulleted list of the key points, one fact per bullet",
            Self::Notice => "a short notice",
        }
    }
}

impl fmt::Display for AnswerStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Paragraph => "paragraph",
            Self::EventList => "event_list",
            Self::Summary => "summary",
            Self::BulletPoints => "bullet_points",
            Self::Notice => "notice",
        };
        f.write_str(s)
    }
}

/// A capability that could not be used during the run, and what the
/// pipeline did instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Raw query used unrefined.
    RefinementUnavailable { detail: String },

    /// Retrieval ran on the refined text without entities.
    ExtractionUnavailable { detail: String },

    /// These candidates were filtered on score alone.
    FilterJudgmentUnavailable { candidates: usize },

    /// Entailment checks that failed; affected claims fall back to Unverified.
    VerificationUnavailable { failed_checks: usize },

    /// No draft body could be produced.
    DraftingUnavailable { detail: String },

    /// Claims were split locally from the draft instead of by the drafter.
    ClaimExtractionUnavailable { detail: String },
}

/// Counts from the relevance filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub total: usize,
    pub kept: usize,
    pub dropped: usize,
    pub judgments_unavailable: usize,
}

/// Result of one pipeline run. Never mutated after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub query: String,
    pub refined_query: String,
    pub needs_refinement: bool,
    pub entities: Vec<Entity>,
    pub style: AnswerStyle,

    /// `None` when drafting was unavailable.
    pub body_text: Option<String>,

    pub claims: Vec<Claim>,
    pub candidates_used: Vec<CandidateSummary>,
    pub filter: FilterReport,
    pub insufficient_evidence: bool,
    pub degradations: Vec<Degradation>,
    pub generated_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Record for a run where no candidate survived retrieval or filtering.
    pub(crate) fn insufficient_evidence(
        query: &Query,
        entities: Vec<Entity>,
        candidates_used: Vec<CandidateSummary>,
        filter: FilterReport,
        degradations: Vec<Degradation>,
    ) -> Self {
        Self {
            query: query.raw_text().to_string(),
            refined_query: query.search_text().to_string(),
            needs_refinement: query.needs_refinement(),
            entities,
            style: AnswerStyle::Notice,
            body_text: Some(format!(
                "Insufficient evidence: no news articles relevant to \"{}\" were found.",
                query.raw_text()
            )),
            claims: Vec::new(),
            candidates_used,
            filter,
            insufficient_evidence: true,
            degradations,
            generated_at: Utc::now(),
        }
    }

    /// Number of candidates the relevance filter removed.
    pub fn dropped_count(&self) -> usize {
        self.filter.dropped
    }

    /// Claims ordered Verified, PartiallyVerified, Unverified, Contradicted.
    ///
    /// Stable within a status, so draft order is kept.
    pub fn claims_by_status(&self) -> Vec<&Claim> {
        let mut claims: Vec<&Claim> = self.claims.iter().collect();
        claims.sort_by_key(|c| c.status);
        claims
    }

    pub fn count_with_status(&self, status: ClaimStatus) -> usize {
        self.claims.iter().filter(|c| c.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn claim(text: &str, status: ClaimStatus) -> Claim {
        Claim {
            text: text.to_string(),
            supporting_sources: BTreeSet::new(),
            status,
            note: None,
        }
    }

    #[test]
    fn test_insufficient_evidence_record() {
        let query = Query::new("anything about x").unwrap().refined(false, None);
        let record = AnswerRecord::insufficient_evidence(
            &query,
            vec![],
            vec![],
            FilterReport::default(),
            vec![],
        );

        assert!(record.insufficient_evidence);
        assert_eq!(record.style, AnswerStyle::Notice);
        assert!(record.claims.is_empty());
        assert_eq!(record.refined_query, "anything about x");
    }

    #[test]
    fn test_claims_by_status_is_stable() {
        let query = Query::new("q").unwrap().refined(false, None);
        let mut record = AnswerRecord::insufficient_evidence(
            &query,
            vec![],
            vec![],
            FilterReport::default(),
            vec![],
        );
        record.claims = vec![
            claim("c1", ClaimStatus::Contradicted),
            claim("c2", ClaimStatus::Verified),
            claim("c3", ClaimStatus::Unverified),
            claim("c4", ClaimStatus::Verified),
        ];

        let ordered: Vec<_> = record.claims_by_status().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(ordered, vec!["c2", "c4", "c3", "c1"]);
        assert_eq!(record.count_with_status(ClaimStatus::Verified), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let query = Query::new("q").unwrap().refined(false, None);
        let record = AnswerRecord::insufficient_evidence(
            &query,
            vec![],
            vec![],
            FilterReport::default(),
            vec![Degradation::RefinementUnavailable {
                detail: "timeout".into(),
            }],
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["style"], "notice");
        assert_eq!(json["insufficient_evidence"], true);
        assert_eq!(json["degradations"][0]["kind"], "refinement_unavailable");
    }
}
