//! Claims and their verification state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::article::ArticleId;

/// How one article relates to one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entailment {
    /// The article states the claim in full.
    Supports,

    /// The article backs the claim but only covers part of what it asserts.
    PartiallySupports,

    Contradicts,
    Neutral,
}

impl Entailment {
    pub fn is_support(self) -> bool {
        matches!(self, Self::Supports | Self::PartiallySupports)
    }

    /// Parse entailment labels as emitted by LLMs.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm = label.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match norm.as_str() {
            "support" | "supports" | "supported" | "directly supported" => Some(Self::Supports),
            "partial" | "partially supports" | "partially supported" | "indirectly supported" => {
                Some(Self::PartiallySupports)
            }
            "contradict" | "contradicts" | "contradicted" => Some(Self::Contradicts),
            "neutral" | "not supported" | "unrelated" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Final verification status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Verified,
    PartiallyVerified,
    Unverified,
    Contradicted,
}

/// Per-claim check progress before a status is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    Checking,
}

/// A claim moving through `Unchecked -> Checking -> {status}`.
///
/// Settling is terminal: the check is consumed and a [`Claim`] produced.
#[derive(Debug, Clone)]
pub struct ClaimCheck {
    text: String,
    state: CheckState,
}

impl ClaimCheck {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            state: CheckState::Unchecked,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    /// Move to `Checking`. Returns false if the check already started.
    pub fn begin(&mut self) -> bool {
        if self.state != CheckState::Unchecked {
            return false;
        }
        self.state = CheckState::Checking;
        true
    }

    /// Assign the terminal status.
    pub fn settle(
        self,
        status: ClaimStatus,
        supporting_sources: BTreeSet<ArticleId>,
        note: Option<String>,
    ) -> Claim {
        Claim {
            text: self.text,
            supporting_sources,
            status,
            note,
        }
    }
}

/// An atomic assertion from the drafted answer, with its verdict.
///
/// For `Contradicted` claims `supporting_sources` holds the contradicting
/// articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub supporting_sources: BTreeSet<ArticleId>,
    pub status: ClaimStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
