//! Query and entity types.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A user query as it moves through refinement.
///
/// Created from raw text at the start of a run. The refined text is set
/// exactly once by [`Query::refined`], which consumes the unrefined value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    raw_text: String,
    refined_text: Option<String>,
    needs_refinement: bool,
}

impl Query {
    /// Create a query from raw user input. Rejects blank input.
    pub fn new(raw_text: impl Into<String>) -> Result<Self> {
        let raw_text = raw_text.into().trim().to_string();
        if raw_text.is_empty() {
            return Err(PipelineError::InvalidQuery {
                reason: "query text is empty".into(),
            });
        }
        Ok(Self {
            raw_text,
            refined_text: None,
            needs_refinement: false,
        })
    }

    /// Commit the refinement decision.
    ///
    /// A blank rewrite, or `needs_refinement == false`, keeps the raw text.
    pub fn refined(self, needs_refinement: bool, rewrite: Option<String>) -> Self {
        let rewrite = rewrite
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        match (needs_refinement, rewrite) {
            (true, Some(text)) => Self {
                refined_text: Some(text),
                needs_refinement: true,
                ..self
            },
            _ => Self {
                refined_text: Some(self.raw_text.clone()),
                needs_refinement: false,
                ..self
            },
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The refined text, or `None` before refinement.
    pub fn refined_text(&self) -> Option<&str> {
        self.refined_text.as_deref()
    }

    pub fn needs_refinement(&self) -> bool {
        self.needs_refinement
    }

    /// Text used for downstream stages: refined if available, raw otherwise.
    pub fn search_text(&self) -> &str {
        self.refined_text.as_deref().unwrap_or(&self.raw_text)
    }
}

/// Named entity categories recognised in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Person,
    Location,
    Event,
}

impl EntityKind {
    /// Parse the labels LLMs and NER models commonly emit.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "ORGANIZATION" | "ORGANISATION" | "ORG" => Some(Self::Organization),
            "PERSON" | "PER" | "PEOPLE" => Some(Self::Person),
            "LOCATION" | "LOC" | "GPE" | "FAC" | "FACILITY" => Some(Self::Location),
            "EVENT" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Byte offsets `[start, end)` into the refined query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A named entity found in the refined query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    pub span: Span,
}

impl Entity {
    pub fn new(text: impl Into<String>, kind: EntityKind, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            kind,
            span: Span { start, end },
        }
    }

    /// Build an entity by locating `text` in `haystack` (case-insensitive).
    ///
    /// Entities an LLM reports without offsets get the span of their first
    /// occurrence, or an empty span at 0 when the text is not present.
    pub fn locate(text: impl Into<String>, kind: EntityKind, haystack: &str) -> Self {
        let text = text.into();
        let (start, end) = find_case_insensitive(haystack, &text)
            .map(|start| (start, start + text.len()))
            .unwrap_or((0, 0));
        Self::new(text, kind, start, end)
    }
}

/// Byte offset of the first case-insensitive occurrence of `needle`.
pub(crate) fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only trust offsets
    // when the haystack kept its length.
    if hay.len() != haystack.len() {
        return None;
    }
    hay.find(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query_rejected() {
        assert!(Query::new("   ").is_err());
        assert!(Query::new("").is_err());
    }

    #[test]
    fn test_refined_without_rewrite_keeps_raw() {
        let q = Query::new("ceb news").unwrap().refined(false, None);
        assert_eq!(q.refined_text(), Some("ceb news"));
        assert!(!q.needs_refinement());
    }

    #[test]
    fn test_blank_rewrite_falls_back_to_raw() {
        let q = Query::new("ceb news")
            .unwrap()
            .refined(true, Some("   ".into()));
        assert_eq!(q.refined_text(), Some("ceb news"));
        assert!(!q.needs_refinement());
    }

    #[test]
    fn test_rewrite_is_committed() {
        let q = Query::new("ceb news").unwrap().refined(
            true,
            Some("Ceylon Electricity Board restructuring".into()),
        );
        assert_eq!(q.raw_text(), "ceb news");
        assert_eq!(q.search_text(), "Ceylon Electricity Board restructuring");
        assert!(q.needs_refinement());
    }

    #[test]
    fn test_entity_kind_labels() {
        assert_eq!(EntityKind::from_label("ORG"), Some(EntityKind::Organization));
        assert_eq!(EntityKind::from_label("gpe"), Some(EntityKind::Location));
        assert_eq!(EntityKind::from_label("DATE"), None);
    }

    #[test]
    fn test_entity_locate() {
        let e = Entity::locate("CEB", EntityKind::Organization, "What happened to ceb today");
        assert_eq!(e.span, Span { start: 17, end: 20 });

        let missing = Entity::locate("Colombo", EntityKind::Location, "no match here");
        assert_eq!(missing.span, Span { start: 0, end: 0 });
    }
}
