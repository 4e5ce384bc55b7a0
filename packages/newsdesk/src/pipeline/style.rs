//! Answer style selection from query intent.
//!
//! Keyword heuristics only: the same query always gets the same style.

use crate::types::answer::AnswerStyle;

/// Phrases that ask for a chronology.
const EVENT_KEYWORDS: &[&str] = &[
    "what happened",
    "what has happened",
    "what's happening",
    "what is happening",
    "timeline",
    "chronology",
    "sequence of events",
    "events",
    "developments",
    "latest on",
    "progress of",
    "how did",
];

/// Phrases that ask for a condensed overview.
const SUMMARY_KEYWORDS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "overview",
    "tell me about",
    "brief me",
    "in short",
    "recap",
    "gist",
];

/// Phrases that ask for discrete points.
const BULLET_KEYWORDS: &[&str] = &[
    "key points",
    "main points",
    "bullet",
    "highlights",
    "list the",
    "list of",
    "takeaways",
    "pros and cons",
    "reasons",
];

/// Phrases that ask whether something is true.
const VERIFICATION_KEYWORDS: &[&str] = &[
    "is it true",
    "is this true",
    "true that",
    "did really",
    "fact check",
    "fact-check",
    "confirm",
    "verify",
    "rumour",
    "rumor",
    "hoax",
    "fake",
];

/// A chronology needs at least this many kept articles to be worth listing.
const MIN_EVENT_LIST_ARTICLES: usize = 2;

/// Chooses one output format per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleSelector;

impl StyleSelector {
    pub fn new() -> Self {
        Self
    }

    /// Select a style for `query` given how many articles were kept.
    ///
    /// Verification questions always get a paragraph; otherwise the intent
    /// with the most keyword hits wins, earlier kinds winning ties. Defaults
    /// to [`AnswerStyle::Paragraph`].
    pub fn select(&self, query: &str, kept_count: usize) -> AnswerStyle {
        let query_lower = query.to_lowercase();
        let hits = |keywords: &[&str]| keywords.iter().filter(|k| query_lower.contains(*k)).count();

        if hits(VERIFICATION_KEYWORDS) > 0 || starts_as_yes_no_question(&query_lower) {
            return AnswerStyle::Paragraph;
        }

        let scores = [
            (AnswerStyle::EventList, hits(EVENT_KEYWORDS)),
            (AnswerStyle::Summary, hits(SUMMARY_KEYWORDS)),
            (AnswerStyle::BulletPoints, hits(BULLET_KEYWORDS)),
        ];

        let best = scores
            .iter()
            .filter(|(_, score)| *score > 0)
            .fold(None::<(AnswerStyle, usize)>, |best, &(style, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((style, score)),
            });

        match best {
            Some((AnswerStyle::EventList, _)) if kept_count < MIN_EVENT_LIST_ARTICLES => {
                AnswerStyle::Paragraph
            }
            Some((style, _)) => style,
            None => AnswerStyle::Paragraph,
        }
    }
}

/// "Is the CEB being privatised?" and similar yes/no questions.
fn starts_as_yes_no_question(query_lower: &str) -> bool {
    let first = query_lower.split_whitespace().next().unwrap_or("");
    matches!(first, "is" | "are" | "was" | "were" | "did" | "does" | "has" | "have")
        && query_lower.trim_end().ends_with('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(query: &str) -> AnswerStyle {
        StyleSelector::new().select(query, 5)
    }

    #[test]
    fn test_what_happened_is_event_list() {
        assert_eq!(
            select("What happened to CEB restructuring process?"),
            AnswerStyle::EventList
        );
    }

    #[test]
    fn test_summary_and_bullets() {
        assert_eq!(select("Summarize the IMF review"), AnswerStyle::Summary);
        assert_eq!(select("Tell me about the fuel crisis"), AnswerStyle::Summary);
        assert_eq!(select("Key points of the 2024 budget"), AnswerStyle::BulletPoints);
    }

    #[test]
    fn test_verification_forward_paragraph() {
        assert_eq!(select("Is it true that CEB was sold?"), AnswerStyle::Paragraph);
        assert_eq!(select("Is the CEB being privatised?"), AnswerStyle::Paragraph);
    }

    #[test]
    fn test_ambiguous_defaults_to_paragraph() {
        assert_eq!(select("CEB"), AnswerStyle::Paragraph);
        assert_eq!(select("fuel prices"), AnswerStyle::Paragraph);
    }

    #[test]
    fn test_event_list_needs_multiple_articles() {
        let selector = StyleSelector::new();
        assert_eq!(
            selector.select("What happened in Parliament?", 1),
            AnswerStyle::Paragraph
        );
        assert_eq!(
            selector.select("What happened in Parliament?", 2),
            AnswerStyle::EventList
        );
    }

    #[test]
    fn test_never_notice() {
        for q in ["", "?", "what happened", "summary", "bullet"] {
            assert_ne!(StyleSelector::new().select(q, 0), AnswerStyle::Notice);
        }
    }
}
