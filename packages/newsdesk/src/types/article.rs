//! Article types. Articles are owned by the document store; the pipeline
//! only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of body text sent to judgment and entailment calls.
pub const PREVIEW_CHARS: usize = 1000;

/// Stable identifier of an article in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ArticleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// News outlet an article was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsSource {
    NewsWire,
    NewsFirst,
    AdaDerana,
}

impl NewsSource {
    /// Parse the source names used by the scrapers (`newswire_data`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let norm: String = label
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match norm.trim_end_matches("data") {
            "newswire" => Some(Self::NewsWire),
            "newsfirst" => Some(Self::NewsFirst),
            "adaderana" => Some(Self::AdaDerana),
            _ => None,
        }
    }
}

impl fmt::Display for NewsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NewsWire => "NewsWire",
            Self::NewsFirst => "NewsFirst",
            Self::AdaDerana => "Ada Derana",
        };
        f.write_str(s)
    }
}

/// A scraped news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub source: NewsSource,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,

    /// Key of this article's vector in the index.
    pub embedding_id: String,

    #[serde(default)]
    pub url: Option<String>,
}

impl Article {
    /// Create an article whose embedding id equals its article id.
    pub fn new(
        id: impl Into<String>,
        source: NewsSource,
        title: impl Into<String>,
        body: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            embedding_id: id.clone(),
            id: ArticleId(id),
            source,
            title: title.into(),
            body: body.into(),
            published_at,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_embedding_id(mut self, embedding_id: impl Into<String>) -> Self {
        self.embedding_id = embedding_id.into();
        self
    }

    /// Whether the title or body contains `text`, ignoring case.
    pub fn mentions(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let needle = text.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }

    /// Body truncated to `PREVIEW_CHARS` characters, suffixed with `...`.
    pub fn preview(&self) -> String {
        match self.body.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => format!("{}...", &self.body[..idx]),
            None => self.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(body: &str) -> Article {
        Article::new(
            "a1",
            NewsSource::NewsFirst,
            "CEB restructuring begins",
            body,
            Utc::now(),
        )
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(NewsSource::from_label("newswire_data"), Some(NewsSource::NewsWire));
        assert_eq!(NewsSource::from_label("NewsFirst"), Some(NewsSource::NewsFirst));
        assert_eq!(NewsSource::from_label("Ada Derana"), Some(NewsSource::AdaDerana));
        assert_eq!(NewsSource::from_label("reuters"), None);
    }

    #[test]
    fn test_mentions_is_case_insensitive() {
        let a = article("The Ceylon Electricity Board announced a plan.");
        assert!(a.mentions("ceb"));
        assert!(a.mentions("CEYLON ELECTRICITY BOARD"));
        assert!(!a.mentions("Colombo"));
        assert!(!a.mentions("  "));
    }

    #[test]
    fn test_preview_truncates_long_bodies() {
        let long = "x".repeat(PREVIEW_CHARS + 50);
        let preview = article(&long).preview();
        assert_eq!(preview.len(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));

        assert_eq!(article("short").preview(), "short");
    }
}
