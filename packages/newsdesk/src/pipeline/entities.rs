//! Entity extraction stage and the deterministic NER strategy.
//!
//! Both strategies implement [`EntityRecognizer`]; the stage normalises their
//! output the same way (spans checked, duplicates collapsed) so downstream
//! code cannot tell them apart.

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use super::resilience::call_with_retry;
use crate::error::CapabilityResult;
use crate::traits::capability::EntityRecognizer;
use crate::types::{
    answer::Degradation,
    config::{EntityStrategy, ResilienceConfig},
    query::{Entity, EntityKind},
};

/// Extracts entities from the refined query.
pub struct EntityExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
    strategy: EntityStrategy,
    resilience: ResilienceConfig,
}

impl EntityExtractor {
    pub fn new(
        recognizer: Arc<dyn EntityRecognizer>,
        strategy: EntityStrategy,
        resilience: ResilienceConfig,
    ) -> Self {
        Self {
            recognizer,
            strategy,
            resilience,
        }
    }

    /// Extract entities. Failures degrade to an empty list.
    pub async fn extract(&self, text: &str) -> (Vec<Entity>, Option<Degradation>) {
        let outcome = call_with_retry(&self.resilience, "extract_entities", || {
            self.recognizer.extract_entities(text)
        })
        .await;

        match outcome {
            Ok(raw) => {
                let entities = normalize_entities(raw, text);
                debug!(
                    strategy = ?self.strategy,
                    count = entities.len(),
                    "Entities extracted"
                );
                (entities, None)
            }
            Err(e) => {
                warn!(strategy = ?self.strategy, error = %e, "Entity extraction unavailable");
                (
                    Vec::new(),
                    Some(Degradation::ExtractionUnavailable {
                        detail: e.to_string(),
                    }),
                )
            }
        }
    }
}

/// Trim, re-anchor spans, and collapse duplicates by text + kind.
///
/// The first occurrence's span is kept.
pub fn normalize_entities(raw: Vec<Entity>, text: &str) -> Vec<Entity> {
    let mut unique: IndexMap<(String, EntityKind), Entity> = IndexMap::new();

    for entity in raw {
        let trimmed = entity.text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entity = if span_matches(text, &entity, trimmed) {
            Entity::new(trimmed, entity.kind, entity.span.start, entity.span.end)
        } else {
            Entity::locate(trimmed, entity.kind, text)
        };

        unique
            .entry((trimmed.to_lowercase(), entity.kind))
            .or_insert(entity);
    }

    unique.into_values().collect()
}

fn span_matches(text: &str, entity: &Entity, trimmed: &str) -> bool {
    text.get(entity.span.start..entity.span.end)
        .map(|s| s.eq_ignore_ascii_case(trimmed))
        .unwrap_or(false)
}

// =============================================================================
// Deterministic NER
// =============================================================================

/// Words that start a query but are not part of a name.
const LEADING_STOPWORDS: &[&str] = &[
    "what", "who", "when", "where", "why", "how", "which", "is", "are", "was", "were", "did",
    "does", "do", "has", "have", "can", "could", "should", "will", "would", "tell", "show",
    "list", "give", "summarize", "summarise", "describe", "explain", "find", "the", "a", "an",
    "in", "on", "at", "about", "latest", "recent", "news", "any", "i", "me",
];

/// Lowercase words allowed inside a multi-word name.
const CONNECTORS: &[&str] = &["of", "for", "and", "de", "&"];

const PERSON_TITLES: &[&str] = &[
    "mr", "mrs", "ms", "dr", "president", "minister", "prime", "premier", "governor", "mp",
    "justice", "judge", "general", "professor", "prof",
];

const ORGANIZATION_HEADS: &[&str] = &[
    "board", "bank", "ministry", "company", "corporation", "authority", "commission", "council",
    "party", "department", "fund", "limited", "ltd", "plc", "association", "union", "institute",
    "university", "police", "army", "navy", "court", "parliament", "cabinet", "front",
    "alliance", "agency", "committee", "airlines", "federation", "trust", "group",
];

const EVENT_HEADS: &[&str] = &[
    "festival", "election", "elections", "attack", "attacks", "crisis", "cup", "summit",
    "conference", "war", "protest", "protests", "strike", "budget", "day", "games", "olympics",
    "tournament", "season", "poya", "vesak", "poson", "aragalaya",
];

const LOCATION_HEADS: &[&str] = &[
    "province", "district", "city", "lake", "river", "mountain", "island", "port", "harbour",
    "harbor", "airport", "road", "street", "town", "village", "county", "state", "bay",
];

/// Known names and their kinds, matched case-insensitively.
const GAZETTEER: &[(&str, EntityKind)] = &[
    ("sri lanka", EntityKind::Location),
    ("colombo", EntityKind::Location),
    ("kandy", EntityKind::Location),
    ("galle", EntityKind::Location),
    ("jaffna", EntityKind::Location),
    ("trincomalee", EntityKind::Location),
    ("batticaloa", EntityKind::Location),
    ("hambantota", EntityKind::Location),
    ("negombo", EntityKind::Location),
    ("anuradhapura", EntityKind::Location),
    ("india", EntityKind::Location),
    ("china", EntityKind::Location),
    ("ceb", EntityKind::Organization),
    ("ceylon electricity board", EntityKind::Organization),
    ("imf", EntityKind::Organization),
    ("central bank", EntityKind::Organization),
    ("cbsl", EntityKind::Organization),
    ("slpp", EntityKind::Organization),
    ("unp", EntityKind::Organization),
    ("sjb", EntityKind::Organization),
    ("npp", EntityKind::Organization),
    ("jvp", EntityKind::Organization),
    ("ranil wickremesinghe", EntityKind::Person),
    ("anura kumara dissanayake", EntityKind::Person),
    ("sajith premadasa", EntityKind::Person),
    ("gotabaya rajapaksa", EntityKind::Person),
    ("mahinda rajapaksa", EntityKind::Person),
    ("aragalaya", EntityKind::Event),
    ("easter sunday attacks", EntityKind::Event),
    ("vesak", EntityKind::Event),
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’.\-]*|&").expect("word pattern is valid")
    })
}

/// Rule-based named-entity recognizer.
///
/// Finds runs of capitalised words, then types them with a gazetteer, head
/// nouns ("... Board", "... Province"), personal titles, and acronym rules.
/// Deterministic and offline.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedNer;

impl RuleBasedNer {
    pub fn new() -> Self {
        Self
    }

    /// Recognize entities in `text`. Offsets are byte offsets into `text`.
    pub fn recognize(&self, text: &str) -> Vec<Entity> {
        let words: Vec<(usize, usize, &str)> = word_pattern()
            .find_iter(text)
            .map(|m| {
                let word = trim_word(m.as_str());
                (m.start(), m.start() + word.len(), word)
            })
            .collect();

        let mut entities = Vec::new();
        let mut covered_until = 0;

        // Multi-word gazetteer entries win over capitalisation rules.
        for (i, &(start, _, _)) in words.iter().enumerate() {
            if start < covered_until {
                continue;
            }
            if let Some((len, kind)) = gazetteer_match(&words[i..]) {
                let end = words[i + len - 1].1;
                entities.push(Entity::new(&text[start..end], kind, start, end));
                covered_until = end;
            }
        }

        let mut i = 0;
        while i < words.len() {
            let (start, _, word) = words[i];
            if overlaps(&entities, start) {
                i += 1;
                continue;
            }
            if !is_capitalised(word) || (i == 0 && is_stopword(word)) || is_stopword_title(word) {
                i += 1;
                continue;
            }

            // Extend the run over capitalised words and inner connectors.
            let mut j = i + 1;
            while j < words.len() {
                let w = words[j].2;
                if is_capitalised(w) && !overlaps(&entities, words[j].0) {
                    j += 1;
                } else if CONNECTORS.contains(&w.to_lowercase().as_str())
                    && words.get(j + 1).map(|n| is_capitalised(n.2)).unwrap_or(false)
                {
                    j += 1;
                } else {
                    break;
                }
            }

            let run = &words[i..j];
            if let Some(entity) = classify_run(text, run) {
                entities.push(entity);
            }
            i = j;
        }

        entities.sort_by_key(|e| e.span.start);
        entities
    }
}

#[async_trait]
impl EntityRecognizer for RuleBasedNer {
    async fn extract_entities(&self, text: &str) -> CapabilityResult<Vec<Entity>> {
        Ok(self.recognize(text))
    }
}

fn trim_word(word: &str) -> &str {
    word.trim_end_matches(['.', '\'', '’', '-'])
        .trim_end_matches("'s")
        .trim_end_matches("’s")
}

fn is_capitalised(word: &str) -> bool {
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
}

fn is_stopword(word: &str) -> bool {
    LEADING_STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Question words are never names, wherever they appear.
fn is_stopword_title(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "what" | "who" | "when" | "where" | "why" | "how" | "which"
    )
}

fn is_acronym(word: &str) -> bool {
    let letters = word.chars().filter(|c| c.is_alphabetic()).count();
    (2..=6).contains(&letters) && word.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

fn overlaps(entities: &[Entity], offset: usize) -> bool {
    entities
        .iter()
        .any(|e| e.span.start <= offset && offset < e.span.end)
}

/// Longest gazetteer entry starting at `words[0]`: (word count, kind).
fn gazetteer_match(words: &[(usize, usize, &str)]) -> Option<(usize, EntityKind)> {
    GAZETTEER
        .iter()
        .filter_map(|(name, kind)| {
            let parts: Vec<&str> = name.split(' ').collect();
            if parts.len() > words.len() {
                return None;
            }
            let matches = parts
                .iter()
                .zip(words.iter())
                .all(|(p, (_, _, w))| w.eq_ignore_ascii_case(p));
            matches.then_some((parts.len(), *kind))
        })
        .max_by_key(|(len, _)| *len)
}

fn classify_run(text: &str, run: &[(usize, usize, &str)]) -> Option<Entity> {
    // Drop leading stopwords like "The".
    let mut run = run;
    while let Some(((_, _, w), rest)) = run.split_first() {
        if is_stopword(w) && !rest.is_empty() {
            run = rest;
        } else {
            break;
        }
    }
    let (first, last) = (run.first()?, run.last()?);
    let first_lower = first.2.to_lowercase();
    let last_lower = last.2.to_lowercase();

    // "President Ranil Wickremesinghe" -> Person "Ranil Wickremesinghe".
    if PERSON_TITLES.contains(&first_lower.trim_end_matches('.')) && run.len() > 1 {
        let name = &run[1..];
        let name = if PERSON_TITLES.contains(&name[0].2.to_lowercase().as_str()) && name.len() > 1 {
            &name[1..]
        } else {
            name
        };
        let (start, end) = (name[0].0, name[name.len() - 1].1);
        return Some(Entity::new(&text[start..end], EntityKind::Person, start, end));
    }

    let (start, end) = (first.0, last.1);
    let span_text = &text[start..end];

    let kind = if ORGANIZATION_HEADS.contains(&last_lower.as_str()) {
        EntityKind::Organization
    } else if EVENT_HEADS.contains(&last_lower.as_str()) {
        EntityKind::Event
    } else if LOCATION_HEADS.contains(&last_lower.as_str()) {
        EntityKind::Location
    } else if run.len() == 1 && is_acronym(first.2) {
        EntityKind::Organization
    } else if run.len() >= 2 && run.len() <= 3 {
        EntityKind::Person
    } else {
        // A lone capitalised word is too ambiguous to type.
        return None;
    };

    Some(Entity::new(span_text, kind, start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    fn kinds(entities: &[Entity]) -> Vec<(&str, EntityKind)> {
        entities.iter().map(|e| (e.text.as_str(), e.kind)).collect()
    }

    #[test]
    fn test_ner_acronym_organization() {
        let entities = RuleBasedNer::new().recognize("What happened to CEB restructuring process?");
        assert_eq!(kinds(&entities), vec![("CEB", EntityKind::Organization)]);
        assert_eq!(&"What happened to CEB restructuring process?"[17..20], "CEB");
        assert_eq!(entities[0].span.start, 17);
    }

    #[test]
    fn test_ner_gazetteer_multiword() {
        let text = "Power cuts announced by the Ceylon Electricity Board in Colombo";
        let entities = RuleBasedNer::new().recognize(text);
        assert_eq!(
            kinds(&entities),
            vec![
                ("Ceylon Electricity Board", EntityKind::Organization),
                ("Colombo", EntityKind::Location),
            ]
        );
    }

    #[test]
    fn test_ner_person_title_is_stripped() {
        let text = "Statement by President Anura Kumara Dissanayake on Monday";
        let entities = RuleBasedNer::new().recognize(text);
        assert!(entities
            .iter()
            .any(|e| e.text == "Anura Kumara Dissanayake" && e.kind == EntityKind::Person));
    }

    #[test]
    fn test_ner_heads() {
        let entities = RuleBasedNer::new().recognize("Floods in Southern Province after the Poson Festival");
        assert_eq!(
            kinds(&entities),
            vec![
                ("Southern Province", EntityKind::Location),
                ("Poson Festival", EntityKind::Event),
            ]
        );
    }

    #[test]
    fn test_ner_no_entities() {
        assert!(RuleBasedNer::new().recognize("what is going on with fuel prices").is_empty());
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        let text = "IMF talks: IMF and imf";
        let raw = vec![
            Entity::new("IMF", EntityKind::Organization, 0, 3),
            Entity::new("IMF", EntityKind::Organization, 11, 14),
            Entity::new("imf", EntityKind::Organization, 19, 22),
            Entity::new("IMF", EntityKind::Location, 11, 14),
        ];
        let entities = normalize_entities(raw, text);

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].span.start, 0);
        assert_eq!(entities[1].kind, EntityKind::Location);
    }

    #[test]
    fn test_normalize_reanchors_bad_spans() {
        let text = "Protests in Colombo";
        let raw = vec![Entity::new(" Colombo ", EntityKind::Location, 0, 99)];
        let entities = normalize_entities(raw, text);

        assert_eq!(entities[0].text, "Colombo");
        assert_eq!(entities[0].span.start, 12);
        assert_eq!(entities[0].span.end, 19);
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_to_empty() {
        let extractor = EntityExtractor::new(
            Arc::new(MockLlm::new().failing("extract_entities")),
            EntityStrategy::Llm,
            ResilienceConfig {
                call_timeout_ms: 1_000,
                retry_backoff_ms: 1,
            },
        );
        let (entities, degradation) = extractor.extract("CEB news").await;

        assert!(entities.is_empty());
        assert!(matches!(
            degradation,
            Some(Degradation::ExtractionUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_ner_strategy_through_stage() {
        let extractor = EntityExtractor::new(
            Arc::new(RuleBasedNer::new()),
            EntityStrategy::Ner,
            ResilienceConfig::default(),
        );
        let (entities, degradation) = extractor.extract("Tell me about the IMF bailout").await;

        assert!(degradation.is_none());
        assert_eq!(kinds(&entities), vec![("IMF", EntityKind::Organization)]);
    }
}
