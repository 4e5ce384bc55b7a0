//! LLM prompts for the news pipeline.
//!
//! Every prompt asks for JSON so responses can be parsed strictly.

use crate::types::{answer::AnswerStyle, article::Article};

/// System prompt shared by all calls.
pub const SYSTEM_PROMPT: &str = "You are a careful assistant for a Sri Lankan news service. \
Answer only from the material you are given and reply with JSON only.";

/// Prompt for deciding whether a query needs rewriting.
pub const REFINE_PROMPT: &str = r#"Decide whether this news search query is ambiguous, underspecified, or colloquial compared to formal news terminology.

If it is, rewrite it to be more effective for vector search over Sri Lankan news: add the entities, time frame, or formal phrasing it implies. Preserve the original intent. Keep it concise and do not invent years or numbers.

Query: {query}

Output JSON:
{
    "needs_refinement": true | false,
    "refined_query": "the rewritten query, or null when no refinement is needed"
}"#;

/// Prompt for named-entity extraction.
pub const ENTITIES_PROMPT: &str = r#"Extract the named entities from this news query.

Text: {text}

Types:
- ORGANIZATION: companies, boards, ministries, parties, unions
- PERSON: people
- LOCATION: countries, cities, provinces, places
- EVENT: elections, festivals, attacks, crises, named events

Copy each entity exactly as written in the text.

Output JSON:
{
    "entities": [
        {"text": "entity text", "type": "ORGANIZATION" | "PERSON" | "LOCATION" | "EVENT"}
    ]
}"#;

/// Prompt for judging whether an article answers a query.
pub const RELEVANCE_PROMPT: &str = r#"Is this news article relevant to this specific query? An article that only shares keywords but is about something else is not relevant.

Query: {query}

Article title: {title}
Article:
{article}

Output JSON:
{
    "relevant": true | false
}"#;

/// Prompt for claim entailment.
pub const ENTAIL_PROMPT: &str = r#"Does this news article support, partially support, contradict, or say nothing about the claim?

- SUPPORTS: the article states the claim in full
- PARTIAL: the article backs the claim but only covers part of it
- CONTRADICTS: the article states something incompatible with the claim
- NEUTRAL: the article does not address the claim

Claim: {claim}

Article title: {title}
Article:
{article}

Output JSON:
{
    "verdict": "SUPPORTS" | "PARTIAL" | "CONTRADICTS" | "NEUTRAL"
}"#;

/// Prompt for drafting the answer.
pub const DRAFT_PROMPT: &str = r#"Answer the question using only the news articles below.

Question: {query}

Format the answer as {style}.

Articles:
{articles}

Output JSON:
{
    "answer": "the formatted answer"
}"#;

/// Prompt for splitting an answer into atomic claims.
pub const CLAIMS_PROMPT: &str = r#"Break this answer into atomic factual claims. Each claim must be one self-contained sentence that can be checked on its own. Skip opinions and headings.

Answer:
{body}

Output JSON:
{
    "claims": ["claim 1", "claim 2"]
}"#;

pub fn format_refine_prompt(query: &str) -> String {
    REFINE_PROMPT.replace("{query}", query)
}

pub fn format_entities_prompt(text: &str) -> String {
    ENTITIES_PROMPT.replace("{text}", text)
}

pub fn format_relevance_prompt(query: &str, article: &Article) -> String {
    RELEVANCE_PROMPT
        .replace("{query}", query)
        .replace("{title}", &article.title)
        .replace("{article}", &article.preview())
}

pub fn format_entail_prompt(claim: &str, article: &Article) -> String {
    ENTAIL_PROMPT
        .replace("{claim}", claim)
        .replace("{title}", &article.title)
        .replace("{article}", &article.preview())
}

/// Format the drafting prompt. Articles are numbered and dated.
pub fn format_draft_prompt(query: &str, style: AnswerStyle, articles: &[&Article]) -> String {
    let articles_text = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "=== ARTICLE {} ({}, {}) ===\n{}\n{}\n",
                i + 1,
                a.source,
                a.published_at.format("%Y-%m-%d"),
                a.title,
                a.preview()
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    DRAFT_PROMPT
        .replace("{query}", query)
        .replace("{style}", style.instruction())
        .replace("{articles}", &articles_text)
}

pub fn format_claims_prompt(body: &str) -> String {
    CLAIMS_PROMPT.replace("{body}", body)
}
