//! OpenAI implementation of every pipeline capability.
//!
//! Uses gpt-4o-mini for judgments and drafting and text-embedding-3-small for
//! embeddings, over the chat completions and embeddings REST endpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsdesk::ai::OpenAI;
//!
//! let ai = Arc::new(OpenAI::new("sk-...").with_requests_per_second(5));
//! let orchestrator = Orchestrator::builder(config).embedder(ai.clone()).llm(ai).build()?;
//! ```

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CapabilityError, CapabilityResult, Result};
use crate::pipeline::prompts::{
    format_claims_prompt, format_draft_prompt, format_entail_prompt, format_entities_prompt,
    format_refine_prompt, format_relevance_prompt, SYSTEM_PROMPT,
};
use crate::security::{secret_from_env, SecretString};
use crate::traits::capability::{
    AnswerDrafter, Embedder, EntailmentJudge, EntityRecognizer, QueryRefinement, Refinement,
    RelevanceJudge,
};
use crate::types::{
    answer::AnswerStyle,
    article::Article,
    claim::Entailment,
    query::{Entity, EntityKind},
};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// OpenAI-backed capabilities.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    api_key: SecretString,
    model: String,
    embedding_model: String,
    embedding_dimensions: Option<usize>,
    base_url: String,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl OpenAI {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
            base_url: "https://api.openai.com/v1".to_string(),
            limiter: None,
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    ///
    /// `NEWSDESK_CHAT_MODEL` and `NEWSDESK_EMBEDDING_MODEL` override the
    /// default models when set.
    pub fn from_env() -> Result<Self> {
        let api_key = secret_from_env("OPENAI_API_KEY")?;
        let mut ai = Self::new(api_key);
        if let Ok(model) = std::env::var("NEWSDESK_CHAT_MODEL") {
            ai = ai.with_model(model);
        }
        if let Ok(model) = std::env::var("NEWSDESK_EMBEDDING_MODEL") {
            ai = ai.with_embedding_model(model);
        }
        Ok(ai)
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model (default: text-embedding-3-small).
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Request embeddings of this size, to match an existing index.
    pub fn with_embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.embedding_dimensions = Some(dimensions);
        self
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Limit outgoing requests. Zero disables the limit.
    pub fn with_requests_per_second(mut self, requests_per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // =========================================================================
    // Internal methods
    // =========================================================================

    async fn wait_for_permit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Chat completion in JSON mode, parsed into `T`.
    async fn chat_json<T: DeserializeOwned>(&self, user: &str) -> CapabilityResult<T> {
        let content = self.chat(user).await?;
        parse_json(&content)
    }

    async fn chat(&self, user: &str) -> CapabilityResult<String> {
        self.wait_for_permit().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::unavailable(format!(
                "OpenAI API error: {}",
                error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityError::malformed("No response from OpenAI"))
    }

    async fn embed_text(&self, text: &str) -> CapabilityResult<Vec<f32>> {
        self.wait_for_permit().await;

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
            dimensions: self.embedding_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::unavailable(format!(
                "OpenAI embedding error: {}",
                error_text
            )));
        }

        let embed_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(e.to_string()))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CapabilityError::malformed("No embedding from OpenAI"))
    }
}

/// Parse a JSON reply, tolerating a markdown code fence around it.
fn parse_json<T: DeserializeOwned>(content: &str) -> CapabilityResult<T> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(unfenced.trim())?)
}

#[async_trait]
impl Embedder for OpenAI {
    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>> {
        self.embed_text(text).await
    }
}

#[async_trait]
impl QueryRefinement for OpenAI {
    async fn refine(&self, query: &str) -> CapabilityResult<Refinement> {
        let reply: RefineJson = self.chat_json(&format_refine_prompt(query)).await?;
        debug!(needs_refinement = reply.needs_refinement, "Refinement decided");
        Ok(match reply.refined_query {
            Some(text) if reply.needs_refinement && !text.trim().is_empty() => {
                Refinement::rewrite(text.trim())
            }
            _ => Refinement::unchanged(),
        })
    }
}

#[async_trait]
impl EntityRecognizer for OpenAI {
    async fn extract_entities(&self, text: &str) -> CapabilityResult<Vec<Entity>> {
        let reply: EntitiesJson = self.chat_json(&format_entities_prompt(text)).await?;
        Ok(reply
            .entities
            .into_iter()
            .filter_map(|e| {
                let kind = EntityKind::from_label(&e.entity_type)?;
                Some(Entity::locate(e.text, kind, text))
            })
            .collect())
    }
}

#[async_trait]
impl RelevanceJudge for OpenAI {
    async fn judge_relevance(&self, query: &str, article: &Article) -> CapabilityResult<bool> {
        let reply: RelevanceJson = self
            .chat_json(&format_relevance_prompt(query, article))
            .await?;
        Ok(reply.relevant)
    }
}

#[async_trait]
impl EntailmentJudge for OpenAI {
    async fn entail(&self, claim: &str, article: &Article) -> CapabilityResult<Entailment> {
        let reply: EntailJson = self.chat_json(&format_entail_prompt(claim, article)).await?;
        Entailment::from_label(&reply.verdict).ok_or_else(|| {
            CapabilityError::malformed(format!("unknown entailment verdict: {}", reply.verdict))
        })
    }
}

#[async_trait]
impl AnswerDrafter for OpenAI {
    async fn draft(
        &self,
        query: &str,
        style: AnswerStyle,
        articles: &[Arc<Article>],
    ) -> CapabilityResult<String> {
        let refs: Vec<&Article> = articles.iter().map(|a| &**a).collect();
        let reply: DraftJson = self
            .chat_json(&format_draft_prompt(query, style, &refs))
            .await?;
        if reply.answer.trim().is_empty() {
            return Err(CapabilityError::malformed("empty draft"));
        }
        Ok(reply.answer)
    }

    async fn extract_claims(&self, body: &str) -> CapabilityResult<Vec<String>> {
        let reply: ClaimsJson = self.chat_json(&format_claims_prompt(body)).await?;
        Ok(reply.claims)
    }
}

// Request/Response types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct RefineJson {
    needs_refinement: bool,
    #[serde(default)]
    refined_query: Option<String>,
}

#[derive(Deserialize)]
struct EntitiesJson {
    #[serde(default)]
    entities: Vec<EntityJson>,
}

#[derive(Deserialize)]
struct EntityJson {
    text: String,
    #[serde(rename = "type")]
    entity_type: String,
}

#[derive(Deserialize)]
struct RelevanceJson {
    relevant: bool,
}

#[derive(Deserialize)]
struct EntailJson {
    verdict: String,
}

#[derive(Deserialize)]
struct DraftJson {
    answer: String,
}

#[derive(Deserialize)]
struct ClaimsJson {
    #[serde(default)]
    claims: Vec<String>,
}
