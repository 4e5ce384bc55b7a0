//! Pinecone vector index over the REST query endpoint.
//!
//! Vector ids in the index are article ids. The index itself is built by the
//! ingestion job; this client only queries it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CapabilityError, CapabilityResult, PipelineError, Result};
use crate::security::{secret_from_env, SecretString};
use crate::traits::store::{VectorHit, VectorIndex};

/// Read-only client for one Pinecone index.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    api_key: SecretString,
    host: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Create a client for the index served at `host`.
    ///
    /// `host` is the index host shown in the Pinecone console, with or
    /// without the `https://` scheme.
    pub fn new(api_key: impl Into<SecretString>, host: impl Into<String>) -> Self {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            host: host.trim_end_matches('/').to_string(),
            namespace: None,
        }
    }

    /// Create from `PINECONE_API_KEY` and `PINECONE_INDEX_HOST`.
    pub fn from_env() -> Result<Self> {
        let api_key = secret_from_env("PINECONE_API_KEY")?;
        let host = std::env::var("PINECONE_INDEX_HOST")
            .map_err(|_| PipelineError::Config("PINECONE_INDEX_HOST not set".into()))?;
        Ok(Self::new(api_key, host))
    }

    /// Query within a namespace instead of the default one.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn search(&self, embedding: &[f32], top_k: usize) -> CapabilityResult<Vec<VectorHit>> {
        let request = QueryRequest {
            vector: embedding,
            top_k,
            include_values: false,
            include_metadata: false,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", self.api_key.expose())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::unavailable(format!(
                "Pinecone query error ({status}): {error_text}"
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(e.to_string()))?;

        debug!(matches = body.matches.len(), "Pinecone query complete");

        Ok(body
            .matches
            .into_iter()
            .map(|m| VectorHit::new(m.id, m.score))
            .collect())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
}
