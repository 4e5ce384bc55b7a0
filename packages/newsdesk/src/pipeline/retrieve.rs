//! Vector retrieval of candidate articles.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::resilience::call_with_retry;
use crate::error::{PipelineError, Result};
use crate::traits::{
    capability::Embedder,
    store::{DocumentStore, VectorIndex},
};
use crate::types::{
    article::{Article, ArticleId},
    candidate::Candidate,
    config::{ResilienceConfig, RetrievalConfig, SearchFilter},
    query::Entity,
};

/// Finds the articles nearest to the refined query.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    config: RetrievalConfig,
    resilience: ResilienceConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        config: RetrievalConfig,
        resilience: ResilienceConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            config,
            resilience,
        }
    }

    /// Retrieve up to `top_k` candidates for `text`.
    ///
    /// An empty result is not an error; the caller reports insufficient
    /// evidence. Candidates are ordered by similarity (highest first), ties
    /// broken by recency.
    pub async fn retrieve(
        &self,
        text: &str,
        entities: &[Entity],
        filter: &SearchFilter,
    ) -> Result<Vec<Candidate>> {
        let embedding = call_with_retry(&self.resilience, "embed", || self.embedder.embed(text))
            .await
            .map_err(PipelineError::RetrievalUnavailable)?;

        let depth = self.config.search_depth.max(self.config.top_k);
        let hits = call_with_retry(&self.resilience, "vector_search", || {
            self.index.search(&embedding, depth)
        })
        .await
        .map_err(PipelineError::RetrievalUnavailable)?;

        if hits.is_empty() {
            debug!("Vector index returned no hits");
            return Ok(Vec::new());
        }

        // Highest score wins if the index repeats an id.
        let mut scores: IndexMap<ArticleId, f32> = IndexMap::new();
        for hit in hits {
            let score = scores.entry(hit.article_id).or_insert(hit.score);
            if hit.score > *score {
                *score = hit.score;
            }
        }

        let ids: Vec<ArticleId> = scores.keys().cloned().collect();
        let articles = call_with_retry(&self.resilience, "find_articles", || {
            self.store.find_articles_by_ids(&ids)
        })
        .await
        .map_err(PipelineError::DocumentStoreUnavailable)?;

        let mut by_id: HashMap<ArticleId, Article> =
            articles.into_iter().map(|a| (a.id.clone(), a)).collect();

        let mut candidates = Vec::with_capacity(scores.len());
        for (id, score) in scores {
            let Some(article) = by_id.remove(&id) else {
                warn!(article_id = %id, "Index hit has no stored article, skipping");
                continue;
            };
            if !filter.matches(&article) {
                continue;
            }
            let overlap = entity_overlap(entities, &article);
            candidates.push(Candidate::new(Arc::new(article), score, overlap));
        }

        let boost = self.config.entity_boost;
        candidates.sort_by(|a, b| {
            let rank_a = a.similarity_score + boost * a.entity_overlap_score;
            let rank_b = b.similarity_score + boost * b.entity_overlap_score;
            rank_b.partial_cmp(&rank_a).unwrap_or(Ordering::Equal)
        });
        candidates.truncate(self.config.top_k);
        candidates.sort_by(by_similarity_then_recency);

        debug!(
            requested = depth,
            returned = candidates.len(),
            "Candidates retrieved"
        );

        Ok(candidates)
    }
}

/// Fraction of `entities` mentioned verbatim (case-insensitive) in the article.
///
/// Zero when there are no entities.
pub fn entity_overlap(entities: &[Entity], article: &Article) -> f32 {
    if entities.is_empty() {
        return 0.0;
    }
    let found = entities
        .iter()
        .filter(|e| article.mentions(&e.text))
        .count();
    found as f32 / entities.len() as f32
}

fn by_similarity_then_recency(a: &Candidate, b: &Candidate) -> Ordering {
    b.similarity_score
        .partial_cmp(&a.similarity_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.article.published_at.cmp(&a.article.published_at))
        .then_with(|| a.article.id.cmp(&b.article.id))
}
