//! In-memory article store and vector index for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::CapabilityResult;
use crate::traits::{
    capability::Embedder,
    store::{cosine_similarity, DocumentStore, VectorHit, VectorIndex},
};
use crate::types::article::{Article, ArticleId};

/// In-memory storage for articles and their embeddings.
///
/// Serves as both [`DocumentStore`] and [`VectorIndex`], with brute-force
/// cosine search. Not suitable for production as data is lost on restart.
pub struct MemoryStore {
    articles: RwLock<HashMap<ArticleId, Article>>,
    embeddings: RwLock<HashMap<ArticleId, Vec<f32>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(HashMap::new()),
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-loaded with articles and their embeddings.
    pub fn with_articles(entries: impl IntoIterator<Item = (Article, Vec<f32>)>) -> Self {
        let mut articles = HashMap::new();
        let mut embeddings = HashMap::new();
        for (article, embedding) in entries {
            embeddings.insert(article.id.clone(), embedding);
            articles.insert(article.id.clone(), article);
        }
        Self {
            articles: RwLock::new(articles),
            embeddings: RwLock::new(embeddings),
        }
    }

    /// Store an article without an embedding. It can be fetched but never
    /// appears in search results.
    pub async fn insert_article(&self, article: Article) {
        self.articles
            .write()
            .await
            .insert(article.id.clone(), article);
    }

    /// Store the embedding for an article id.
    pub async fn insert_embedding(&self, id: ArticleId, embedding: Vec<f32>) {
        self.embeddings.write().await.insert(id, embedding);
    }

    /// Embed an article's title and preview with `embedder`, then store both.
    pub async fn index_article(
        &self,
        article: Article,
        embedder: &dyn Embedder,
    ) -> CapabilityResult<()> {
        let embedding = embedder.embed(&embedding_text(&article)).await?;
        self.insert_embedding(article.id.clone(), embedding).await;
        self.insert_article(article).await;
        Ok(())
    }
}

/// Text embedded for an article: the title followed by the body preview.
pub fn embedding_text(article: &Article) -> String {
    format!("{}\n{}", article.title, article.preview())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_articles_by_ids(&self, ids: &[ArticleId]) -> CapabilityResult<Vec<Article>> {
        let articles = self.articles.read().await;
        Ok(ids.iter().filter_map(|id| articles.get(id).cloned()).collect())
    }
}

#[async_trait]
impl VectorIndex for MemoryStore {
    async fn search(&self, embedding: &[f32], top_k: usize) -> CapabilityResult<Vec<VectorHit>> {
        let embeddings = self.embeddings.read().await;

        let mut hits: Vec<VectorHit> = embeddings
            .iter()
            .map(|(id, stored)| VectorHit {
                article_id: id.clone(),
                score: cosine_similarity(embedding, stored),
            })
            .collect();

        // Sort by score descending, id ascending for stable output.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::article::NewsSource;
    use chrono::Utc;

    fn article(id: &str) -> Article {
        Article::new(id, NewsSource::NewsFirst, format!("Title {id}"), "body", Utc::now())
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_unknown() {
        let store = MemoryStore::new();
        store.insert_article(article("a")).await;
        store.insert_article(article("b")).await;

        let found = store
            .find_articles_by_ids(&["b".into(), "missing".into(), "a".into()])
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_vector_search() {
        let store = MemoryStore::with_articles([
            (article("a"), vec![1.0, 0.0, 0.0]),
            (article("b"), vec![0.0, 1.0, 0.0]),
            (article("c"), vec![0.7, 0.7, 0.0]),
        ]);

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].article_id.as_str(), "a");
        assert!((hits[0].score - 1.0).abs() < 0.001);
        assert_eq!(hits[1].article_id.as_str(), "c");
    }

    #[tokio::test]
    async fn test_index_article_makes_it_searchable() {
        let embedder = crate::testing::HashEmbedder::new(64);
        let store = MemoryStore::new();
        let indexed = article("a");
        let query = embedder.embed_text(&embedding_text(&indexed));

        store.index_article(indexed, &embedder).await.unwrap();
        store.insert_article(article("unembedded")).await;

        let hits = store.search(&query, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].article_id.as_str(), "a");
        assert!((hits[0].score - 1.0).abs() < 0.001);

        let found = store
            .find_articles_by_ids(&["unembedded".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
