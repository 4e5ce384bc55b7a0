//! Command line front end for the news query pipeline.
//!
//! Loads a JSON article corpus, answers one query against it and prints the
//! answer record as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use newsdesk::{
    Article, EntityRecognizer, EntityStrategy, MemoryStore, NewsSource, OpenAI, Orchestrator,
    PineconeIndex, PipelineConfig, RuleBasedNer, SearchFilter, VectorIndex,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "Answer questions about Sri Lankan news with verified claims")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a query from a corpus of articles
    Ask {
        query: String,

        /// JSON array of articles
        #[arg(long)]
        corpus: PathBuf,

        /// Search the Pinecone index instead of embedding the corpus locally
        #[arg(long)]
        pinecone: bool,

        #[arg(long, env = "NEWSDESK_TOP_K")]
        top_k: Option<usize>,

        /// Minimum combined relevance score to keep an article
        #[arg(long, env = "NEWSDESK_RELEVANCE_THRESHOLD")]
        threshold: Option<f32>,

        /// Maximum in-flight model calls per stage
        #[arg(long, env = "NEWSDESK_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Extract entities with rule-based NER instead of the LLM
        #[arg(long)]
        ner: bool,

        /// Only use articles from these sources (e.g. newswire, adaderana)
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Only use articles published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        after: Option<NaiveDate>,

        /// Only use articles published before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<NaiveDate>,

        #[arg(long)]
        pretty: bool,
    },

    /// Print the entities found in a piece of text
    Entities {
        text: String,

        /// Use the LLM instead of rule-based NER
        #[arg(long)]
        llm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,newsdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            query,
            corpus,
            pinecone,
            top_k,
            threshold,
            concurrency,
            ner,
            sources,
            after,
            before,
            pretty,
        } => {
            let mut config = PipelineConfig::default();
            if let Some(k) = top_k {
                config = config.with_top_k(k);
            }
            if let Some(t) = threshold {
                config = config.with_threshold(t);
            }
            if let Some(n) = concurrency {
                config = config.with_concurrency(n);
            }
            if ner {
                config = config.with_entity_strategy(EntityStrategy::Ner);
            }
            let filter = search_filter(&sources, after, before)?;

            let llm = Arc::new(OpenAI::from_env()?.with_requests_per_second(10));
            let articles = load_corpus(&corpus)?;
            let store = Arc::new(MemoryStore::new());

            let index: Arc<dyn VectorIndex> = if pinecone {
                for article in articles {
                    store.insert_article(article).await;
                }
                Arc::new(PineconeIndex::from_env()?)
            } else {
                tracing::info!(count = articles.len(), "Embedding corpus");
                for article in articles {
                    let id = article.id.clone();
                    store
                        .index_article(article, &*llm)
                        .await
                        .with_context(|| format!("Failed to embed article {id}"))?;
                }
                store.clone()
            };

            let orchestrator = Orchestrator::builder(config)
                .embedder(llm.clone())
                .vector_index(index)
                .document_store(store)
                .llm(llm)
                .build()?;

            let record = orchestrator.run(&query, &filter).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&record)?
            } else {
                serde_json::to_string(&record)?
            };
            println!("{json}");
        }

        Commands::Entities { text, llm } => {
            let recognizer: Arc<dyn EntityRecognizer> = if llm {
                Arc::new(OpenAI::from_env()?)
            } else {
                Arc::new(RuleBasedNer::new())
            };
            let entities = recognizer.extract_entities(&text).await?;
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
    }

    Ok(())
}

fn load_corpus(path: &Path) -> Result<Vec<Article>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus {}", path.display()))?;
    let articles: Vec<Article> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse corpus {}", path.display()))?;
    Ok(articles)
}

fn search_filter(
    sources: &[String],
    after: Option<NaiveDate>,
    before: Option<NaiveDate>,
) -> Result<SearchFilter> {
    let mut parsed = Vec::with_capacity(sources.len());
    for label in sources {
        match NewsSource::from_label(label) {
            Some(source) => parsed.push(source),
            None => bail!("Unknown news source: {label}"),
        }
    }

    let mut filter = if parsed.is_empty() {
        SearchFilter::new()
    } else {
        SearchFilter::for_sources(parsed)
    };
    if let Some(date) = after {
        filter = filter.with_published_after(start_of(date));
    }
    if let Some(date) = before {
        filter = filter.with_published_before(start_of(date));
    }
    Ok(filter)
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}
