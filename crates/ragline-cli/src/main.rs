mod config;
mod server;

use clap::{Parser, Subcommand, ValueEnum};
use config::{EmbeddingConfig, EmbeddingProviderKind, LogFormat, RaglineConfig};
use ragline_agent::excerpt::content_excerpt;
use ragline_agent::{build_backend, AnswerGenerator, RagService};
use ragline_core::SearchResult;
use ragline_memory::{
    ChunkStore, EmbeddingProvider, FileChunkStore, GeminiEmbedding, HybridRanker, LocalEmbedding,
    OpenAiEmbedding,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEARCH_EXCERPT_CHARS: usize = 150;

#[derive(Parser)]
#[command(name = "ragline", about = "Ragline: hybrid retrieval question answering")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ragline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the corpus
    Ask {
        /// The question (words are joined with spaces)
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Run a retrieval query and print the ranked chunks
    Search {
        query: String,
        #[arg(long, value_enum, default_value_t = SearchMode::Hybrid)]
        mode: SearchMode,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Minimum cosine similarity (vector mode only)
        #[arg(short, long, default_value_t = 0.7)]
        threshold: f32,
    },
    /// Print corpus statistics
    Stats,
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchMode {
    Vector,
    Text,
    Hybrid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = RaglineConfig::load(&cli.config).await?;
    init_tracing(config.logging.format);
    run(cli.command, &config).await
}

async fn run(command: Commands, config: &RaglineConfig) -> anyhow::Result<()> {
    let store = Arc::new(FileChunkStore::open(config.corpus.dir.clone()).await?);
    info!(dir = %store.dir().display(), "Corpus loaded");

    match command {
        Commands::Search {
            query,
            mode,
            limit,
            threshold,
        } => {
            let ranker = build_ranker(config, &store)?;
            let results = match mode {
                SearchMode::Vector => ranker.similarity().search(&query, limit, threshold).await?,
                SearchMode::Text => ranker.lexical().search(&query, limit).await?,
                SearchMode::Hybrid => {
                    let settings = config.retrieval.settings();
                    ranker
                        .search(&query, limit, settings.vector_weight, settings.text_weight)
                        .await?
                }
            };
            print_results(&results);
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Ask { question } => {
            let service = build_service(config, store)?;
            let question = question.join(" ");
            let response = service.generate_response(&question).await?;
            println!("{}\n", response.answer);
            for (i, source) in response.sources.iter().enumerate() {
                println!("[{}] {} ({})", i + 1, source.title, source.url);
                println!("    {}", source.excerpt);
            }
        }
        Commands::Serve { host, port } => {
            let service = Arc::new(build_service(config, store)?);
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let app = server::build_router(service);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Ragline listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Embedder and ranker are built per command so `stats` needs no API key.
fn build_ranker(config: &RaglineConfig, store: &Arc<FileChunkStore>) -> anyhow::Result<HybridRanker> {
    let embedder = build_embedder(&config.embedding)?;
    Ok(HybridRanker::new(store.clone(), embedder).with_timeouts(config.retrieval.timeouts()))
}

fn build_service(config: &RaglineConfig, store: Arc<FileChunkStore>) -> anyhow::Result<RagService> {
    let ranker = build_ranker(config, &store)?;
    if config.model.api_key.trim().is_empty() {
        anyhow::bail!(
            "No API key for the generative model; set {} or model.api_key",
            config.model.provider.api_key_env()
        );
    }
    let backend = build_backend(config.model.clone());
    info!(backend = backend.name(), model = %config.model.model_id, "Model configured");
    let generator = AnswerGenerator::new(backend, store.clone(), config.generation.clone());
    Ok(RagService::new(store, ranker, generator).with_retrieval(config.retrieval.settings()))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn build_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let require_key = |var: &str| -> anyhow::Result<()> {
        if config.api_key.trim().is_empty() {
            anyhow::bail!("No API key for embeddings; set {var} or embedding.api_key");
        }
        Ok(())
    };
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Local => Arc::new(LocalEmbedding::new(config.dimension)),
        EmbeddingProviderKind::Gemini => {
            require_key("GOOGLE_API_KEY")?;
            Arc::new(GeminiEmbedding::new(
                config.api_key.clone(),
                config.model_id.clone(),
                config.dimension,
                config.api_base_url.clone(),
            ))
        }
        EmbeddingProviderKind::OpenAi => {
            require_key("OPENAI_API_KEY")?;
            Arc::new(OpenAiEmbedding::new(
                config.api_key.clone(),
                config.model_id.clone(),
                config.dimension,
                config.api_base_url.clone(),
            ))
        }
    };
    Ok(embedder)
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        println!("{}. {} (score {:.4})", i + 1, r.chunk.display_title(), r.score);
        println!("   {}", r.chunk.url);
        println!("   {}", content_excerpt(&r.chunk.content, SEARCH_EXCERPT_CHARS));
    }
}
