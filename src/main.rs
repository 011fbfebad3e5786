use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use knowledge_agent::config::{Credentials, Settings};
use knowledge_agent::database::{QdrantConfig, DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};
use knowledge_agent::gemini::{
    GeminiConfig, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL,
};
use knowledge_agent::server::{router, AppState, SessionLimits};
use knowledge_agent::session::HostedConnector;

/// Knowledge Agent: chat with your documents using Gemini and Qdrant
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to serve the page on
    #[arg(long, env = "KNOWLEDGE_AGENT_ADDR", default_value = "127.0.0.1:8501")]
    addr: SocketAddr,

    /// Folder that uploads are saved to and documents are ingested from
    #[arg(long, env = "KNOWLEDGE_AGENT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Qdrant endpoint (gRPC)
    #[arg(long, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL)]
    qdrant_url: String,

    /// Collection the documents are written to
    #[arg(long, env = "QDRANT_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Gemini REST endpoint
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    gemini_base_url: String,

    #[arg(long, env = "GEMINI_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "GEMINI_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Target chunk size in estimated tokens
    #[arg(long, default_value_t = 1024)]
    chunk_size: usize,

    /// Chunks retrieved per question
    #[arg(long, default_value_t = 4)]
    top_k: u64,

    /// Most browser sessions kept in memory at once
    #[arg(long, default_value_t = 1000)]
    max_sessions: u64,

    /// Seconds of inactivity before a browser session is dropped
    #[arg(long, default_value_t = 1800)]
    session_idle_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let settings = Settings {
        data_dir: args.data_dir,
        chunk_size: args.chunk_size,
        top_k: args.top_k,
    };

    // API keys are only a preset: without them every session asks on the page
    let preset = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("{}; keys will be requested on the page", e);
            None
        }
    };

    let connector = HostedConnector {
        gemini: GeminiConfig {
            base_url: args.gemini_base_url,
            embedding_model: args.embedding_model,
            chat_model: args.chat_model,
            ..GeminiConfig::new(String::new())
        },
        qdrant: QdrantConfig {
            url: args.qdrant_url,
            api_key: String::new(),
            collection: args.collection,
        },
        settings: settings.clone(),
    };

    info!(
        "Serving documents from {} into collection {}",
        settings.data_dir.display(),
        connector.qdrant.collection
    );

    let limits = SessionLimits {
        max_sessions: args.max_sessions,
        idle_timeout: Duration::from_secs(args.session_idle_secs),
    };
    let state = AppState::with_limits(Arc::new(connector), settings, preset, limits);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;

    info!("Knowledge Agent listening on http://{}", args.addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
