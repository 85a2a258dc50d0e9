use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tutorrag::api::server::ApiServer;
use tutorrag::composer::http::HttpComposer;
use tutorrag::composer::mock::MockComposer;
use tutorrag::config::Config;
use tutorrag::db::Db;
use tutorrag::embedder::http::HttpEmbedder;
use tutorrag::embedder::mock::MockEmbedder;
use tutorrag::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "tutorrag", version, about = "Retrieval-augmented tutoring server")]
struct Args {
    /// Path to the JSON config file (defaults to ./config.json)
    #[arg(short, long, default_value = "")]
    config: String,

    /// Address to bind the HTTP server to
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    info!("Starting tutorrag server...");

    // 1. Load and validate config
    let config = Arc::new(Config::load(&args.config)?);
    config.validate()?;

    // 2. Init vector index
    let db = Db::open(&config.db_path, config.embedding.dimensions)
        .context("Failed to open database")?;
    let db = Arc::new(TokioMutex::new(db));

    // 3. Init embedder
    let embedder: Arc<dyn tutorrag::embedder::Embedder> = if config.embedding.endpoint.is_some() {
        Arc::new(HttpEmbedder::new(&config.embedding)?)
    } else {
        warn!("embedding.endpoint not set, using mock embedder");
        Arc::new(MockEmbedder::new(config.embedding.dimensions))
    };

    // 4. Init composer
    let composer: Arc<dyn tutorrag::composer::Composer> = match HttpComposer::new(&config.composer)
    {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!("{e}, using mock composer");
            Arc::new(MockComposer)
        }
    };

    // 5. Build pipeline
    let pipeline = Arc::new(Pipeline::new(db, embedder, composer, config));

    // 6. Start HTTP server, stop on Ctrl-C
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let server = ApiServer::new(pipeline);
    server.serve(&args.listen, shutdown).await?;

    Ok(())
}
