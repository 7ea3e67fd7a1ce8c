//! HTTP server for receipt scanning.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use parago_core::{
    spawn_enrichment_worker, spawn_sweeper, Categorizer, ChatCompletionsClient, HttpAnalyzeBackend,
    MemoryStore, OcrClient, RecordStore, ScanConfig, ScanPipeline, TextGenerator,
};
use parago_server::{build_router, AppState, ServerConfig};

/// Receipt scanning service - turn receipt photos into transactions
#[derive(Parser)]
#[command(name = "parago")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address override
    #[arg(long)]
    host: Option<String>,

    /// Port override
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match cli.config.as_deref() {
        Some(path) => ScanConfig::from_file(Path::new(path))?,
        None => ScanConfig::default(),
    };
    config.apply_env();

    let mut server = ServerConfig::from_env();
    if let Some(host) = cli.host {
        server.host = host;
    }
    if let Some(port) = cli.port {
        server.port = port;
    }

    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());

    let backend = HttpAnalyzeBackend::new(&config.ocr)?;
    let ocr = OcrClient::new(Arc::new(backend), &config.ocr);

    let mut pipeline = ScanPipeline::new(store.clone(), ocr, config.clone());
    if config.llm_enabled() {
        let llm: Arc<dyn TextGenerator> =
            Arc::new(ChatCompletionsClient::new(&config.categorize)?);
        let worker = spawn_enrichment_worker(
            store.clone(),
            Categorizer::new(llm.clone()),
            config.categorize.clone(),
        );
        pipeline = pipeline.with_text_generator(llm).with_enrichment(worker);
        info!("language-model enrichment enabled");
    }
    let _sweeper = if config.sweep.enabled {
        Some(spawn_sweeper(store.clone(), config.sweep.clone()))
    } else {
        None
    };

    let state = AppState::new(pipeline, store, config.upload.max_file_bytes);
    let app = build_router(state);

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
