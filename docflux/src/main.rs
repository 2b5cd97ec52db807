use std::fs;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docflux::api::{create_router, AppState};
use docflux::config::Config;
use docflux::processing::{supported_content_types, Engines};

#[derive(Parser)]
#[command(name = "docflux")]
#[command(about = "Self-hostable document extraction service")]
struct Args {
    /// Bind address, overrides DOCFLUX_HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides DOCFLUX_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docflux=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    fs::create_dir_all(&config.upload.dir)?;
    tracing::info!("Upload directory: {}", config.upload.dir.display());

    tracing::info!("Initializing OCR languages: {}...", config.ocr.languages);
    tracing::info!(
        "Initializing speech model: {}...",
        config
            .transcription
            .model_path
            .as_deref()
            .unwrap_or("<none>")
    );
    let engines = Engines::from_config(&config);
    if !engines.speech.is_available() {
        tracing::warn!("Transcription unavailable - audio requests will return 503");
    }
    let content_types: Vec<_> = supported_content_types().collect();
    tracing::debug!(?content_types, "Accepted content types");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState::new(config, engines));

    tracing::info!("Docflux starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
