use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocrgate::api::{create_router, AppState};
use ocrgate::config::Config;
use ocrgate::ocr::OcrProvider;

#[derive(Parser)]
#[command(name = "ocrgate")]
#[command(about = "HTTP gateway that extracts text from uploaded images via remote OCR")]
struct Args {
    /// OCR backend to use (ocrspace, vision, textract). Overrides OCR_PROVIDER.
    #[arg(long)]
    provider: Option<String>,

    /// Port to listen on. Overrides OCRGATE_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Validate configuration and credentials, then exit without serving
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocrgate=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(provider) = args.provider {
        config.ocr.provider = provider;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(e) = config.validate() {
        tracing::error!("Refusing to start: {}", e);
        return Err(e.into());
    }

    tracing::info!("Initializing OCR provider: {}...", config.ocr.provider);
    let ocr = match OcrProvider::new(&config.ocr).await {
        Ok(ocr) => ocr,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            return Err(e.into());
        }
    };

    if args.check_config {
        tracing::info!(
            "Configuration OK (provider={}, timeout={}s)",
            ocr.provider_name(),
            config.ocr.timeout_secs
        );
        return Ok(());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, ocr);
    let app = create_router(state);

    tracing::info!("ocrgate starting on http://{}", addr);
    tracing::info!("  Upload:       POST http://{}/api/upload", addr);
    tracing::info!("  Health check: http://{}/api/health", addr);

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

    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
