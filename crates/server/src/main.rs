use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapefetch_core::{
    create_authenticator, load_config, load_config_from_env, validate_config, Authenticator,
    Config, FfmpegTranscoder, HttpFetcher, LogFormat, Orchestrator, Transcoder,
};
use tapefetch_server::api::{create_router, WsBroadcaster};
use tapefetch_server::state::AppState;

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "TAPEFETCH_CONFIG";

/// How long shutdown waits for a cancelled job to clean up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = read_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format);
    info!("Configuration loaded successfully");
    info!(
        "Downloads are confined to {}",
        config.pipeline.download_dir.display()
    );

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let transcoder = FfmpegTranscoder::new(config.transcoder.clone());
    if let Err(e) = transcoder.validate().await {
        warn!("Transcoder not usable yet, conversions will fail: {}", e);
    }

    let ws_broadcaster = WsBroadcaster::default();
    info!("WebSocket broadcaster initialized");

    let orchestrator = Orchestrator::new(
        config.pipeline.clone(),
        config.transcoder.spec(),
        Arc::new(HttpFetcher::new(config.fetcher.clone())),
        Arc::new(transcoder),
        Arc::new(ws_broadcaster.clone()),
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        orchestrator.clone(),
        ws_broadcaster,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Ok(job_id) = orchestrator.cancel().await {
        info!(job_id = %job_id, "Cancelling active job");
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while orchestrator.is_busy().await {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("Active job did not finish within {:?}", SHUTDOWN_GRACE);
        }
    }

    Ok(())
}

/// Loads the config file named by `TAPEFETCH_CONFIG`, or `config.toml`.
///
/// An explicitly named file must exist. Without one, a missing
/// `config.toml` means environment variables and defaults only.
fn read_config() -> Result<Config> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let path = PathBuf::from(path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        Err(_) => {
            let path = Path::new("config.toml");
            if path.exists() {
                load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                load_config_from_env().context("Failed to load config from environment")
            }
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
