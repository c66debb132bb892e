//! Opswatch - tiered incident-response controller
//!
//! Starts the watchdog in the background and serves the status endpoints
//! until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use opswatch::llm::OpenAiChatClient;
use opswatch::mcp::{McpService, ToolBackends};
use opswatch::config::LogFormat;
use opswatch::{build_watchdog, routes, AppState, Config, StatusBoard};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "opswatch=info,tower_http=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    match LogFormat::from_env() {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    info!("Starting Opswatch");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    routes::metrics::init_metrics();
    info!("Metrics initialized");

    let mcp = Arc::new(McpService::new(config.npx_command.clone()));

    let shutdown = CancellationToken::new();

    // Repository tools must be connected before the stages aggregate tools.
    match config.github_token.as_deref() {
        Some(token) => {
            if let Err(e) = mcp.github_client(token, &shutdown).await {
                warn!(error = %e, "Failed to connect to the GitHub backend");
            }
        }
        None => warn!("GITHUB_TOKEN not set, repository tools unavailable"),
    }

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("Failed to build HTTP client")?;
    let reasoning = OpenAiChatClient::new(http_client, &config);
    if !reasoning.is_configured() {
        warn!("LLM_API_KEY not set, investigation and remediation will fail");
    }

    let status = Arc::new(StatusBoard::new());
    let watchdog = build_watchdog(&config, mcp.clone(), Arc::new(reasoning), status.clone());

    let watchdog_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { watchdog.run(shutdown).await }
    });

    let state = Arc::new(AppState::new(config.clone(), status));
    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid OPSWATCH_HOST/OPSWATCH_PORT")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = watchdog_task.await {
        warn!(error = %e, "Watchdog task ended abnormally");
    }
    mcp.shutdown().await;

    info!("Opswatch shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating shutdown");
        }
    }
}
