use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use duet::chat::ChatService;
use duet::config::Config;
use duet::intro::LlmIntroducer;
use duet::llm::AnthropicProvider;
use duet::matchmaking::UnpairedPool;
use duet::server::{AppState, build_app};
use duet::session::SessionRegistry;

/// Duet - anonymous one-on-one chat with AI-guided introductions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "duet.toml")]
    config: String,

    /// Host to bind (overrides config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;

    // CLI overrides config
    if let Some(host) = args.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let api_key = std::env::var(&config.llm.api_key_env).with_context(|| {
        format!(
            "API key environment variable '{}' is not set",
            config.llm.api_key_env
        )
    })?;
    let provider = Arc::new(AnthropicProvider::new(
        reqwest::Client::new(),
        api_key,
        config.llm.base_url.clone(),
    ));
    let introducer = Arc::new(LlmIntroducer::new(
        provider,
        config.llm.model.clone(),
        Some(config.llm.temperature),
        Some(config.llm.max_tokens),
    ));
    info!(model = %config.llm.model, "LLM provider configured");

    let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
    let chat = Arc::new(ChatService::new(
        registry.clone(),
        introducer.clone(),
        introducer,
    ));

    let state = AppState {
        chat,
        keep_alive_interval_seconds: config.server.keep_alive_interval_seconds,
    };
    let app = build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down"),
        _ = terminate => warn!("Received SIGTERM, shutting down"),
    }
}
