use clap::Parser;
use shellcoach::analyzer::Analyzer;
use shellcoach::config::AppConfig;
use shellcoach::handler::{self, AppState};
use shellcoach::history::HistorySource;
use shellcoach::provider;
use shellcoach::settings::SettingsHandle;
use shellcoach::storage::{self, SuggestionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Parser)]
#[command(name = "shellcoach", about = "LLM suggestions for your shell history")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellcoach=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        cache_dir = %config.cache.dir.display(),
        history = %config.history.path.display(),
        provider = %config.provider.kind,
        model = %config.provider.model,
        "starting shellcoach"
    );

    if config.provider.kind == "openai" && config.provider.api_key.is_empty() {
        tracing::warn!("no API key configured; set one via POST /set-config or OPENAI_API_KEY");
    }

    // Cache is optional: without it every command is a miss and nothing is stored
    let store = match SuggestionStore::open(
        &config.cache.dir,
        config.cache.expiry_secs,
        config.cache.memory_capacity,
    )
    .await
    {
        Ok(store) => {
            tracing::info!(
                expiry_secs = config.cache.expiry_secs,
                "suggestion cache initialized"
            );
            Some(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize cache, running without it");
            None
        }
    };

    // Spawn expired-row pruning
    if let Some(store) = store.clone() {
        let interval = config.cache.prune_interval_secs;
        tokio::spawn(async move {
            storage::retention::prune_loop(store, interval).await;
        });
    }

    let provider = provider::build_provider(&config.provider)?;
    let settings = SettingsHandle::from_config(&config.provider);
    let analyzer = Analyzer::new(
        store,
        provider,
        settings,
        HistorySource::from_config(&config.history),
        Duration::from_secs(config.provider.timeout_secs),
    );

    let state = Arc::new(AppState { analyzer });
    let app = handler::build_router(state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");
}
