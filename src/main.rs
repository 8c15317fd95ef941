mod config;
mod dispatcher;
mod generation;
mod llm;
mod persona;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::llm::LlmClient;
use crate::persona::Persona;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,genesis=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Provider: {}", config.llm.provider);
    info!("  API key configured: {}", config.has_api_key());
    info!("  Models: {}", config.llm.models.len());
    info!("  Per-attempt timeout: {}s", config.llm.timeout_secs);
    if !config.has_api_key() {
        warn!("OPENROUTER_API_KEY is not set, every reply will be a canned one");
    }

    let backend = LlmClient::new(&config.llm, &config.server)?;
    let persona = Persona::from_overrides(&config.persona);
    info!("  Persona: {} (created by {})", persona.name, persona.creator);

    let dispatcher = Dispatcher::new(
        Arc::new(backend),
        persona,
        config.llm.models.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    );

    server::run(&config, dispatcher).await
}
