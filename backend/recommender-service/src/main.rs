use anyhow::Context;
use recommender_service::{Config, EngineRegistry, LineDriver, RecommendationOrchestrator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    // Initialize tracing; stdout carries the response stream
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if config.service.log_format == "json" {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    config.validate().context("Invalid configuration")?;

    info!(
        service = %config.service.service_name,
        models_dir = %config.models.models_dir.display(),
        "Starting recommendation engine"
    );

    // Load model assets once; a failed slot stays unavailable
    let registry = Arc::new(EngineRegistry::load(&config.models, &config.tuning));
    let orchestrator = Arc::new(RecommendationOrchestrator::new(
        registry,
        config.tuning.clone(),
        config.cache.capacity,
    ));
    info!(strategies = ?orchestrator.strategy_ids(), "Engine ready, reading requests from stdin");

    let driver = LineDriver::new(orchestrator);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled: u64 = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = driver.handle_line(&line).await;
        stdout
            .write_all(reply.as_bytes())
            .await
            .context("Failed to write response")?;
        stdout.write_all(b"\n").await.context("Failed to write response")?;
        stdout.flush().await.context("Failed to flush response")?;
        handled += 1;
    }

    info!(handled, "Input closed, shutting down");
    Ok(())
}
