//! ClickPilot — thumbnail A/B testing service.
//!
//! Main entry point that loads configuration, seeds the stores and starts the server.

use clap::Parser;
use clickpilot_api::ApiServer;
use clickpilot_core::config::AppConfig;
use clickpilot_management::{CompletionScheduler, ManagementState};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "clickpilot")]
#[command(about = "Thumbnail A/B testing with automatic winner selection")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CLICKPILOT__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CLICKPILOT__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "CLICKPILOT__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Seconds between scheduled completion checks (overrides config)
    #[arg(long, env = "CLICKPILOT__SCHEDULER__TICK_INTERVAL_SECS")]
    tick_interval_secs: Option<u64>,

    /// Start with empty stores instead of the demo channel
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clickpilot=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("ClickPilot starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if let Some(secs) = cli.tick_interval_secs {
        config.scheduler.tick_interval_secs = secs;
    }
    if cli.no_seed {
        config.store.seed_demo_data = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        seed_demo_data = config.store.seed_demo_data,
        "Configuration loaded"
    );

    let management = ManagementState::from_config(&config)?;

    let api_server = ApiServer::new(config.clone(), management.clone());

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn completion scheduler
    if config.scheduler.enabled {
        CompletionScheduler::new(
            management.store.clone(),
            management.sessions.clone(),
            config.scheduler.tick_interval_secs,
        )
        .spawn();
    } else {
        info!("Completion scheduler disabled; experiments complete on explicit tick");
    }

    info!("ClickPilot is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
