//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::service::{MarketDataService, ServiceSettings};
use crate::cli::RunArgs;
use crate::domain::InstrumentRegistry;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::runner::MaintenanceRunner;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config.init_logging();

    info!(
        config = %args.config.display(),
        producers = config.market_data.producers.len(),
        "tickwarden starting"
    );

    let registry = Arc::new(InstrumentRegistry::with_builtin_seeds());
    let service = MarketDataService::builder(registry)
        .settings(ServiceSettings::from_config(&config.market_data))
        .build();

    let mut runner =
        MaintenanceRunner::new(service.clone(), config.market_data.maintenance_interval())
            .watch_config(&args.config);
    if let Some(path) = &config.status_file {
        runner = runner.status_file(path.clone());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = runner.spawn(shutdown_rx);

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(e) = maintenance.await {
        warn!(error = %e, "Maintenance task ended abnormally");
    }
    service.shutdown();

    info!("tickwarden stopped");
    Ok(())
}
