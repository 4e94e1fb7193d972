//! tms-estimator binary.
//!
//! Usage:
//!     tms-estimator                  serve the HTTP API
//!     tms-estimator estimate ...     estimate one job
//!     tms-estimator config show      print the effective configuration

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tms_estimator::Config;
use tms_estimator::api::{ApiState, EstimatorApi};
use tms_estimator::cli::{Cli, Command, run_config_command, run_estimate_command};
use tms_estimator::estimation::{ConfigStore, DurationEstimator, EstimatorConfig, ModelEstimator};
use tms_estimator::llm::create_llm_provider;
use tms_estimator::server::ApiServer;

const DEFAULT_LOG_FILTER: &str = "tms_estimator=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = Arc::new(ConfigStore::new(
        EstimatorConfig::defaults(config.openai.model.clone()),
        config.store.override_path.clone(),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config(cmd) => run_config_command(cmd, &store).await,
        Command::Estimate(args) => {
            let estimator = build_estimator(&config, store);
            run_estimate_command(args, &estimator).await
        }
        Command::Serve => serve(config, store).await,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_estimator(config: &Config, store: Arc<ConfigStore>) -> DurationEstimator {
    let provider = create_llm_provider(&config.openai);
    DurationEstimator::new(store, ModelEstimator::new(provider, config.openai.timeout))
}

async fn serve(config: Config, store: Arc<ConfigStore>) -> anyhow::Result<()> {
    tracing::info!("Starting estimation service");
    tracing::info!("  Environment: {}", config.environment);
    tracing::info!("  Override: {}", store.path().display());

    let estimator = Arc::new(build_estimator(&config, store));
    let router = EstimatorApi::router(ApiState {
        estimator,
        environment: config.environment.clone(),
    });

    let mut server = ApiServer::new(config.http.clone(), router);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");
    server.shutdown().await;

    Ok(())
}
