//! messenger-gateway server entry point.
//!
//! Loads configuration, connects the shared services, and runs the gateway
//! until Ctrl+C or SIGTERM.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use messenger_gateway::app_state::SharedServices;
use messenger_gateway::config::{GatewayConfig, LogFormat};
use messenger_gateway::graphql::SchemaDefinition;
use messenger_gateway::lifecycle::{Gateway, shutdown_signal};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = format!("{e:#}"), "gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env();
    init_tracing(config.as_ref().map(|c| c.log_format).unwrap_or_default());
    let config = config.context("loading configuration")?;
    tracing::info!(addr = %config.listen_addr, origin = %config.client_origin, "starting messenger-gateway");

    let services = SharedServices::connect(&config)
        .await
        .context("connecting shared services")?;

    let running = Gateway::new(config, services)
        .start(SchemaDefinition::messenger())
        .await
        .context("starting gateway")?;

    running.run_until(shutdown_signal()).await;
    tracing::info!("messenger-gateway stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
