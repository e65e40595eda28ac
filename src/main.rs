use std::sync::Arc;

use clap::Parser;
use hs110_exporter::{DeviceClient, ExporterConfig, Hs110Metrics, MetricsServer, Poller};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ExporterConfig::parse();

    let client = DeviceClient::new(config.device_addr(), config.hardware);
    info!("{}", client.connection_description());

    let metrics = Arc::new(Hs110Metrics::new(client.reader())?);
    let _metrics_server = MetricsServer::start(config.metrics_addr(), metrics).await?;

    // Only returns once the plug has been unreachable for too long
    let fatal = Poller::new(client, config.poll_interval()).run().await;
    error!(error = %fatal, "stopping exporter");
    Err(fatal.into())
}
