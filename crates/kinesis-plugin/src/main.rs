use std::sync::Arc;

use anyhow::{Context, Result};
use kinesis_cloud::CloudWatchClient;
use kinesis_plugin::config::{Cli, PluginConfig};
use kinesis_plugin::helper::{OutputMode, PluginHelper};
use kinesis_plugin::KinesisStreamsPlugin;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the agent
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(kinesis_plugin::log_filter()?)
        .init();

    let cli = Cli::parse_args();
    let config = PluginConfig::resolve(cli)?;
    tracing::debug!(
        stream = %config.identifier,
        region = %config.region,
        prefix = %config.metric_key_prefix,
        "Configuration resolved"
    );

    let client = CloudWatchClient::new(&config.region, config.credentials.clone(), config.fetch.timeout)
        .context("Failed to build CloudWatch client")?;

    let plugin = KinesisStreamsPlugin::new(&config, Arc::new(client));
    let helper = PluginHelper::new(config.tempfile.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    plugin.run(&helper, OutputMode::from_env(), &mut out).await
}
