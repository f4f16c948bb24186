use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kinesis_cloud::{Credentials, FetchSettings, Region};

use crate::graph::DEFAULT_PREFIX;
use crate::helper::PluginHelper;

/// Kinesis Data Streams metrics for the monitoring agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "mackerel-plugin-aws-kinesis-streams", version)]
pub struct Cli {
    /// Stream name
    #[arg(long, allow_hyphen_values = true)]
    pub identifier: String,

    /// AWS region
    #[arg(long, allow_hyphen_values = true)]
    pub region: String,

    /// AWS access key id (default: $AWS_ACCESS_KEY_ID)
    #[arg(long, allow_hyphen_values = true)]
    pub access_key_id: Option<String>,

    /// AWS secret access key (default: $AWS_SECRET_ACCESS_KEY)
    #[arg(long, allow_hyphen_values = true)]
    pub secret_access_key: Option<String>,

    /// Temp file name
    #[arg(long, allow_hyphen_values = true)]
    pub tempfile: Option<PathBuf>,

    /// Metric key prefix
    #[arg(long, default_value = DEFAULT_PREFIX, allow_hyphen_values = true)]
    pub metric_key_prefix: String,

    /// Maximum number of CloudWatch queries in flight
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=8))]
    pub concurrency: u16,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,
}

impl Cli {
    /// Parse process arguments, accepting the agent's single-dash long flags.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args()))
    }
}

/// Flags that never take a value.
const SWITCHES: &[&str] = &["h", "help", "V", "version"];

/// Rewrite single-dash long flags (`-region=x`) to the double-dash form.
///
/// An argument that follows a value-taking flag written without `=` is the
/// flag's value and is passed through untouched, even when it starts with `-`.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut value_pending = false;
    let mut normalized = Vec::new();

    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || value_pending {
            value_pending = false;
            normalized.push(arg);
            continue;
        }

        if let Some(flag) = arg.strip_prefix('-') {
            let name = flag.strip_prefix('-').unwrap_or(flag);
            value_pending = !name.is_empty() && !name.contains('=') && !SWITCHES.contains(&name);
        }

        let single_dash_long = arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--");
        if single_dash_long {
            normalized.push(format!("-{arg}"));
        } else {
            normalized.push(arg);
        }
    }
    normalized
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    pub identifier: String,
    pub region: Region,
    pub credentials: Credentials,
    pub metric_key_prefix: String,
    pub tempfile: PathBuf,
    pub fetch: FetchSettings,
}

impl PluginConfig {
    /// Resolve configuration, reading credentials from the environment when no flags are given.
    ///
    /// # Errors
    ///
    /// Fails on an empty identifier, an unknown region, or missing credentials.
    pub fn resolve(cli: Cli) -> Result<Self> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(cli: Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let identifier = cli.identifier.trim().to_string();
        if identifier.is_empty() {
            anyhow::bail!("-identifier is required");
        }

        let region = Region::parse(&cli.region).context("Invalid -region")?;
        let credentials = Credentials::resolve_with(
            cli.access_key_id.as_deref(),
            cli.secret_access_key.as_deref(),
            lookup,
        )?;

        let metric_key_prefix = if cli.metric_key_prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            cli.metric_key_prefix
        };

        let tempfile = cli
            .tempfile
            .unwrap_or_else(|| PluginHelper::default_tempfile(&metric_key_prefix, &identifier));

        Ok(Self {
            identifier,
            region,
            credentials,
            metric_key_prefix,
            tempfile,
            fetch: FetchSettings {
                concurrency: usize::from(cli.concurrency),
                timeout: Duration::from_secs(cli.timeout_secs),
                ..FetchSettings::default()
            },
        })
    }
}
