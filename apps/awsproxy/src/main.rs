//! `awsproxy` - run auth proxies against real AWS and replicate AWS state.
//!
//! # Usage
//!
//! ```text
//! awsproxy proxy -s sqs,s3
//! awsproxy proxy -c proxy.yml --port 4510 --host 0.0.0.0
//! awsproxy replicate -s sqs,dynamodb
//! ```
//!
//! The gateway is reached at `LOCALSTACK_HOST` (`host[:port]`), falling back
//! to `http://localhost.localstack.cloud:4566`. Setting `DEBUG=1` enables
//! debug logging, which includes truncated request and response bodies.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use awsproxy_authproxy::{AuthProxy, AuthProxyConfig};
use awsproxy_core::ProxyConfig;
use awsproxy_replicator::{ReplicatorRegistry, ResourceType, submit_state};

/// Run auth proxies against real AWS and replicate AWS resource state.
#[derive(Parser, Debug)]
#[command(name = "awsproxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an authentication proxy against real AWS.
    Proxy(ProxyArgs),
    /// Replicate the state of an AWS account into the local emulator.
    Replicate(ReplicateArgs),
}

#[derive(Args, Debug)]
struct ProxyArgs {
    /// Comma-delimited list of services to proxy (e.g. sqs,s3).
    #[arg(short, long)]
    services: Option<String>,

    /// Path to a YAML or JSON file with detailed proxy configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network bind host of the proxy (default: 127.0.0.1).
    #[arg(long)]
    host: Option<String>,

    /// Port of the proxy (by default a random port is used).
    #[arg(short, long)]
    port: Option<u16>,

    /// Gateway to register with.
    #[arg(long, env = "LOCALSTACK_HOST")]
    gateway_url: Option<String>,

    /// Serve without registering with the gateway.
    #[arg(long)]
    no_register: bool,
}

#[derive(Args, Debug)]
struct ReplicateArgs {
    /// Comma-delimited list of services to replicate (e.g. sqs,s3).
    #[arg(short, long)]
    services: String,

    /// Gateway that imports the state.
    #[arg(long, env = "LOCALSTACK_HOST")]
    endpoint: Option<String>,
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set; otherwise `debug` when `DEBUG` is truthy, else `info`.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if std::env::var("DEBUG").is_ok_and(|v| is_truthy(&v)) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Split a service list on commas and whitespace, lowercased.
fn split_services(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Assemble the proxy configuration from the config file and flags.
///
/// Services named on the command line forward all their resources.
fn load_proxy_config(
    config_file: Option<&Path>,
    services: Option<&str>,
    host: Option<&str>,
) -> Result<ProxyConfig> {
    let mut config = match config_file {
        Some(path) => {
            let document = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            ProxyConfig::from_yaml(&document)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => ProxyConfig::default(),
    };
    if let Some(host) = host {
        config.bind_host = host.to_owned();
    }
    if let Some(services) = services {
        config.add_services(&split_services(services));
    }
    config.validate()?;
    Ok(config)
}

async fn run_proxy(args: ProxyArgs) -> Result<()> {
    let proxy = load_proxy_config(args.config.as_deref(), args.services.as_deref(), args.host.as_deref())?;
    if proxy.services.is_empty() {
        anyhow::bail!("no services configured, pass --services or --config");
    }

    let config = AuthProxyConfig::builder()
        .proxy(proxy)
        .port(args.port.unwrap_or_default())
        .gateway_url(AuthProxyConfig::gateway_url_for(args.gateway_url.as_deref()))
        .register(!args.no_register)
        .build();
    let handle = AuthProxy::from_default_chain(config).await?.start().await?;
    info!(addr = %handle.local_addr(), "auth proxy is running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    handle.shutdown().await;
    Ok(())
}

async fn run_replicate(args: ReplicateArgs) -> Result<()> {
    let mut types = Vec::new();
    for service in split_services(&args.services) {
        match ResourceType::for_service(&service) {
            Some(resource_type) => types.push(resource_type),
            None => warn!(%service, "replication is not supported for service, skipping"),
        }
    }
    if types.is_empty() {
        anyhow::bail!("none of the services {} can be replicated", args.services);
    }

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let registry = ReplicatorRegistry::from_sdk_config(&sdk_config, false);
    let gateway_url = AuthProxyConfig::gateway_url_for(args.endpoint.as_deref());
    let client = reqwest::Client::new();

    let resources = registry.discover(&types).await?;
    let total = resources.len();
    for resource in resources {
        let exported = registry.export(resource).await?;
        let name = exported.name()?.to_owned();
        let count = submit_state(&client, &gateway_url, &exported).await?;
        info!(resource_type = %exported.resource_type, %name, count, "replicated resource");
    }
    info!(total, gateway = %gateway_url, "replication finished");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Proxy(args) => match run_proxy(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Unable to start and register auth proxy: {e:#}");
                ExitCode::FAILURE
            }
        },
        Command::Replicate(args) => match run_replicate(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Unable to replicate AWS state: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}
