//! Backing auth-proxy processes for registrations that arrive without a port.
//!
//! Each process gets its own temp directory holding the proxy configuration
//! as [`CONFIG_FILE_NAME`]. The process registers itself with the gateway
//! once it is listening.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use dashmap::DashMap;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use awsproxy_core::{ProxyConfig, ProxyEnvConfig};

use crate::error::ControlError;

/// Name of the configuration file inside a backing process's directory.
pub const CONFIG_FILE_NAME: &str = "ls.aws.proxy.yml";

/// Environment variables handed to backing processes when set on the gateway.
const PASSTHROUGH_ENV: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_PROFILE",
    "AWS_DEFAULT_REGION",
    "AWS_REGION",
    "DEBUG",
];

/// Starts and stops backing proxy processes.
#[async_trait]
pub trait ProxyLauncher: Send + Sync + fmt::Debug {
    /// Start a proxy for `config` listening on `port`.
    async fn launch(
        &self,
        port: u16,
        config: &ProxyConfig,
        env_vars: &HashMap<String, String>,
    ) -> Result<(), ControlError>;

    /// Stop every backing process. Returns how many were stopped.
    async fn stop_all(&self) -> usize;

    /// Configuration of a running backing process, if any.
    async fn active_config(&self) -> Option<ProxyConfig>;
}

#[derive(Debug)]
struct BackingProcess {
    child: Child,
    dir: TempDir,
}

impl BackingProcess {
    fn config_path(&self) -> PathBuf {
        self.dir.path().join(CONFIG_FILE_NAME)
    }
}

/// Launcher that runs the proxy CLI as a child process.
///
/// The command is `{binary} proxy --config {file} --port {port} --host 0.0.0.0`
/// followed by any extra flags.
#[derive(Debug)]
pub struct ProcessLauncher {
    binary: String,
    extra_flags: Vec<String>,
    cleanup: bool,
    gateway_host: Option<String>,
    processes: DashMap<u16, BackingProcess>,
}

impl ProcessLauncher {
    /// Launcher configured from the gateway's environment configuration.
    #[must_use]
    pub fn new(config: &ProxyEnvConfig) -> Self {
        Self {
            binary: config.proxy_binary.clone(),
            extra_flags: config
                .launcher_flags
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            cleanup: config.cleanup_processes,
            gateway_host: config.localstack_host.clone(),
            processes: DashMap::new(),
        }
    }

    /// Arguments of the proxy command.
    #[must_use]
    pub fn command_args(&self, port: u16, config_file: &Path) -> Vec<String> {
        let mut args = vec![
            "proxy".to_owned(),
            "--config".to_owned(),
            config_file.display().to_string(),
            "--port".to_owned(),
            port.to_string(),
            "--host".to_owned(),
            "0.0.0.0".to_owned(),
        ];
        args.extend(self.extra_flags.iter().cloned());
        args
    }

    /// Number of running backing processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether no backing process is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    fn environment(&self, env_vars: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = PASSTHROUGH_ENV
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| ((*name).to_owned(), v)))
            .collect();
        if let Some(host) = &self.gateway_host {
            env.insert("LOCALSTACK_HOST".to_owned(), host.clone());
        }
        env.extend(env_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    async fn stop(&self, port: u16, mut process: BackingProcess) {
        if let Err(e) = process.child.kill().await {
            debug!(port, error = %e, "unable to stop proxy process");
        }
        if self.cleanup {
            if let Err(e) = process.dir.close() {
                debug!(port, error = %e, "unable to remove proxy process directory");
            }
        } else {
            let kept = process.dir.keep();
            debug!(port, dir = %kept.display(), "kept proxy process directory");
        }
    }
}

#[async_trait]
impl ProxyLauncher for ProcessLauncher {
    async fn launch(
        &self,
        port: u16,
        config: &ProxyConfig,
        env_vars: &HashMap<String, String>,
    ) -> Result<(), ControlError> {
        let dir = tempfile::Builder::new()
            .prefix("awsproxy-")
            .tempdir()
            .map_err(|e| ControlError::Launch(e.to_string()))?;
        let config_file = dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&config_file, config.to_yaml()?)
            .await
            .map_err(|e| ControlError::Launch(e.to_string()))?;

        let child = Command::new(&self.binary)
            .args(self.command_args(port, &config_file))
            .envs(self.environment(env_vars))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ControlError::Launch(format!("{}: {e}", self.binary)))?;

        info!(port, binary = %self.binary, pid = ?child.id(), "started proxy process");
        if let Some(previous) = self.processes.insert(port, BackingProcess { child, dir }) {
            self.stop(port, previous).await;
        }
        Ok(())
    }

    async fn stop_all(&self) -> usize {
        let ports: Vec<u16> = self.processes.iter().map(|entry| *entry.key()).collect();
        let mut stopped = 0;
        for port in ports {
            if let Some((port, process)) = self.processes.remove(&port) {
                self.stop(port, process).await;
                stopped += 1;
            }
        }
        if stopped > 0 {
            info!(stopped, "stopped proxy processes");
        }
        stopped
    }

    async fn active_config(&self) -> Option<ProxyConfig> {
        let path = self.processes.iter().next()?.config_path();
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(document) => document,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unable to read proxy process config");
                return None;
            }
        };
        match ProxyConfig::from_yaml(&document) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "proxy process config is invalid");
                None
            }
        }
    }
}

/// Reserve a free local port by binding to port 0.
pub async fn reserve_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}
