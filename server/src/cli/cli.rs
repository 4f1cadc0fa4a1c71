// server/src/cli/cli.rs

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{error, info, warn};
use lib::config::{load_hospital_config, HospitalConfig, StorageEngineType};
use lib::services::HospitalServices;
use lib::storage_engine::create_storage;
use crate::api;

const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILTER_ENV: &str = "RUST_LOG";
const REDACTED: &str = "********";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Smart Hospital backend", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    /// YAML configuration file
    #[clap(long, short = 'c', value_name = "FILE", env = "HOSPITAL_CONFIG")]
    pub config: Option<PathBuf>,
    #[clap(long, value_name = "HOST")]
    pub host: Option<String>,
    #[clap(long, short = 'p', value_name = "PORT")]
    pub port: Option<u16>,
    /// Storage engine: inmemory or mysql
    #[clap(long, value_name = "ENGINE", value_parser = parse_storage_engine)]
    pub storage: Option<StorageEngineType>,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Create or update the database schema, then exit
    Migrate,
    /// Print the effective configuration as JSON
    ShowConfig,
}

fn parse_storage_engine(raw: &str) -> Result<StorageEngineType, String> {
    raw.parse::<StorageEngineType>().map_err(|e| e.to_string())
}

impl CliArgs {
    /// Command line flags win over file and environment.
    pub fn apply_to(&self, config: &mut HospitalConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(engine) = self.storage {
            config.storage.storage_engine_type = engine;
        }
    }
}

/// Config `log_level` wins over `RUST_LOG`, which wins over the default.
fn log_filter(config: &HospitalConfig, rust_log: Option<String>) -> String {
    config
        .log_level
        .clone()
        .filter(|level| !level.trim().is_empty())
        .or(rust_log)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn init_logging(config: &HospitalConfig) {
    let filter = log_filter(config, std::env::var(LOG_FILTER_ENV).ok());
    let _ = Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_LEVEL))
        .parse_filters(&filter)
        .try_init();
}

/// Configuration with secrets masked, for display.
pub fn redacted(config: &HospitalConfig) -> HospitalConfig {
    let mut shown = config.clone();
    if shown.auth.jwt_secret.is_some() {
        shown.auth.jwt_secret = Some(REDACTED.to_string());
    }
    if let Some(url) = shown.storage.database_url.as_mut() {
        if let (Some(scheme_end), Some(at)) = (url.find("://"), url.rfind('@')) {
            if at > scheme_end + 3 {
                url.replace_range(scheme_end + 3..at, REDACTED);
            }
        }
    }
    shown
}

fn bind_address(config: &HospitalConfig) -> Result<SocketAddr> {
    (config.server.host.as_str(), config.server.port)
        .to_socket_addrs()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}", config.server.host))
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            warn!("Failed to install signal handlers, falling back to Ctrl-C");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Ctrl-C handler failed: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Ctrl-C handler failed: {}", e);
    }
}

async fn serve(config: HospitalConfig) -> Result<()> {
    let storage = create_storage(&config.storage).await.context("Failed to open storage")?;
    let services = Arc::new(HospitalServices::from_config(storage, &config)?);

    tokio::fs::create_dir_all(&config.uploads.directory)
        .await
        .with_context(|| format!("Cannot create upload directory {}", config.uploads.directory.display()))?;

    let addr = bind_address(&config)?;
    let routes = api::routes(services, &config);
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Hospital API listening on http://{} (environment={}, storage={})",
        bound, config.environment, config.storage.storage_engine_type
    );
    server.await;
    info!("Hospital API stopped");
    Ok(())
}

async fn migrate(config: HospitalConfig) -> Result<()> {
    let storage = create_storage(&config.storage).await.context("Schema migration failed")?;
    storage.ping().await?;
    info!("Schema for {} storage is up to date", storage.engine_type());
    Ok(())
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    let mut config = load_hospital_config(args.config.as_deref())?;
    args.apply_to(&mut config);
    init_logging(&config);

    match args.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
    }
}
