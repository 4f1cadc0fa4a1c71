// lib/src/config/config_helpers.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use serde_yaml2 as serde_yaml;
use models::errors::{HospitalError, HospitalResult};
use crate::config::config_defaults::*;
use crate::config::config_structs::*;

/// Reads the YAML config. A missing file is not an error: defaults are used.
pub fn load_hospital_config_from_yaml(path: &Path) -> HospitalResult<HospitalConfig> {
    if !path.exists() {
        debug!("Config file {:?} not found, using defaults", path);
        return Ok(HospitalConfig::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| HospitalError::ConfigurationError(format!("Failed to read {:?}: {}", path, e)))?;
    parse_hospital_config(&content)
        .map_err(|e| HospitalError::ConfigurationError(format!("Failed to parse {:?}: {}", path, e)))
}

pub fn parse_hospital_config(content: &str) -> HospitalResult<HospitalConfig> {
    if content.trim().is_empty() {
        return Ok(HospitalConfig::default());
    }
    serde_yaml::from_str::<HospitalConfig>(content)
        .map_err(|e| HospitalError::ConfigurationError(e.to_string()))
}

/// Applies environment overrides. `lookup` is `std::env::var` in production.
pub fn apply_env_overrides<F>(config: &mut HospitalConfig, lookup: F) -> HospitalResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("HOSPITAL_PORT").or_else(|| lookup("PORT")) {
        config.server.port = port
            .parse()
            .map_err(|_| HospitalError::ConfigurationError(format!("Invalid port '{}'", port)))?;
    }
    if let Some(host) = lookup("HOSPITAL_HOST") {
        config.server.host = host;
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.storage.database_url = Some(url);
    }
    if let Some(engine) = lookup("HOSPITAL_STORAGE_ENGINE") {
        config.storage.storage_engine_type = engine.parse()?;
    }
    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = Some(secret);
    }
    if let Some(dir) = lookup("UPLOAD_DIR") {
        config.uploads.directory = PathBuf::from(dir);
    }
    if let Some(frontend) = lookup("FRONTEND_URL") {
        if !config.server.allowed_origins.contains(&frontend) {
            config.server.allowed_origins.push(frontend);
        }
    }
    if let Some(environment) = lookup("HOSPITAL_ENV").or_else(|| lookup("NODE_ENV")) {
        config.environment = environment;
    }
    Ok(())
}

/// File, then process environment.
pub fn load_hospital_config(path: Option<&Path>) -> HospitalResult<HospitalConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let mut config = load_hospital_config_from_yaml(path)?;
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    info!(
        "Loaded configuration: engine={}, {}:{}, environment={}",
        config.storage.storage_engine_type, config.server.host, config.server.port, config.environment
    );
    Ok(config)
}

/// The signing secret. Production (MySQL) requires one; the in-memory engine
/// falls back to a fixed development secret.
pub fn resolve_jwt_secret(config: &HospitalConfig) -> HospitalResult<String> {
    match config.auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => Ok(secret.to_string()),
        None if config.storage.storage_engine_type == StorageEngineType::InMemory => {
            warn!("JWT_SECRET is not set, using the development secret");
            Ok(DEVELOPMENT_JWT_SECRET.to_string())
        }
        None => Err(HospitalError::ConfigurationError(
            "JWT_SECRET must be set when using the mysql storage engine".to_string(),
        )),
    }
}
