// lib/src/config/config_defaults.rs

pub const DEFAULT_CONFIG_PATH: &str = "config/hospital.yaml";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];
pub const DEFAULT_MYSQL_POOL_MAX: usize = 10;
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Only used with the in-memory engine when no secret is configured.
pub const DEVELOPMENT_JWT_SECRET: &str = "hospital-development-secret";

pub fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

pub fn default_port() -> u16 {
    DEFAULT_PORT
}

pub fn default_token_ttl_days() -> i64 {
    DEFAULT_TOKEN_TTL_DAYS
}

pub fn default_upload_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_UPLOAD_DIR)
}

pub fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

pub fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

pub fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS.iter().map(|origin| origin.to_string()).collect()
}

pub fn default_pool_max() -> usize {
    DEFAULT_MYSQL_POOL_MAX
}

pub fn default_bcrypt_cost() -> u32 {
    DEFAULT_BCRYPT_COST
}
