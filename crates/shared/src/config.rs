//! Application configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    pub storage: StorageSettings,
    /// Garbage collection configuration.
    #[serde(default)]
    pub gc: GcSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Registered storage providers. At least one is required.
    pub providers: Vec<ProviderSettings>,
    /// Name of the provider used when an upload does not specify one.
    pub default_provider: String,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types for uploads.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

/// A single named storage provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// Stable provider name, recorded on every catalog row.
    pub name: String,
    /// Backend-specific connection settings.
    pub backend: BackendSettings,
    /// Optional public base URL for direct blob access hints.
    #[serde(default)]
    pub public_url_base: Option<String>,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendSettings {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-memory storage (tests only)
    Memory,
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GcSettings {
    /// Grace window in seconds between orphaning and deletion.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Interval in seconds between background orphan sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for GcSettings {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_grace_secs() -> u64 {
    86_400 // 24 hours
}

fn default_sweep_interval_secs() -> u64 {
    3_600 // 1 hour
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("FABLE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
