use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub attachments: AttachmentsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachmentsConfig {
    /// Storage root for uploaded files. Relative paths resolve against the
    /// working directory of the server process.
    #[serde(default = "default_attachments_dir")]
    pub dir: String,
    /// Upper bound for a single uploaded file, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            dir: default_attachments_dir(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl AttachmentsConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Cap on any request body, enforced before a handler runs. Independent of
    /// `attachments.max_file_size`; whichever is tighter wins for uploads.
    #[serde(default = "default_max_request_body")]
    pub max_request_body: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body: default_max_request_body(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_path() -> String {
    "./data/wishlist.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_attachments_dir() -> String {
    "attachments".to_string()
}

fn default_max_file_size() -> usize {
    5_000_000
}

fn default_max_request_body() -> usize {
    1_000_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run `wishlist init` to create one.",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            anyhow::bail!("database.path must not be empty");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        if self.attachments.dir.trim().is_empty() {
            anyhow::bail!("attachments.dir must not be empty");
        }
        if self.attachments.max_file_size == 0 {
            anyhow::bail!("attachments.max_file_size must be greater than 0");
        }
        if self.limits.max_request_body == 0 {
            anyhow::bail!("limits.max_request_body must be greater than 0");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
