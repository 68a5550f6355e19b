use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::pagination::MAX_PAGE_SIZE;

#[derive(Parser, Debug)]
#[command(name = "agora", about = "A community Q&A and news server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the databases and config.toml (default ~/.agora)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Key-value index file
    #[arg(long, env = "AGORA_KV_PATH")]
    pub kv_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// File locations. Unset entries are placed in the data directory.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
    pub kv: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
}

/// Items per page on every cursor listing, bounded by [`MAX_PAGE_SIZE`].
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "agora_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl StorageConfig {
    fn resolve(&mut self, data_dir: &Path) {
        self.database.get_or_insert_with(|| data_dir.join("agora.db"));
        self.kv.get_or_insert_with(|| data_dir.join("kv.db"));
    }
}

impl Config {
    /// Reads `config.toml` (or `--config`), then applies CLI overrides and
    /// fills storage paths from the data directory.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config: Config = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref kv_path) = cli.kv_path {
            config.storage.kv = Some(kv_path.clone());
        }
        config.storage.resolve(&data_dir);

        let requested = config.pagination.page_size;
        config.pagination.page_size = requested.clamp(1, MAX_PAGE_SIZE);
        if config.pagination.page_size != requested {
            tracing::warn!(
                "page_size {} out of range, using {}",
                requested,
                config.pagination.page_size
            );
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir.clone() {
            Some(dir) => Ok(dir),
            None => dirs::home_dir()
                .map(|home| home.join(".agora"))
                .context("Could not determine home directory"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from("agora.db"))
    }

    pub fn kv_path(&self) -> PathBuf {
        self.storage
            .kv
            .clone()
            .unwrap_or_else(|| PathBuf::from("kv.db"))
    }
}
