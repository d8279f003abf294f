use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Which durable storage area the stores flush into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    File,
    Redis,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Redis => write!(f, "redis"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_backend: StorageBackend,
    pub data_dir: PathBuf,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub flush_interval_ms: u64,
    pub bus_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
            redis_url: None,
            key_prefix: "portal".to_string(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            storage_backend: parse_var("STORE_BACKEND", defaults.storage_backend),
            data_dir: env::var("STORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("STORE_DATA_DIR not set, using default");
                    defaults.data_dir
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            key_prefix: env::var("STORE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            flush_interval_ms: parse_var("STORE_FLUSH_INTERVAL_MS", defaults.flush_interval_ms),
            bus_capacity: parse_var("STORE_BUS_CAPACITY", defaults.bus_capacity),
        };

        if !config.is_configured() {
            warn!(
                "Storage backend '{}' not fully configured - missing environment variables",
                config.storage_backend
            );
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::File => !self.data_dir.as_os_str().is_empty(),
            StorageBackend::Redis => self.redis_url.is_some(),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
