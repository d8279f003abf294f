use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use parking_lot::RwLock;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use crate::SyncError;

/// Durable key-value area that each store family serializes into.
///
/// Keys are independent: there is no atomicity across them.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, SyncError>;
    async fn save(&self, key: &str, blob: &str) -> Result<(), SyncError>;
}

/// Load and decode the collection stored under `key`, falling back to
/// `fallback()` when nothing is stored or the blob cannot be read.
pub async fn load_or_else<T, F>(persister: &dyn Persister, key: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let raw = match persister.load(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No persisted blob for '{}', using defaults", key);
            return fallback();
        }
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted collection; using defaults");
            return fallback();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "failed to parse persisted collection; using defaults");
            fallback()
        }
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct MemoryPersister {
    blobs: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a raw blob directly, bypassing the write counter.
    pub fn insert(&self, key: &str, blob: impl Into<String>) {
        self.blobs.write().insert(key.to_string(), blob.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of `save` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), SyncError> {
        self.blobs.write().insert(key.to_string(), blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==============================================================================
// FILE SYSTEM
// ==============================================================================

/// One `<key>.json` file per key under a data directory.
pub struct FilePersister {
    dir: PathBuf,
}

impl FilePersister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl Persister for FilePersister {
    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    #[instrument(skip(self, blob), fields(bytes = blob.len()))]
    async fn save(&self, key: &str, blob: &str) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, blob).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Wrote {} bytes to {}", blob.len(), path.display());
        Ok(())
    }
}

// ==============================================================================
// REDIS
// ==============================================================================

pub struct RedisPersister {
    pool: Pool,
    prefix: String,
}

impl RedisPersister {
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, SyncError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| SyncError::Pool(format!("Pool creation error: {}", e)))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| SyncError::Pool(format!("Connection error: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis persister initialized with prefix '{}'", prefix);

        Ok(Self {
            pool,
            prefix: prefix.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn get_connection(&self) -> Result<deadpool_redis::Connection, SyncError> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Persister for RedisPersister {
    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), SyncError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set(self.namespaced(key), blob).await?;
        Ok(())
    }
}

/// Build the persister selected by `STORE_BACKEND`.
///
/// Redis misconfiguration or an unreachable server degrades to the
/// in-memory backend.
pub async fn persister_from_config(config: &AppConfig) -> Arc<dyn Persister> {
    match config.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryPersister::new()),
        StorageBackend::File => Arc::new(FilePersister::new(config.data_dir.clone())),
        StorageBackend::Redis => {
            let Some(url) = config.redis_url.as_deref() else {
                warn!("REDIS_URL not set, falling back to in-memory storage");
                return Arc::new(MemoryPersister::new());
            };

            match RedisPersister::connect(url, &config.key_prefix).await {
                Ok(persister) => Arc::new(persister),
                Err(e) => {
                    warn!("Redis unavailable ({}), falling back to in-memory storage", e);
                    Arc::new(MemoryPersister::new())
                }
            }
        }
    }
}
