use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::error::WalletError;
use crate::wallet::{ClaimOutpoint, DatabaseConfig};

/// Durable association from a stream to the claim that published it
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn save_content_claim(&self, stream_hash: &str, outpoint: &ClaimOutpoint) -> Result<(), WalletError>;

    async fn get_content_claim(&self, stream_hash: &str) -> Result<Option<ClaimOutpoint>, WalletError>;
}

/// SQLite-backed claim store
pub struct SqliteClaimStore {
    db_path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteClaimStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let db_path = db_path.into();
        log::info!("Opening claim database at {}", db_path.display());
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| WalletError::DatabaseError(format!("Failed to open database: {}", e)))?;
        conn.execute_batch(
            "create table if not exists content_claim (
                stream_hash text primary key not null,
                claim_outpoint text not null
            );",
        )?;
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the configured database, creating its directory if needed
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, WalletError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&config.path)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, WalletError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| WalletError::DatabaseError(format!("Connection lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| WalletError::DatabaseError(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl ClaimStore for SqliteClaimStore {
    async fn save_content_claim(&self, stream_hash: &str, outpoint: &ClaimOutpoint) -> Result<(), WalletError> {
        let stream_hash = stream_hash.to_string();
        let outpoint = outpoint.to_string();
        log::debug!("Saving claim {} for stream {}", outpoint, stream_hash);
        self.with_connection(move |conn| {
            conn.execute(
                "insert or replace into content_claim (stream_hash, claim_outpoint) values (?1, ?2)",
                params![stream_hash, outpoint],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_content_claim(&self, stream_hash: &str) -> Result<Option<ClaimOutpoint>, WalletError> {
        let stream_hash = stream_hash.to_string();
        let stored: Option<String> = self
            .with_connection(move |conn| {
                Ok(conn
                    .query_row(
                        "select claim_outpoint from content_claim where stream_hash = ?1",
                        params![stream_hash],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        stored.map(|s| s.parse()).transpose()
    }
}

/// Non-durable claim store
#[derive(Default)]
pub struct MemoryClaimStore {
    claims: Mutex<HashMap<String, ClaimOutpoint>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn save_content_claim(&self, stream_hash: &str, outpoint: &ClaimOutpoint) -> Result<(), WalletError> {
        self.claims
            .lock()
            .map_err(|e| WalletError::DatabaseError(e.to_string()))?
            .insert(stream_hash.to_string(), *outpoint);
        Ok(())
    }

    async fn get_content_claim(&self, stream_hash: &str) -> Result<Option<ClaimOutpoint>, WalletError> {
        Ok(self
            .claims
            .lock()
            .map_err(|e| WalletError::DatabaseError(e.to_string()))?
            .get(stream_hash)
            .copied())
    }
}
