use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use tracing::{debug, info};

use crate::config::RedisConfig;

use super::store::{HistoryStore, StoreError};

/// History store backed by Redis lists (`RPUSH` / `LRANGE`).
#[derive(Clone)]
pub struct RedisHistoryStore {
    pool: Pool,
}

impl RedisHistoryStore {
    pub fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::from_url(config.url.clone());
        cfg.pool = Some(PoolConfig::new(config.pool_max_size.max(1)));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Unavailable(format!("Failed to create Redis pool: {}", e)))?;

        info!("Redis history store configured (pool max size {})", config.pool_max_size);
        Ok(Self { pool })
    }

    pub fn close(&self) {
        self.pool.close();
    }

    async fn conn(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis pool: {}", e)))
    }

    /// `TYPE key`; `none` and `list` are the only shapes writes accept.
    async fn ensure_list(&self, conn: &mut Connection, key: &str) -> Result<(), StoreError> {
        let kind: String = redis::cmd("TYPE")
            .arg(key)
            .query_async(conn)
            .await
            .map_err(unavailable)?;

        debug!("Key {} is of type {}", key, kind);
        match kind.as_str() {
            "list" | "none" => Ok(()),
            _ => Err(StoreError::ShapeConflict {
                key: key.to_string(),
                found: kind,
            }),
        }
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Map a command error on `key`. `WRONGTYPE` means another writer changed
/// the key's shape after (or without) the `TYPE` check.
fn command_error(key: &str) -> impl FnOnce(redis::RedisError) -> StoreError + '_ {
    move |e| classify(key, e.code(), e.to_string())
}

fn classify(key: &str, code: Option<&str>, message: String) -> StoreError {
    match code {
        Some("WRONGTYPE") => StoreError::ShapeConflict {
            key: key.to_string(),
            found: "non-list".to_string(),
        },
        _ => StoreError::Unavailable(message),
    }
}

#[async_trait::async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        self.ensure_list(&mut conn, key).await?;

        let len: i64 = conn.rpush(key, value).await.map_err(command_error(key))?;
        debug!("Pushed to {} (len {})", key, len);
        Ok(())
    }

    async fn append_all(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn().await?;
        self.ensure_list(&mut conn, key).await?;

        // variadic RPUSH is a single atomic command
        let len: i64 = conn.rpush(key, values).await.map_err(command_error(key))?;
        debug!("Pushed {} values to {} (len {})", values.len(), key, len);
        Ok(())
    }

    async fn read_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;

        // LRANGE itself answers WRONGTYPE on a non-list key
        let items: Vec<String> = conn.lrange(key, 0, -1).await.map_err(command_error(key))?;
        Ok(items)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(unavailable)?;
        debug!("Deleted {} ({} key removed)", key, removed);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let found: bool = conn.exists(key).await.map_err(unavailable)?;
        Ok(found)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
