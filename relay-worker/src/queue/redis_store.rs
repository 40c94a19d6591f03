//! Redis-backed queue store.
//!
//! Lists map onto Redis lists (`LPUSH`, `LREM`, `RPOPLPUSH`) and records onto
//! a single Redis hash. `RPOPLPUSH` is the only command that claims work.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::queue::store::QueueStore;

/// Queue store over a shared multiplexed Redis connection.
///
/// Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct RedisQueueStore {
    conn: MultiplexedConnection,
}

impl RedisQueueStore {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!("redis_connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push(&self, list: &str, entry: &str) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(list, entry).await?;
        Ok(())
    }

    async fn remove_one(&self, list: &str, entry: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(list, 1, entry).await?;
        Ok(removed > 0)
    }

    async fn move_atomic(&self, source: &str, dest: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.conn.clone();
        let moved: Option<String> = conn.rpoplpush(source, dest).await?;
        if let Some(entry) = &moved {
            debug!(source = source, dest = dest, entry = %entry, "redis_entry_moved");
        }
        Ok(moved)
    }

    async fn len(&self, list: &str) -> Result<usize, BackendError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(list).await?;
        Ok(len)
    }

    async fn put_record(&self, hash: &str, id: &str, record: &[u8]) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hset(hash, id, record).await?;
        Ok(())
    }

    async fn get_record(&self, hash: &str, id: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.conn.clone();
        let record: Option<Vec<u8>> = conn.hget(hash, id).await?;
        Ok(record)
    }

    async fn delete_record(&self, hash: &str, id: &str) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hdel(hash, id).await?;
        Ok(())
    }
}
