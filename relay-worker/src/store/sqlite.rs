//! SQLite-backed record store.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::queue::Message;
use crate::store::{new_record_id, NewRecord, RecordStore};

/// Record store over a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        ensure_parent_dir(url);

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // An in-memory database exists per connection, so keep exactly one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!(max_connections = max_connections, "record_store_ready");
        Ok(store)
    }

    /// Create the messages table if absent.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                to_addr TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                enqueued_at TEXT NOT NULL,
                done_at TEXT NULL,
                processed INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Create the parent folder of a file-backed SQLite URL.
fn ensure_parent_dir(url: &str) {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return;
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

fn parse_time(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
}

fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
    let id: String = row.try_get("id")?;
    let enqueued_at: String = row.try_get("enqueued_at")?;
    let done_at: Option<String> = row.try_get("done_at")?;
    let processed: i64 = row.try_get("processed")?;

    Ok(Message {
        to: row.try_get("to_addr")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        enqueued_at: parse_time(&id, &enqueued_at)?,
        done_at: done_at.as_deref().map(|t| parse_time(&id, t)).transpose()?,
        processed: processed != 0,
        id,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &NewRecord) -> Result<String, StoreError> {
        let id = new_record_id();
        sqlx::query(
            "INSERT INTO messages (id, to_addr, subject, body, enqueued_at, processed) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(&record.to)
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.enqueued_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(message_id = %id, "record_inserted");
        Ok(id)
    }

    async fn mark_processed(&self, id: &str, done_at: DateTime<Utc>) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE messages SET processed = 1, done_at = ? WHERE id = ? AND processed = 0")
                .bind(done_at.to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT processed FROM messages WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_none() {
                return Err(StoreError::NotFound(id.to_string()));
            }
            debug!(message_id = %id, "record_already_processed");
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(
            "SELECT id, to_addr, subject, body, enqueued_at, done_at, processed \
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }
}
