use async_trait::async_trait;
use shared::{ChatMessage, NewMessage};
use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use super::{MessageStore, StoreError};

/// Postgres-backed durable message store.
///
/// Schema/migration tooling proper lives outside this system; the adapter
/// only asserts the one table it needs on startup.
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Wraps an existing pool, asserting the message table.
    ///
    /// # Errors
    /// Returns an error if the schema assertion fails.
    pub async fn new(pool: PgPool) -> Result<Self, StoreError> {
        Self::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Connects a fresh pool and asserts the message table.
    ///
    /// # Arguments
    /// * `url` - Postgres connection URL.
    /// * `max_connections` - Pool size cap.
    ///
    /// # Errors
    /// Returns an error if the connection or schema assertion fails.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        metrics::gauge!("db_pool_max_connections").set(f64::from(max_connections));
        Self::new(pool).await
    }

    async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id UUID PRIMARY KEY,
                body TEXT NOT NULL,
                author_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_initials TEXT NOT NULL,
                sent_at_ms BIGINT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS chat_messages_sent_at_idx ON chat_messages (sent_at_ms)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, record: &NewMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_messages (id, body, author_id, author_name, author_initials, sent_at_ms)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(&record.text)
        .bind(&record.author_id)
        .bind(&record.author_name)
        .bind(&record.author_initials)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_recent(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct MessageRow {
            id: Uuid,
            body: String,
            author_id: String,
            author_name: String,
            author_initials: String,
            sent_at_ms: i64,
        }

        // Newest N first, then reversed into ascending presentation order.
        let mut rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, body, author_id, author_name, author_initials, sent_at_ms
             FROM chat_messages
             ORDER BY sent_at_ms DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();

        Ok(rows
            .into_iter()
            .map(|row| ChatMessage {
                id: row.id.to_string(),
                text: row.body,
                author_id: row.author_id,
                author_name: row.author_name,
                author_initials: row.author_initials,
                timestamp: Some(row.sent_at_ms),
            })
            .collect())
    }
}
