//! Durable store adapter: best-effort secondary persistence of messages.
//!
//! The relay treats persistence as an independent, retryable sink; nothing
//! here is allowed to influence the broadcast path. `GET /messages` reads
//! back through the same trait.

mod memory;
mod postgres;

use async_trait::async_trait;
use shared::{ChatMessage, NewMessage};
use thiserror::Error;

pub use memory::MemoryMessageStore;
pub use postgres::PgMessageStore;

/// Failures raised by a message store. Always logged, never propagated to
/// the sender or the broadcast path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append/read interface over the durable message history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends one message; the store assigns its own id.
    async fn append(&self, record: &NewMessage) -> Result<(), StoreError>;

    /// Returns up to `limit` most recent messages, ascending by timestamp.
    async fn fetch_recent(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;
}
