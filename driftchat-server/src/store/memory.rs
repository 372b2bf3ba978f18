use async_trait::async_trait;
use shared::{ChatMessage, NewMessage};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MessageStore, StoreError};

/// In-memory fallback store used when no database is configured, and by
/// tests. Mirrors the Postgres adapter's read shape: most recent `limit`
/// rows, returned ascending.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    inner: Mutex<Vec<ChatMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, record: &NewMessage) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        guard.push(record.clone().into_message(Uuid::new_v4().to_string()));
        Ok(())
    }

    async fn fetch_recent(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let guard = self.inner.lock().await;
        let mut messages = guard.clone();
        messages.sort_by_key(|message| message.timestamp);

        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, timestamp: i64) -> NewMessage {
        NewMessage {
            text: text.to_string(),
            author_id: "u1".to_string(),
            author_name: "Robin".to_string(),
            author_initials: "R".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn fetch_recent_returns_newest_ascending() {
        let store = MemoryMessageStore::new();
        store.append(&record("first", 1000)).await.unwrap();
        store.append(&record("third", 3000)).await.unwrap();
        store.append(&record("second", 2000)).await.unwrap();

        let recent = store.fetch_recent(2).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn append_assigns_unique_ids() {
        let store = MemoryMessageStore::new();
        store.append(&record("a", 1)).await.unwrap();
        store.append(&record("b", 2)).await.unwrap();

        let all = store.fetch_recent(10).await.unwrap();
        assert_ne!(all[0].id, all[1].id);
    }
}
