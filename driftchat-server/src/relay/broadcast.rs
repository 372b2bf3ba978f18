use std::{sync::Arc, time::Duration};

use chrono::Utc;
use shared::{ChatMessage, ClientFrame, NewMessage, ServerFrame};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::ConnectionRegistry;
use crate::store::MessageStore;

/// Durable append attempts before a message is given up on.
const PERSIST_ATTEMPTS: u32 = 4;

/// Base delay of the persistence retry backoff.
const PERSIST_BACKOFF: Duration = Duration::from_millis(250);

/// Accepts inbound frames from connections, stamps canonical metadata, and
/// fans messages out to every registered connection.
///
/// Persistence is an independent sink: the durable append runs in a spawned
/// task with bounded retries and can never block or fail the broadcast. A
/// crash between broadcast and persist drops that message from history even
/// though it was seen live; there is no transaction spanning the two.
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Handles one inbound frame from the connection identified by
    /// `connection_id`, whose outbound channel is `sender`.
    ///
    /// Register frames mutate the registry and broadcast nothing. Message
    /// frames with empty trimmed text are dropped silently; the sender is
    /// not notified.
    pub async fn submit(
        &self,
        connection_id: Uuid,
        frame: ClientFrame,
        sender: &mpsc::Sender<ServerFrame>,
    ) {
        match frame {
            ClientFrame::Register {
                participant_id,
                display_name,
            } => {
                self.registry
                    .register(connection_id, &participant_id, &display_name, sender.clone())
                    .await;
                debug!(%connection_id, participant_id, display_name, "participant registered");
            }
            ClientFrame::Message {
                participant_id,
                display_name,
                initials,
                text,
            } => {
                if text.trim().is_empty() {
                    metrics::counter!("relay_empty_messages_total").increment(1);
                    debug!(%connection_id, participant_id, "dropping empty message");
                    return;
                }

                let message = ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    text,
                    author_id: participant_id,
                    author_name: display_name,
                    author_initials: initials,
                    timestamp: Some(Utc::now().timestamp_millis()),
                };

                self.spawn_persist(&message);
                self.fan_out(&message).await;
            }
        }
    }

    /// Appends the canonical message to the durable store in a detached
    /// task, retrying with exponential backoff. Failures are logged and
    /// counted, never surfaced to the broadcast path.
    fn spawn_persist(&self, message: &ChatMessage) {
        let Some(timestamp) = message.timestamp else {
            return;
        };
        let record = NewMessage {
            text: message.text.clone(),
            author_id: message.author_id.clone(),
            author_name: message.author_name.clone(),
            author_initials: message.author_initials.clone(),
            timestamp,
        };
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let mut delay = PERSIST_BACKOFF;
            for attempt in 1..=PERSIST_ATTEMPTS {
                match store.append(&record).await {
                    Ok(()) => return,
                    Err(err) if attempt < PERSIST_ATTEMPTS => {
                        warn!(attempt, error = %err, "durable append failed, retrying");
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    Err(err) => {
                        metrics::counter!("relay_persist_failures_total").increment(1);
                        error!(error = %err, "durable append failed, message absent from history");
                    }
                }
            }
        });
    }

    /// Delivers the canonical message to every registered target that is
    /// currently writable. A full buffer skips that target; a closed
    /// channel evicts its registration. Either way delivery continues to
    /// the remaining targets.
    async fn fan_out(&self, message: &ChatMessage) {
        let frame = ServerFrame::from_message(message);
        let targets = self.registry.broadcast_targets().await;
        let mut delivered = 0usize;

        for target in targets {
            match target.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    metrics::counter!("relay_skipped_targets_total").increment(1);
                    warn!(
                        connection_id = %target.connection_id,
                        participant_id = target.participant_id,
                        "target not writable, skipping"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(
                        connection_id = %target.connection_id,
                        participant_id = target.participant_id,
                        "target closed mid-broadcast, evicting"
                    );
                    self.registry.unregister(target.connection_id).await;
                }
            }
        }

        metrics::counter!("relay_broadcasts_total").increment(1);
        debug!(message_id = message.id, delivered, "broadcast complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryMessageStore, StoreError};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn append(&self, _record: &NewMessage) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        }

        async fn fetch_recent(&self, _limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        }
    }

    fn message_frame(text: &str) -> ClientFrame {
        ClientFrame::Message {
            participant_id: "u1".to_string(),
            display_name: "Robin".to_string(),
            initials: "R".to_string(),
            text: text.to_string(),
        }
    }

    fn register_frame(participant_id: &str, name: &str) -> ClientFrame {
        ClientFrame::Register {
            participant_id: participant_id.to_string(),
            display_name: name.to_string(),
        }
    }

    async fn relay_with_memory_store() -> (BroadcastRelay, Arc<ConnectionRegistry>, Arc<MemoryMessageStore>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(MemoryMessageStore::new());
        let relay = BroadcastRelay::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn MessageStore>,
        );
        (relay, registry, store)
    }

    #[tokio::test]
    async fn register_does_not_broadcast() {
        let (relay, registry, _store) = relay_with_memory_store().await;
        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);

        relay.submit(connection_id, register_frame("u1", "Robin"), &tx).await;

        assert_eq!(registry.active_connections().await, 1);
        assert!(
            timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
            "register must not produce a frame"
        );
    }

    #[tokio::test]
    async fn message_fans_out_to_every_registered_connection() {
        let (relay, _registry, store) = relay_with_memory_store().await;
        let sender_connection = Uuid::new_v4();
        let (sender_tx, mut sender_rx) = mpsc::channel(8);
        let (other_tx, mut other_rx) = mpsc::channel(8);

        relay.submit(sender_connection, register_frame("u1", "Robin"), &sender_tx).await;
        relay.submit(Uuid::new_v4(), register_frame("u2", "Sam"), &other_tx).await;

        relay.submit(sender_connection, message_frame("hello"), &sender_tx).await;

        for rx in [&mut sender_rx, &mut other_rx] {
            let frame = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("frame delivered")
                .expect("channel open");
            let message = frame.into_message();
            assert_eq!(message.text, "hello");
            assert_eq!(message.author_id, "u1");
            assert!(message.timestamp.is_some(), "canonical copy is stamped");
            assert!(!message.id.is_empty());
        }

        // The durable copy lands asynchronously.
        let mut persisted = Vec::new();
        for _ in 0..50 {
            persisted = store.fetch_recent(10).await.unwrap();
            if !persisted.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].text, "hello");
    }

    #[tokio::test]
    async fn empty_and_whitespace_text_is_dropped() {
        let (relay, _registry, store) = relay_with_memory_store().await;
        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);

        relay.submit(connection_id, register_frame("u1", "Robin"), &tx).await;
        relay.submit(connection_id, message_frame(""), &tx).await;
        relay.submit(connection_id, message_frame("   "), &tx).await;

        assert!(
            timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
            "empty submissions must not broadcast"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.fetch_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_target_does_not_abort_delivery_to_others() {
        let (relay, registry, _store) = relay_with_memory_store().await;
        let closed_connection = Uuid::new_v4();
        let (closed_tx, closed_rx) = mpsc::channel(8);
        let (live_tx, mut live_rx) = mpsc::channel(8);

        relay.submit(closed_connection, register_frame("u1", "Robin"), &closed_tx).await;
        relay.submit(Uuid::new_v4(), register_frame("u2", "Sam"), &live_tx).await;

        // u1's connection dies without unregistering.
        drop(closed_rx);
        drop(closed_tx);

        relay.submit(Uuid::new_v4(), message_frame("still here"), &live_tx).await;

        let frame = timeout(Duration::from_secs(1), live_rx.recv())
            .await
            .expect("live target still receives")
            .expect("channel open");
        assert_eq!(frame.into_message().text, "still here");

        // The dead target was evicted during fan-out.
        assert_eq!(registry.active_connections().await, 1);
    }

    #[tokio::test]
    async fn persistence_failure_never_blocks_the_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(Arc::clone(&registry), Arc::new(FailingStore));
        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);

        relay.submit(connection_id, register_frame("u1", "Robin"), &tx).await;
        relay.submit(connection_id, message_frame("hello"), &tx).await;

        let frame = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("broadcast unaffected by store outage")
            .expect("channel open");
        assert_eq!(frame.into_message().text, "hello");
    }
}
