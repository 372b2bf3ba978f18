use std::collections::HashMap;

use shared::ServerFrame;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

/// A live registration: one per participant, replaced on re-register.
#[derive(Debug, Clone)]
struct Registration {
    connection_id: Uuid,
    display_name: String,
    sender: mpsc::Sender<ServerFrame>,
}

/// A snapshot entry handed to the relay for one fan-out pass.
#[derive(Debug, Clone)]
pub struct BroadcastTarget {
    pub connection_id: Uuid,
    pub participant_id: String,
    pub sender: mpsc::Sender<ServerFrame>,
}

/// Tracks which live connection belongs to which participant.
///
/// All access is serialized through one async mutex: registration and
/// removal may race with an in-flight broadcast, and the relay treats a
/// target that closed mid-send as a non-fatal per-target failure. Two
/// registrations racing for the same participant id resolve last-write-wins.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<String, Registration>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the registration for `participant_id`.
    pub async fn register(
        &self,
        connection_id: Uuid,
        participant_id: &str,
        display_name: &str,
        sender: mpsc::Sender<ServerFrame>,
    ) {
        let mut guard = self.inner.lock().await;
        let replaced = guard.insert(
            participant_id.to_string(),
            Registration {
                connection_id,
                display_name: display_name.to_string(),
                sender,
            },
        );
        if replaced.is_some() {
            debug!(participant_id, "registration replaced");
        }
    }

    /// Removes the entry owned by `connection_id`, returning the participant
    /// id it was registered under.
    ///
    /// A connection that never registered (or was already displaced by a
    /// newer registration for the same participant) removes nothing.
    pub async fn unregister(&self, connection_id: Uuid) -> Option<String> {
        let mut guard = self.inner.lock().await;
        let participant_id = guard
            .iter()
            .find(|(_, registration)| registration.connection_id == connection_id)
            .map(|(participant_id, _)| participant_id.clone())?;
        guard.remove(&participant_id);
        Some(participant_id)
    }

    /// Snapshots the current fan-out targets.
    pub async fn broadcast_targets(&self) -> Vec<BroadcastTarget> {
        let guard = self.inner.lock().await;
        guard
            .iter()
            .map(|(participant_id, registration)| BroadcastTarget {
                connection_id: registration.connection_id,
                participant_id: participant_id.clone(),
                sender: registration.sender.clone(),
            })
            .collect()
    }

    /// Number of live registrations, reported by `/health`.
    pub async fn active_connections(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Display name currently registered for a participant.
    pub async fn display_name(&self, participant_id: &str) -> Option<String> {
        let guard = self.inner.lock().await;
        guard
            .get(participant_id)
            .map(|registration| registration.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<ServerFrame>, mpsc::Receiver<ServerFrame>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn one_entry_per_participant_last_write_wins() {
        let registry = ConnectionRegistry::new();
        let first_connection = Uuid::new_v4();
        let second_connection = Uuid::new_v4();
        let (tx, _rx) = channel();

        registry
            .register(first_connection, "u1", "Robin", tx.clone())
            .await;
        registry
            .register(second_connection, "u1", "Robin H.", tx)
            .await;

        assert_eq!(registry.active_connections().await, 1);
        assert_eq!(
            registry.display_name("u1").await.as_deref(),
            Some("Robin H.")
        );

        let targets = registry.broadcast_targets().await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].connection_id, second_connection);
    }

    #[tokio::test]
    async fn unregister_removes_by_connection() {
        let registry = ConnectionRegistry::new();
        let connection_a = Uuid::new_v4();
        let connection_b = Uuid::new_v4();
        let (tx, _rx) = channel();

        registry.register(connection_a, "u1", "Robin", tx.clone()).await;
        registry.register(connection_b, "u2", "Sam", tx).await;

        assert_eq!(
            registry.unregister(connection_a).await.as_deref(),
            Some("u1")
        );
        assert_eq!(registry.active_connections().await, 1);
        assert!(registry.display_name("u1").await.is_none());
        assert!(registry.display_name("u2").await.is_some());
    }

    #[tokio::test]
    async fn unregister_skips_displaced_connection() {
        let registry = ConnectionRegistry::new();
        let stale_connection = Uuid::new_v4();
        let live_connection = Uuid::new_v4();
        let (tx, _rx) = channel();

        registry.register(stale_connection, "u1", "Robin", tx.clone()).await;
        registry.register(live_connection, "u1", "Robin", tx).await;

        // The stale connection closing must not tear down the newer entry.
        assert!(registry.unregister(stale_connection).await.is_none());
        assert_eq!(registry.active_connections().await, 1);
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister(Uuid::new_v4()).await.is_none());
        assert_eq!(registry.active_connections().await, 0);
    }
}
