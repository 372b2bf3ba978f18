use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single chat message as seen by every component of the system.
///
/// The wire format, the durable store, and the mirror store all use the
/// camelCase rendering of these fields. `timestamp` is epoch milliseconds
/// and is `None` only for a local echo that no transport has confirmed yet;
/// once set it never changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier. Assigned once: either a `local-` prefixed
    /// placeholder on the sending client or a canonical relay/store id.
    pub id: String,

    /// The message body.
    pub text: String,

    /// Stable identifier of the author.
    pub author_id: String,

    /// Display name of the author at send time.
    pub author_name: String,

    /// Short initials of the author at send time.
    pub author_initials: String,

    /// Epoch-millisecond send time, `None` while unacknowledged.
    pub timestamp: Option<i64>,
}

impl ChatMessage {
    /// The composite identity used to collapse duplicate arrivals across
    /// transports. Ids differ between the relay and the mirror store, so
    /// identity is `(text, author_id, timestamp)` instead.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            text: self.text.clone(),
            author_id: self.author_id.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Whether this message is an unacknowledged local echo.
    pub const fn is_pending(&self) -> bool {
        self.timestamp.is_none()
    }
}

/// Composite de-dup key: `(text, author_id, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub text: String,
    pub author_id: String,
    pub timestamp: Option<i64>,
}

/// A message about to be appended to a store, before an id exists.
///
/// Unlike [`ChatMessage`], the timestamp here is mandatory: the writer
/// stamps it before handing the record to a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// The message body.
    pub text: String,

    /// Stable identifier of the author.
    pub author_id: String,

    /// Display name of the author.
    pub author_name: String,

    /// Short initials of the author.
    pub author_initials: String,

    /// Epoch-millisecond send time.
    pub timestamp: i64,
}

impl NewMessage {
    /// Promotes the record to a [`ChatMessage`] under the given id.
    pub fn into_message(self, id: String) -> ChatMessage {
        ChatMessage {
            id,
            text: self.text,
            author_id: self.author_id,
            author_name: self.author_name,
            author_initials: self.author_initials,
            timestamp: Some(self.timestamp),
        }
    }
}
