use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::message::ChatMessage;

/// Frames a client sends over the push channel, tagged by `type`.
///
/// `register` is sent once per successful connect, before anything else.
/// Unrecognized or malformed frames are dropped by the relay without
/// closing the connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Associates the connection with a participant.
    Register {
        participant_id: String,
        display_name: String,
    },
    /// A chat message submission. The relay assigns id and timestamp.
    Message {
        participant_id: String,
        display_name: String,
        initials: String,
        text: String,
    },
}

/// Frames the relay fans out to every registered connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// A canonical message: relay-assigned id and timestamp.
    Message {
        id: String,
        participant_id: String,
        display_name: String,
        initials: String,
        text: String,
        timestamp: i64,
    },
}

impl ServerFrame {
    /// Wraps a stamped message for broadcast.
    ///
    /// # Panics
    /// Does not panic; an absent timestamp (never produced by the relay)
    /// falls back to zero rather than poisoning the broadcast path.
    pub fn from_message(message: &ChatMessage) -> Self {
        ServerFrame::Message {
            id: message.id.clone(),
            participant_id: message.author_id.clone(),
            display_name: message.author_name.clone(),
            initials: message.author_initials.clone(),
            text: message.text.clone(),
            timestamp: message.timestamp.unwrap_or(0),
        }
    }

    /// Converts the frame back into the model type used by stores and the
    /// reconciliation engine.
    pub fn into_message(self) -> ChatMessage {
        match self {
            ServerFrame::Message {
                id,
                participant_id,
                display_name,
                initials,
                text,
                timestamp,
            } => ChatMessage {
                id,
                text,
                author_id: participant_id,
                author_name: display_name,
                author_initials: initials,
                timestamp: Some(timestamp),
            },
        }
    }
}
