//! The secondary realtime store ("mirror"): a redundant write path and an
//! extra history source, speaking an RTDB-flavored REST dialect.
//!
//! Every message lives under `{base}/messages.json` as a map keyed by a
//! store-assigned id. Those ids never match the relay's, which is why the
//! reconciliation engine collapses on the composite key instead.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use shared::{ChatMessage, NewMessage};
use thiserror::Error;
use url::Url;

/// Failure of a mirror read or write.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid mirror endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("mirror request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mirror store not configured")]
    Unconfigured,
}

/// Redundant message store used for fallback delivery and cross-device sync.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Appends a record, returning the store-assigned id.
    async fn append(&self, record: &NewMessage) -> Result<String, MirrorError>;

    /// Fetches up to `limit` most recent messages, ascending by timestamp
    /// with missing timestamps first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ChatMessage>, MirrorError>;
}

/// Mirror record as stored: a message without its key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    text: String,
    author_id: String,
    author_name: String,
    author_initials: String,
    /// A record caught mid-write may not carry its timestamp yet.
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// REST client for an RTDB-dialect mirror backend.
#[derive(Debug, Clone)]
pub struct RtdbMirror {
    client: reqwest::Client,
    base: Url,
}

impl RtdbMirror {
    /// Creates a client against the mirror's base URL.
    ///
    /// # Errors
    /// Returns an error if `base` does not parse as a URL.
    pub fn new(base: &str) -> Result<Self, MirrorError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(base)?,
        })
    }

    fn collection(&self) -> Result<Url, MirrorError> {
        Ok(self.base.join("messages.json")?)
    }
}

#[async_trait]
impl MirrorStore for RtdbMirror {
    async fn append(&self, record: &NewMessage) -> Result<String, MirrorError> {
        let response = self
            .client
            .post(self.collection()?)
            .json(record)
            .send()
            .await?
            .error_for_status()?
            .json::<PushResponse>()
            .await?;
        Ok(response.name)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ChatMessage>, MirrorError> {
        // The map may deserialize from a JSON `null` when empty.
        let records = self
            .client
            .get(self.collection()?)
            .query(&[
                ("orderBy", "\"timestamp\"".to_string()),
                ("limitToLast", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Option<BTreeMap<String, StoredRecord>>>()
            .await?
            .unwrap_or_default();

        let mut messages: Vec<ChatMessage> = records
            .into_iter()
            .map(|(id, record)| ChatMessage {
                id,
                text: record.text,
                author_id: record.author_id,
                author_name: record.author_name,
                author_initials: record.author_initials,
                timestamp: record.timestamp,
            })
            .collect();

        // Same comparator as the reconciliation engine: nulls first.
        messages.sort_by(|a, b| match (a.timestamp, b.timestamp) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        });
        Ok(messages)
    }
}

/// Stand-in for deployments without a mirror: every write fails as
/// unconfigured and reads yield nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMirror;

#[async_trait]
impl MirrorStore for NullMirror {
    async fn append(&self, _record: &NewMessage) -> Result<String, MirrorError> {
        Err(MirrorError::Unconfigured)
    }

    async fn fetch_recent(&self, _limit: usize) -> Result<Vec<ChatMessage>, MirrorError> {
        Ok(Vec::new())
    }
}
