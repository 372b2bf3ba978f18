//! One-shot durable-history read over the relay's HTTP surface.

use async_trait::async_trait;
use shared::ChatMessage;
use thiserror::Error;
use url::Url;

/// Failure reading the durable history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid history endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("history request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Reads the recent durable history at session start.
#[async_trait]
pub trait HistoryReader: Send + Sync {
    /// Fetches up to `limit` most recent messages, ascending by timestamp.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ChatMessage>, HistoryError>;
}

/// `GET {base}/messages?limit=N` against the relay.
#[derive(Debug, Clone)]
pub struct HttpHistory {
    client: reqwest::Client,
    base: Url,
}

impl HttpHistory {
    /// Creates a reader against the relay's HTTP base URL.
    ///
    /// # Errors
    /// Returns an error if `base` does not parse as a URL.
    pub fn new(base: &str) -> Result<Self, HistoryError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(base)?,
        })
    }
}

#[async_trait]
impl HistoryReader for HttpHistory {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ChatMessage>, HistoryError> {
        let endpoint = self.base.join("messages")?;
        let messages = self
            .client
            .get(endpoint)
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ChatMessage>>()
            .await?;
        Ok(messages)
    }
}
