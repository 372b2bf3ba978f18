//! One-shot fetch of the durable history.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::DateTime;
use client::history::{HistoryReader, HttpHistory};
use colored::Colorize;
use shared::config::client::ClientConfig;

/// Prints up to `limit` recent messages, oldest first.
pub async fn show_history(config_path: Option<PathBuf>, limit: Option<usize>) -> Result<()> {
    let config = ClientConfig::load_config(config_path).map_err(|err| anyhow!("{err}"))?;
    let limit = limit.unwrap_or(config.history_limit);

    let reader = HttpHistory::new(&config.http_url)?;
    let messages = reader.fetch_recent(limit).await?;

    if messages.is_empty() {
        println!("No messages yet.");
        return Ok(());
    }

    for message in &messages {
        let when = message
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .map(|when| when.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "pending".to_string());
        println!(
            "{} [{}] {} {}",
            when.dimmed(),
            message.author_initials.green(),
            message.author_name.bold(),
            message.text
        );
    }

    Ok(())
}
