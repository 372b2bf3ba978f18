//! Interactive chat session: stdin lines become submissions, the merged
//! transcript re-renders on every snapshot or status change.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use client::session::{ChannelState, SendError};
use client::{ChatClient, SessionStatus, identity};
use colored::Colorize;
use shared::ChatMessage;
use shared::config::client::ClientConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Starts the interactive session. Returns when stdin closes or the user
/// types `/quit`.
pub async fn start_chat(config_path: Option<PathBuf>, name: Option<String>) -> Result<()> {
    let config = ClientConfig::load_config(config_path).map_err(|err| anyhow!("{err}"))?;

    let profile_path = identity::default_profile_path()?;
    let mut participant = identity::load_or_create(&profile_path)?;
    if let Some(name) = name {
        participant.initials = identity::initials_for(&name);
        participant.name = name;
    }
    let me = participant.id.clone();

    let chat_client = ChatClient::connect(participant, config)?;
    let mut snapshots = chat_client.snapshots();
    let mut status = chat_client.status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    render(&snapshots.borrow(), &status.borrow(), &me);

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("stdin read failed")? {
                None => break,
                Some(line) => {
                    if line.trim() == "/quit" {
                        break;
                    }
                    match chat_client.submit(&line).await {
                        Ok(()) | Err(SendError::EmptyMessage) => {}
                        Err(err) => {
                            eprintln!("{}", format!("send failed: {err}").red());
                        }
                    }
                }
            },
            result = snapshots.changed() => {
                result.context("session ended")?;
                render(&snapshots.borrow(), &status.borrow(), &me);
            }
            result = status.changed() => {
                result.context("session ended")?;
                render(&snapshots.borrow(), &status.borrow(), &me);
            }
        }
    }

    chat_client.shutdown().await;
    println!("bye.");
    Ok(())
}

/// Full redraw: entries re-sort as pending echoes confirm, so appending
/// would misorder the transcript.
fn render(messages: &[ChatMessage], status: &SessionStatus, me: &str) {
    print!("\x1B[2J\x1B[1;1H");
    println!("{}", "driftchat".bold());

    if status.network_error {
        println!("{}", "network error, reconnecting...".red().bold());
    } else if status.state != ChannelState::Registered {
        println!("{}", "connecting...".yellow());
    }

    for message in messages {
        let when = match message.timestamp {
            Some(timestamp) => format_timestamp(timestamp),
            None => "pending".to_string(),
        };
        let tag = format!("[{}]", message.author_initials);
        let tag = if message.author_id == me {
            tag.cyan()
        } else {
            tag.green()
        };
        println!(
            "{} {} {} {}",
            when.dimmed(),
            tag,
            message.author_name.bold(),
            message.text
        );
    }

    print!("{} ", ">".bold());
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|when| when.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
