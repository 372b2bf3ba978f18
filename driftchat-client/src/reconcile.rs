//! The reconciliation engine: one consistent transcript out of three
//! unsynchronized sources.
//!
//! Messages arrive from the live relay stream, from a one-shot durable
//! history read, and from the mirror store. Ids differ across those paths,
//! so duplicates collapse on the composite `(text, author, timestamp)` key,
//! with one special case: a pending local echo (no timestamp yet) is
//! replaced in place by a canonical arrival carrying the same text and
//! author inside a bounded window.
//!
//! Ordering policy: ascending by timestamp with missing timestamps sorting
//! first. The engine is pure and clock-parameterized; callers pass the
//! current wall-clock milliseconds at every mutation.

use std::cmp::Ordering;

use shared::{ChatMessage, DedupKey};

/// What happened to a live arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// New entry, appended in sorted position.
    Inserted,
    /// A pending local echo with the same text and author was replaced.
    ReplacedEcho,
    /// The composite key was already present; nothing changed.
    Duplicate,
}

#[derive(Debug, Clone)]
struct Entry {
    message: ChatMessage,
    /// Local clock at echo creation; `None` for confirmed entries.
    echo_sent_at: Option<i64>,
}

/// The merged, deduplicated, time-ordered message sequence.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<Entry>,
    echo_window_ms: i64,
    recheck_window_ms: i64,
}

impl Transcript {
    pub fn new(echo_window_ms: i64, recheck_window_ms: i64) -> Self {
        Self {
            entries: Vec::new(),
            echo_window_ms,
            recheck_window_ms,
        }
    }

    /// Merges the two historical reads into the working set.
    ///
    /// `primary` is the mirror store's read, `secondary` the durable
    /// store's; when both carry a record with the same composite key the
    /// first-seen copy wins, making the tie-break deterministic.
    pub fn merge_history(&mut self, primary: Vec<ChatMessage>, secondary: Vec<ChatMessage>) {
        for message in primary.into_iter().chain(secondary) {
            if !self.contains_key(&message.dedup_key()) {
                self.entries.push(Entry {
                    message,
                    echo_sent_at: None,
                });
            }
        }
        self.sort();
    }

    /// Appends a tentative local echo (timestamp `None`).
    pub fn push_echo(&mut self, message: ChatMessage, now_ms: i64) {
        self.entries.push(Entry {
            message,
            echo_sent_at: Some(now_ms),
        });
        self.sort();
    }

    /// Applies one live arrival from either the relay or the mirror
    /// subscription. Both paths go through the same key check.
    pub fn apply_live(&mut self, message: ChatMessage, now_ms: i64) -> LiveOutcome {
        if self.contains_key(&message.dedup_key()) {
            return LiveOutcome::Duplicate;
        }

        let replaceable = self.entries.iter().position(|entry| {
            entry.message.is_pending()
                && entry.message.text == message.text
                && entry.message.author_id == message.author_id
                && entry
                    .echo_sent_at
                    .is_some_and(|sent_at| now_ms.saturating_sub(sent_at) <= self.echo_window_ms)
        });

        if let Some(index) = replaceable {
            self.entries[index] = Entry {
                message,
                echo_sent_at: None,
            };
            self.sort();
            return LiveOutcome::ReplacedEcho;
        }

        self.entries.push(Entry {
            message,
            echo_sent_at: None,
        });
        self.sort();
        LiveOutcome::Inserted
    }

    /// The delayed duplicate re-check: drops any later entries sharing the
    /// given id, guarding against the race where one canonical message was
    /// queued twice before the first dedup pass completed.
    ///
    /// Re-checks for messages older than the staleness window are
    /// discarded. Returns whether anything was removed.
    pub fn recheck(&mut self, message_id: &str, now_ms: i64) -> bool {
        let Some(first) = self
            .entries
            .iter()
            .position(|entry| entry.message.id == message_id)
        else {
            return false;
        };

        if let Some(timestamp) = self.entries[first].message.timestamp {
            if now_ms.saturating_sub(timestamp) > self.recheck_window_ms {
                return false;
            }
        }

        let before = self.entries.len();
        let mut kept_one = false;
        self.entries.retain(|entry| {
            if entry.message.id == message_id {
                if kept_one {
                    return false;
                }
                kept_one = true;
            }
            true
        });
        before != self.entries.len()
    }

    /// A consistent snapshot of the current sequence. Never observes a
    /// half-applied merge; every mutation completes before the next
    /// snapshot is taken.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains_key(&self, key: &DedupKey) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.message.dedup_key() == *key)
    }

    fn sort(&mut self) {
        // Stable: equal timestamps keep arrival order.
        self.entries
            .sort_by(|a, b| compare_timestamps(a.message.timestamp, b.message.timestamp));
    }
}

/// Missing timestamps sort before any numeric timestamp.
fn compare_timestamps(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}
