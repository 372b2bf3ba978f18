//! The client-side session as an explicit state machine.
//!
//! Channel callbacks become an enum-tagged event union consumed by one
//! transition function, so every lifecycle path (connect, register,
//! reconnect, dedup re-check scheduling) is unit-testable without a
//! socket. The driver owns the actual channel handle and executes the
//! actions this module emits.

use std::time::Duration;

use shared::config::client::ClientConfig;
use shared::{ChatMessage, ClientFrame, NewMessage, Participant, ServerFrame};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::reconcile::{LiveOutcome, Transcript};

/// Push-channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Registered,
}

/// Everything the channel can report, as data.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The channel opened; a register frame must follow immediately.
    Opened,
    /// A frame arrived from the relay.
    Frame(ServerFrame),
    /// Channel-level failure. The close event still follows and drives
    /// the reconnect; this only flags the error to the presentation layer.
    ChannelError(String),
    /// The channel closed, whether after an error or server-initiated.
    Closed,
}

/// Side effects the driver must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Transmit a frame over the live channel.
    SendFrame(ClientFrame),
    /// Open a new channel after the given delay.
    ScheduleReconnect(Duration),
    /// Run the duplicate re-check for a message after the given delay.
    ScheduleRecheck {
        message_id: String,
        delay: Duration,
    },
}

/// Why a submission failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("offline, no transport attempted")]
    Offline,

    #[error("secondary store rejected the message: {0}")]
    MirrorRejected(String),

    #[error("session closed")]
    Closed,
}

/// The transports a submission should attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPlan {
    /// Frame for the push channel; `None` when the channel is not
    /// registered and the mirror is the sole path.
    pub channel_frame: Option<ClientFrame>,
    /// Record for the mirror store write.
    pub mirror_record: NewMessage,
    /// When true, a mirror failure is the overall submission failure.
    /// Otherwise the mirror write is redundant and failures are swallowed.
    pub mirror_is_sole_path: bool,
}

/// Client-side session state: channel lifecycle, transcript, and flags.
#[derive(Debug)]
pub struct Session {
    participant: Participant,
    config: ClientConfig,
    state: ChannelState,
    transcript: Transcript,
    network_error: bool,
    online: bool,
}

impl Session {
    pub fn new(participant: Participant, config: ClientConfig) -> Self {
        let transcript = Transcript::new(config.echo_window_ms, config.recheck_window_ms);
        Self {
            participant,
            config,
            state: ChannelState::Disconnected,
            transcript,
            network_error: false,
            online: true,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the network-error banner should be visible.
    pub fn network_error(&self) -> bool {
        self.network_error
    }

    /// Host-reported connectivity. Coming back online clears the banner.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
        if online {
            self.network_error = false;
        } else {
            self.network_error = true;
        }
    }

    /// Flags a network error outside the channel lifecycle (e.g. a failed
    /// history fetch at start-up).
    pub fn flag_network_error(&mut self) {
        self.network_error = true;
    }

    /// Seeds the transcript from the two start-up reads; the mirror read
    /// is primary on key ties.
    pub fn seed_history(&mut self, mirrored: Vec<ChatMessage>, durable: Vec<ChatMessage>) {
        self.transcript.merge_history(mirrored, durable);
    }

    /// The driver is about to open a new channel (any prior channel is
    /// already closed).
    pub fn begin_connect(&mut self) {
        self.state = ChannelState::Connecting;
    }

    /// The single transition function over channel events.
    pub fn handle_event(&mut self, event: ChannelEvent, now_ms: i64) -> Vec<SessionAction> {
        match event {
            ChannelEvent::Opened => {
                self.state = ChannelState::Registered;
                self.network_error = false;
                vec![SessionAction::SendFrame(ClientFrame::Register {
                    participant_id: self.participant.id.clone(),
                    display_name: self.participant.name.clone(),
                })]
            }
            ChannelEvent::Frame(frame) => {
                let message = frame.into_message();
                let message_id = message.id.clone();
                match self.transcript.apply_live(message, now_ms) {
                    LiveOutcome::Duplicate => {
                        debug!(message_id, "duplicate live arrival dropped");
                        Vec::new()
                    }
                    LiveOutcome::Inserted | LiveOutcome::ReplacedEcho => {
                        vec![SessionAction::ScheduleRecheck {
                            message_id,
                            delay: Duration::from_millis(self.config.recheck_delay_ms),
                        }]
                    }
                }
            }
            ChannelEvent::ChannelError(reason) => {
                warn!(reason, "channel error");
                self.network_error = true;
                Vec::new()
            }
            ChannelEvent::Closed => {
                self.state = ChannelState::Disconnected;
                vec![SessionAction::ScheduleReconnect(Duration::from_millis(
                    self.config.reconnect_delay_ms,
                ))]
            }
        }
    }

    /// Runs a scheduled duplicate re-check against the transcript.
    pub fn recheck(&mut self, message_id: &str, now_ms: i64) -> bool {
        self.transcript.recheck(message_id, now_ms)
    }

    /// Decides the transport paths for one submission and applies the
    /// optimistic local echo when the channel path is taken.
    ///
    /// # Errors
    /// Rejects empty text outright, and anything while offline (which also
    /// raises the network-error flag, with no transport attempted).
    pub fn plan_submit(&mut self, text: &str, now_ms: i64) -> Result<SendPlan, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if !self.online {
            self.network_error = true;
            return Err(SendError::Offline);
        }

        let mirror_record = NewMessage {
            text: text.to_string(),
            author_id: self.participant.id.clone(),
            author_name: self.participant.name.clone(),
            author_initials: self.participant.initials.clone(),
            timestamp: now_ms,
        };

        if self.state == ChannelState::Registered {
            let echo = ChatMessage {
                id: format!("local-{}", Uuid::new_v4()),
                text: text.to_string(),
                author_id: self.participant.id.clone(),
                author_name: self.participant.name.clone(),
                author_initials: self.participant.initials.clone(),
                timestamp: None,
            };
            self.transcript.push_echo(echo, now_ms);

            Ok(SendPlan {
                channel_frame: Some(ClientFrame::Message {
                    participant_id: self.participant.id.clone(),
                    display_name: self.participant.name.clone(),
                    initials: self.participant.initials.clone(),
                    text: text.to_string(),
                }),
                mirror_record,
                mirror_is_sole_path: false,
            })
        } else {
            Ok(SendPlan {
                channel_frame: None,
                mirror_record,
                mirror_is_sole_path: true,
            })
        }
    }

    /// The current merged sequence: unique keys, sorted, nulls first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.transcript.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant() -> Participant {
        Participant {
            id: "u1".to_string(),
            name: "Robin Hale".to_string(),
            initials: "RH".to_string(),
        }
    }

    fn session() -> Session {
        Session::new(participant(), ClientConfig::with_defaults())
    }

    fn canonical_frame(id: &str, text: &str, author: &str, timestamp: i64) -> ServerFrame {
        ServerFrame::Message {
            id: id.to_string(),
            participant_id: author.to_string(),
            display_name: "Robin Hale".to_string(),
            initials: "RH".to_string(),
            text: text.to_string(),
            timestamp,
        }
    }

    #[test]
    fn open_registers_and_clears_error_flag() {
        let mut session = session();
        session.flag_network_error();
        session.begin_connect();

        let actions = session.handle_event(ChannelEvent::Opened, 0);
        assert_eq!(session.state(), ChannelState::Registered);
        assert!(!session.network_error());
        assert_eq!(
            actions,
            vec![SessionAction::SendFrame(ClientFrame::Register {
                participant_id: "u1".to_string(),
                display_name: "Robin Hale".to_string(),
            })]
        );
    }

    #[test]
    fn close_schedules_fixed_backoff_reconnect() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);

        let actions = session.handle_event(ChannelEvent::Closed, 100);
        assert_eq!(session.state(), ChannelState::Disconnected);
        assert_eq!(
            actions,
            vec![SessionAction::ScheduleReconnect(Duration::from_millis(3000))]
        );
    }

    #[test]
    fn error_flags_but_close_drives_the_transition() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);

        let actions = session.handle_event(ChannelEvent::ChannelError("io".to_string()), 50);
        assert!(actions.is_empty());
        assert!(session.network_error());
        assert_eq!(session.state(), ChannelState::Registered);
    }

    #[test]
    fn register_sent_once_per_reconnect() {
        let mut session = session();
        let mut register_count = 0;

        for _ in 0..3 {
            session.begin_connect();
            let actions = session.handle_event(ChannelEvent::Opened, 0);
            register_count += actions
                .iter()
                .filter(|action| matches!(action, SessionAction::SendFrame(ClientFrame::Register { .. })))
                .count();
            session.handle_event(ChannelEvent::Closed, 0);
        }

        assert_eq!(register_count, 3);
    }

    #[test]
    fn live_arrival_schedules_recheck_duplicate_does_not() {
        let mut session = session();

        let actions =
            session.handle_event(ChannelEvent::Frame(canonical_frame("srv-1", "hi", "u2", 1000)), 1000);
        assert_eq!(
            actions,
            vec![SessionAction::ScheduleRecheck {
                message_id: "srv-1".to_string(),
                delay: Duration::from_millis(250),
            }]
        );

        let actions =
            session.handle_event(ChannelEvent::Frame(canonical_frame("srv-9", "hi", "u2", 1000)), 1100);
        assert!(actions.is_empty(), "same key again is a duplicate");
        assert_eq!(session.snapshot().len(), 1);
    }

    #[test]
    fn submit_empty_text_is_rejected_without_echo() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);

        assert_eq!(session.plan_submit("", 100), Err(SendError::EmptyMessage));
        assert_eq!(session.plan_submit("   ", 100), Err(SendError::EmptyMessage));
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn submit_offline_fails_and_flags_without_transport() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);
        session.set_online(false);

        assert_eq!(session.plan_submit("hello", 100), Err(SendError::Offline));
        assert!(session.network_error());
        assert!(session.snapshot().is_empty(), "no echo without a transport");
    }

    #[test]
    fn coming_back_online_clears_the_banner() {
        let mut session = session();
        session.set_online(false);
        assert!(session.network_error());
        session.set_online(true);
        assert!(!session.network_error());
    }

    #[test]
    fn submit_while_registered_takes_both_paths_with_echo() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);

        let plan = session.plan_submit("hello", 100).unwrap();
        assert!(!plan.mirror_is_sole_path);
        assert_eq!(
            plan.channel_frame,
            Some(ClientFrame::Message {
                participant_id: "u1".to_string(),
                display_name: "Robin Hale".to_string(),
                initials: "RH".to_string(),
                text: "hello".to_string(),
            })
        );
        assert_eq!(plan.mirror_record.timestamp, 100);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_pending());
        assert!(snapshot[0].id.starts_with("local-"));
    }

    #[test]
    fn echo_collapses_when_the_canonical_copy_arrives() {
        let mut session = session();
        session.begin_connect();
        session.handle_event(ChannelEvent::Opened, 0);
        session.plan_submit("hello", 100).unwrap();

        session.handle_event(
            ChannelEvent::Frame(canonical_frame("srv-1", "hello", "u1", 1000)),
            1000,
        );

        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "srv-1");
        assert_eq!(snapshot[0].timestamp, Some(1000));
    }

    #[test]
    fn submit_while_disconnected_is_mirror_only_without_echo() {
        let mut session = session();

        let plan = session.plan_submit("hello", 100).unwrap();
        assert!(plan.channel_frame.is_none());
        assert!(plan.mirror_is_sole_path);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn seed_history_flows_into_snapshot() {
        let mut session = session();
        session.seed_history(
            vec![ServerFrame::Message {
                id: "m1".to_string(),
                participant_id: "u2".to_string(),
                display_name: "Sam".to_string(),
                initials: "S".to_string(),
                text: "welcome".to_string(),
                timestamp: 1000,
            }
            .into_message()],
            Vec::new(),
        );

        assert_eq!(session.snapshot().len(), 1);
    }
}
