//! The channel driver: an actor task that owns the push-channel socket and
//! executes the actions the session state machine emits.
//!
//! Callers hold a [`ChatClient`] handle. Commands flow in over an mpsc
//! channel; the merged transcript and the session status flow out through
//! `watch` channels, so readers always observe a complete snapshot.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use shared::config::client::ClientConfig;
use shared::{ChatMessage, ClientFrame, Participant, ServerFrame};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::time::DelayQueue;
use tracing::{debug, warn};

use crate::history::{HistoryError, HistoryReader, HttpHistory};
use crate::mirror::{MirrorError, MirrorStore, NullMirror, RtdbMirror};
use crate::session::{ChannelEvent, ChannelState, SendError, Session, SessionAction};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Failure assembling a client from configuration.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Channel state and error flag as published to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ChannelState,
    pub network_error: bool,
}

#[derive(Debug)]
enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    SetOnline(bool),
    Shutdown,
}

/// Handle to a running client session.
///
/// Cloning is cheap; all clones drive the same session. Dropping every
/// handle shuts the driver down, cancelling any pending reconnect.
#[derive(Debug, Clone)]
pub struct ChatClient {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Vec<ChatMessage>>,
    status: watch::Receiver<SessionStatus>,
}

impl ChatClient {
    /// Spawns the driver with explicit history and mirror backends.
    pub fn start(
        participant: Participant,
        config: ClientConfig,
        history: Arc<dyn HistoryReader>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        let session = Session::new(participant, config);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshots) = watch::channel(Vec::new());
        let (status_tx, status) = watch::channel(SessionStatus {
            state: ChannelState::Disconnected,
            network_error: false,
        });

        let driver = Driver {
            session,
            history,
            mirror,
            commands: command_rx,
            rechecks: DelayQueue::new(),
            snapshot_tx,
            status_tx,
        };
        tokio::spawn(driver.run());

        Self {
            commands: command_tx,
            snapshots,
            status,
        }
    }

    /// Spawns the driver with backends resolved from configuration: the
    /// relay's HTTP surface for history, and the mirror store when one is
    /// configured.
    ///
    /// # Errors
    /// Fails when a configured URL does not parse.
    pub fn connect(participant: Participant, config: ClientConfig) -> Result<Self, ClientError> {
        let history = Arc::new(HttpHistory::new(&config.http_url)?);
        let mirror: Arc<dyn MirrorStore> = match config.mirror_url.as_deref() {
            Some(url) => Arc::new(RtdbMirror::new(url)?),
            None => Arc::new(NullMirror),
        };
        Ok(Self::start(participant, config, history, mirror))
    }

    /// Submits one message, resolving once every attempted transport path
    /// has been decided.
    ///
    /// # Errors
    /// Empty text, offline state, a rejected mirror-only send, or a closed
    /// session.
    pub async fn submit(&self, text: &str) -> Result<(), SendError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                text: text.to_string(),
                reply,
            })
            .await
            .map_err(|_| SendError::Closed)?;
        response.await.map_err(|_| SendError::Closed)?
    }

    /// Reports host connectivity; offline submissions fail without any
    /// transport attempt.
    pub async fn set_online(&self, online: bool) {
        let _ = self.commands.send(Command::SetOnline(online)).await;
    }

    /// Watches the merged transcript.
    pub fn snapshots(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.snapshots.clone()
    }

    /// Watches the channel state and network-error flag.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Stops the driver, cancelling the pending reconnect and discarding
    /// in-flight mirror writes.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

enum ChannelExit {
    Closed,
    Shutdown,
}

struct Driver {
    session: Session,
    history: Arc<dyn HistoryReader>,
    mirror: Arc<dyn MirrorStore>,
    commands: mpsc::Receiver<Command>,
    rechecks: DelayQueue<String>,
    snapshot_tx: watch::Sender<Vec<ChatMessage>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl Driver {
    async fn run(mut self) {
        self.seed_history().await;

        loop {
            self.session.begin_connect();
            self.publish();

            let url = self.session.config().server_url.clone();
            let exit = match connect_async(url.as_str()).await {
                Ok((socket, _)) => self.drive_channel(socket).await,
                Err(err) => {
                    warn!(error = %err, "channel connect failed");
                    self.apply(ChannelEvent::ChannelError(err.to_string()));
                    ChannelExit::Closed
                }
            };
            if matches!(exit, ChannelExit::Shutdown) {
                debug!("session closed");
                return;
            }

            let actions = self.apply(ChannelEvent::Closed);
            let delay = actions
                .iter()
                .find_map(|action| match action {
                    SessionAction::ScheduleReconnect(delay) => Some(*delay),
                    _ => None,
                })
                .unwrap_or(Duration::from_millis(
                    self.session.config().reconnect_delay_ms,
                ));
            if !self.idle_until(Instant::now() + delay).await {
                return;
            }
        }
    }

    /// Concurrent start-up reads: the mirror is primary on key ties. A
    /// failed durable read raises the network-error flag; a failed mirror
    /// read only loses redundancy.
    async fn seed_history(&mut self) {
        let limit = self.session.config().history_limit;
        let (mirrored, durable) = tokio::join!(
            self.mirror.fetch_recent(limit),
            self.history.fetch_recent(limit),
        );

        let mirrored = mirrored.unwrap_or_else(|err| {
            warn!(error = %err, "mirror history read failed");
            Vec::new()
        });
        let durable = match durable {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "durable history read failed");
                self.session.flag_network_error();
                Vec::new()
            }
        };

        self.session.seed_history(mirrored, durable);
        self.publish();
    }

    /// Serves one live channel until it closes or the session shuts down.
    async fn drive_channel(&mut self, socket: WsStream) -> ChannelExit {
        let (mut sink, mut stream) = socket.split();

        for action in self.apply(ChannelEvent::Opened) {
            if let SessionAction::SendFrame(frame) = action {
                if let Err(reason) = send_frame(&mut sink, &frame).await {
                    self.apply(ChannelEvent::ChannelError(reason));
                    return ChannelExit::Closed;
                }
            }
        }

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(server_frame) => {
                                self.apply(ChannelEvent::Frame(server_frame));
                            }
                            Err(err) => debug!(error = %err, "dropping unrecognized frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return ChannelExit::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        self.apply(ChannelEvent::ChannelError(err.to_string()));
                        return ChannelExit::Closed;
                    }
                },
                Some(expired) = std::future::poll_fn(|cx| self.rechecks.poll_expired(cx)), if !self.rechecks.is_empty() => {
                    self.run_recheck(expired.into_inner());
                }
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return ChannelExit::Shutdown,
                    Some(Command::Submit { text, reply }) => {
                        let result = self.handle_submit(&text, Some(&mut sink)).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::SetOnline(online)) => {
                        self.session.set_online(online);
                        self.publish();
                    }
                },
            }
        }
    }

    /// Waits out the reconnect backoff while still serving commands and
    /// re-checks. Returns false on shutdown.
    async fn idle_until(&mut self, deadline: Instant) -> bool {
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return true,
                Some(expired) = std::future::poll_fn(|cx| self.rechecks.poll_expired(cx)), if !self.rechecks.is_empty() => {
                    self.run_recheck(expired.into_inner());
                }
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return false,
                    Some(Command::Submit { text, reply }) => {
                        let result = self.handle_submit(&text, None).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::SetOnline(online)) => {
                        self.session.set_online(online);
                        self.publish();
                    }
                },
            }
        }
    }

    async fn handle_submit(
        &mut self,
        text: &str,
        sink: Option<&mut WsSink>,
    ) -> Result<(), SendError> {
        let plan = self.session.plan_submit(text, now_ms())?;
        self.publish();

        if let (Some(frame), Some(sink)) = (plan.channel_frame.as_ref(), sink) {
            if let Err(reason) = send_frame(sink, frame).await {
                warn!(reason, "channel send failed");
                self.session.flag_network_error();
                self.publish();
            }
        }

        if plan.mirror_is_sole_path {
            self.mirror
                .append(&plan.mirror_record)
                .await
                .map(|_| ())
                .map_err(|err| SendError::MirrorRejected(err.to_string()))
        } else {
            // Redundant write: detached, never awaited by the caller.
            let mirror = Arc::clone(&self.mirror);
            let record = plan.mirror_record;
            tokio::spawn(async move {
                if let Err(err) = mirror.append(&record).await {
                    debug!(error = %err, "redundant mirror write failed");
                }
            });
            Ok(())
        }
    }

    fn run_recheck(&mut self, message_id: String) {
        if self.session.recheck(&message_id, now_ms()) {
            self.publish();
        }
    }

    /// Feeds one event through the state machine, queues any re-checks it
    /// scheduled, and publishes the result. Send actions are the caller's.
    fn apply(&mut self, event: ChannelEvent) -> Vec<SessionAction> {
        let actions = self.session.handle_event(event, now_ms());
        for action in &actions {
            if let SessionAction::ScheduleRecheck { message_id, delay } = action {
                self.rechecks.insert(message_id.clone(), *delay);
            }
        }
        self.publish();
        actions
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send_replace(self.session.snapshot());
        let _ = self.status_tx.send_replace(SessionStatus {
            state: self.session.state(),
            network_error: self.session.network_error(),
        });
    }
}

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> Result<(), String> {
    let json = serde_json::to_string(frame).map_err(|err| err.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|err| err.to_string())
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
