#![cfg_attr(not(test), forbid(unsafe_code))]

//! Driftchat client session library.
//!
//! A [`driver::ChatClient`] owns the connection lifecycle: it keeps the
//! push channel alive with a fixed-backoff reconnect loop, merges the live
//! stream with the durable history and the mirror store into one
//! deduplicated transcript, and submits messages down whichever transport
//! paths are currently available.

pub mod driver;
pub mod history;
pub mod identity;
pub mod mirror;
pub mod reconcile;
pub mod session;

pub use driver::{ChatClient, ClientError, SessionStatus};
pub use history::{HistoryError, HistoryReader, HttpHistory};
pub use identity::{IdentityError, default_profile_path, generate, initials_for, load_or_create};
pub use mirror::{MirrorError, MirrorStore, NullMirror, RtdbMirror};
pub use reconcile::{LiveOutcome, Transcript};
pub use session::{ChannelEvent, ChannelState, SendError, Session, SessionAction};
