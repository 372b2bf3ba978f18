#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared models, wire frames, and configuration for the Driftchat platform.

pub mod config;
pub mod models;

pub use models::errors::{ChatError, ErrorResponse};
pub use models::frame::{ClientFrame, ServerFrame};
pub use models::message::{ChatMessage, DedupKey, NewMessage};
pub use models::participant::Participant;
