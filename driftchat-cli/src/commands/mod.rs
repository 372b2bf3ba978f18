//! Command modules for the Driftchat CLI.

pub mod chat;
pub mod completion;
pub mod history;
