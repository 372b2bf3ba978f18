//! # Configuration
//!
//! Configuration structures for the relay server and the native client.
//! Values resolve in layers: compiled defaults, then an optional YAML/JSON
//! file, then `DRIFTCHAT_*` environment variables (applied only where the
//! file left the default in place), then explicit command-line overrides.

pub mod client;
pub mod server;
