//! Data model shared between the relay server and clients.

pub mod errors;
pub mod frame;
pub mod message;
pub mod participant;
