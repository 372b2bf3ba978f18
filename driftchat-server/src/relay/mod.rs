//! The real-time distribution core: connection registry and broadcast relay.

mod broadcast;
mod registry;

pub use broadcast::BroadcastRelay;
pub use registry::{BroadcastTarget, ConnectionRegistry};
