use std::sync::Arc;

use shared::config::server::ServerConfig;

use crate::relay::{BroadcastRelay, ConnectionRegistry};
use crate::store::MessageStore;

// Application state shared across all routes and socket handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) relay: Arc<BroadcastRelay>,
    pub(crate) store: Arc<dyn MessageStore>,
}
