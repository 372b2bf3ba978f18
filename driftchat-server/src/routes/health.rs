use std::sync::Arc;

use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health payload: process liveness plus live registration count.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Number of live registered connections.
    pub active_connections: usize,
    /// Whether the push-channel endpoint is accepting upgrades.
    pub relay_up: bool,
}

/// Liveness and connection-count endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    metrics::counter!("health_checks_total", "endpoint" => "health", "status" => "ok")
        .increment(1);

    Json(HealthResponse {
        status: "ok".to_string(),
        active_connections: state.registry.active_connections().await,
        // Upgrades are served by this same process; if we can answer, the
        // relay is up.
        relay_up: true,
    })
}

pub fn create_health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{BroadcastRelay, ConnectionRegistry};
    use crate::store::{MemoryMessageStore, MessageStore};
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use shared::config::server::ServerConfig;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let registry = Arc::new(ConnectionRegistry::new());
        let store: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new());
        Arc::new(AppState {
            config: Arc::new(ServerConfig::with_defaults()),
            relay: Arc::new(BroadcastRelay::new(Arc::clone(&registry), Arc::clone(&store))),
            registry,
            store,
        })
    }

    #[tokio::test]
    async fn health_reports_ok_with_no_connections() {
        let _ = crate::server::metrics_handle();
        let app = create_health_router().with_state(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["activeConnections"], 0);
        assert_eq!(json["relayUp"], true);
    }

    #[tokio::test]
    async fn health_counts_registered_connections() {
        let _ = crate::server::metrics_handle();
        let state = test_state();
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        state
            .registry
            .register(uuid::Uuid::new_v4(), "u1", "Robin", tx)
            .await;

        let app = create_health_router().with_state(Arc::clone(&state));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["activeConnections"], 1);
    }
}
