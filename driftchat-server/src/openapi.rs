use std::sync::Arc;

use axum::{Router, response::Json, routing::get};
use shared::{ChatMessage, ErrorResponse};
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::routes::health::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Driftchat API",
        version = "1.0.0",
        description = "HTTP surface of the Driftchat relay server"
    ),
    paths(
        crate::routes::health::health,
        crate::routes::messages::list_messages,
    ),
    components(schemas(ChatMessage, HealthResponse, ErrorResponse)),
    tags(
        (name = "Health", description = "Liveness endpoints"),
        (name = "Messages", description = "Durable message history")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn openapi_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_both_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/messages"));
    }
}
