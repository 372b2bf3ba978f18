use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};
use serde::Deserialize;
use shared::ChatMessage;

use crate::app_state::AppState;
use crate::http::error::{ApiError, AppResult};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

/// Returns up to `limit` most recent messages, ascending by timestamp.
#[utoipa::path(
    get,
    path = "/messages",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of messages to return")
    ),
    responses(
        (status = 200, description = "Recent messages, ascending by timestamp", body = [ChatMessage]),
        (status = 400, description = "Invalid limit", body = shared::ErrorResponse),
        (status = 500, description = "History fetch failed", body = shared::ErrorResponse)
    ),
    tag = "Messages"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let limit = match query.limit {
        Some(limit) if limit <= 0 => {
            return Err(ApiError::bad_request("limit must be greater than 0"));
        }
        Some(limit) => limit.min(state.config.history_limit),
        None => state.config.history_limit,
    };

    let messages = state.store.fetch_recent(limit).await?;
    metrics::counter!("history_fetches_total").increment(1);
    Ok(Json(messages))
}

pub fn create_messages_router() -> Router<Arc<AppState>> {
    Router::new().route("/messages", get(list_messages))
}
