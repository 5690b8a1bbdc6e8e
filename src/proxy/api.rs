//! Read-only JSON view of the transaction log

use crate::proxy::error_response::plain_text_response;
use crate::proxy::headers::content_types;
use crate::proxy::log_store::LogStore;
use crate::proxy::types::LogEntryId;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

/// `GET /api/logs`: every retained entry, newest first
pub async fn list_logs(State(store): State<Arc<LogStore>>) -> Response {
    json_response(&store.list())
}

/// `GET /api/logs/{id}`
pub async fn get_log(State(store): State<Arc<LogStore>>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<u64>() else {
        return plain_text_response(StatusCode::BAD_REQUEST, "invalid log id\n");
    };

    match store.get(LogEntryId::from(id)) {
        Some(entry) => json_response(&entry),
        None => plain_text_response(StatusCode::NOT_FOUND, "404 page not found\n"),
    }
}

/// `GET /healthz`
pub async fn health() -> &'static str {
    "ok"
}

fn json_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec_pretty(value) {
        Ok(body) => ([(header::CONTENT_TYPE, content_types::JSON)], body).into_response(),
        Err(error) => plain_text_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}
