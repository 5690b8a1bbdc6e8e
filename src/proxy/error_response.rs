//! Error replies for proxied requests
//!
//! Failures are answered the way a plain HTTP reverse proxy answers them: a
//! status code and the error text as `text/plain`, so the client sees the
//! same message that is recorded on the transaction.

use crate::proxy::headers::content_types;
use crate::proxy::types::ProxyError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Extension trait for consistent error replies
pub trait ErrorResponseExt {
    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;

    /// Body text sent to the client
    fn client_message(&self) -> String;
}

impl ErrorResponseExt for ProxyError {
    fn status_code(&self) -> StatusCode {
        use ProxyError::*;

        match self {
            NoTarget | InvalidTarget(_) | IncompleteTarget | InvalidProxyPath(_) | RequestBody(_) => {
                StatusCode::BAD_REQUEST
            }
            UpstreamRequest(_) | Upstream(_) | UpstreamTimeout(_) | ResponseBody(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn client_message(&self) -> String {
        format!("{self}\n")
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        plain_text_response(self.status_code(), self.client_message())
    }
}

/// Plain text reply with the given status
pub fn plain_text_response(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, content_types::TEXT_PLAIN),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body.into(),
    )
        .into_response()
}
