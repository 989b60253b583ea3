use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub(crate) const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Please log in.";
pub(crate) const INTERNAL_MESSAGE: &str = "Internal server error";

/// Errors raised on the request path before or around handlers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No session, an expired one, or one without a complete identity.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The request's `Origin` is not in the allowed set.
    #[error("Not allowed by CORS")]
    OriginRejected,

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": UNAUTHORIZED_MESSAGE })),
            )
                .into_response(),
            Self::OriginRejected => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            Self::Store(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "Request failed with internal error");
                internal_error_response()
            }
        }
    }
}

/// Opaque 500 body; details stay in the server log.
pub(crate) fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_MESSAGE })),
    )
        .into_response()
}
