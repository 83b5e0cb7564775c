use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use timetable_auth::SessionError;

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::NotFound => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "session not found",
        ),
        SessionError::StoreUnavailable(msg) => {
            tracing::warn!(error = %msg, "session store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "session store unavailable, retry later",
            )
        }
        SessionError::Encoding(msg) => {
            tracing::error!(error = %msg, "session record encoding failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "bad_request", message)
}
