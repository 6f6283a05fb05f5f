use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, warn};

use crate::accounts::AccountError;

// [business] Map account failures to the JSON contract of the API
impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        match self {
            AccountError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AccountError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response(),
            AccountError::NotLoggedIn => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Token not found or already logged out" })),
            )
                .into_response(),
            AccountError::GoogleRefused(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": message })),
            )
                .into_response(),
            // [security] Tell clients which scheme to retry with
            AccountError::Unauthorized(detail) => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Token")],
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            AccountError::Reset(failure) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": failure.message() })),
            )
                .into_response(),
            // [security] Log the cause, never send it
            AccountError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// JSON request body where an empty body means "all fields absent".
///
/// Unlike `axum::Json` the content type is not enforced, and parse failures
/// become `400 {"error": ...}` instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(T::default()));
        }

        serde_json::from_slice(&bytes).map(JsonBody).map_err(|e| {
            warn!("Malformed JSON body: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("JSON parse error - {}", e) })),
            )
                .into_response()
        })
    }
}
