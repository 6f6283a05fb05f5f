use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{error::JsonBody, extract::AuthUser};
use crate::accounts::{AccountError, AccountService, GoogleLoginRequest, LoginRequest, RegisterRequest};

/// POST /api/auth/register - create an account and return its API token
pub async fn register_handler(
    State(accounts): State<Arc<AccountService>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AccountError> {
    info!("Registration requested");
    let (_, token) = accounts.register(request).await?;

    Ok((StatusCode::CREATED, Json(json!({ "token": token.key }))))
}

/// POST /api/auth/login - username or email plus password
pub async fn login_handler(
    State(accounts): State<Arc<AccountService>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<Value>, AccountError> {
    let (_, token) = accounts.login(request).await?;

    Ok(Json(json!({ "token": token.key })))
}

/// POST /api/auth/logout - revoke the caller's token
pub async fn logout_handler(
    State(accounts): State<Arc<AccountService>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AccountError> {
    accounts.logout(&user).await?;

    Ok(Json(json!({ "success": "Successfully logged out" })))
}

/// POST /api/auth/google - sign in (or up) with a Google OAuth access token
pub async fn google_login_handler(
    State(accounts): State<Arc<AccountService>>,
    JsonBody(request): JsonBody<GoogleLoginRequest>,
) -> Result<Json<Value>, AccountError> {
    let login = accounts.google_login(request).await?;
    let message = if login.created {
        "Account created and logged in"
    } else {
        "Logged in using Google"
    };

    Ok(Json(json!({
        "status": "success",
        "message": message,
        "token": login.token.key,
    })))
}
