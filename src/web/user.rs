use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{error::JsonBody, extract::AuthUser};
use crate::accounts::{AccountError, AccountService, DeleteRequest, Profile, UpdateRequest};

/// GET /api/auth/user
pub async fn get_user_handler(
    State(accounts): State<Arc<AccountService>>,
    AuthUser(user): AuthUser,
) -> Json<Profile> {
    Json(accounts.profile(&user))
}

/// PATCH /api/auth/user - partial profile update
pub async fn update_user_handler(
    State(accounts): State<Arc<AccountService>>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<UpdateRequest>,
) -> Result<Json<Profile>, AccountError> {
    let profile = accounts.update_profile(&user, request).await?;
    Ok(Json(profile))
}

/// DELETE /api/auth/user - anonymize the caller's account
pub async fn delete_user_handler(
    State(accounts): State<Arc<AccountService>>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<DeleteRequest>,
) -> Result<Json<Value>, AccountError> {
    accounts.anonymize(&user, request).await?;

    Ok(Json(json!({ "message": "Your data has been anonymized successfully." })))
}
