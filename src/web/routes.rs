// [library] Axum web framework routing components
use axum::{
    extract::FromRef,     // [library] State extraction trait
    routing::{get, post}, // [library] HTTP method routing builders
    Router,               // [library] HTTP request router for URL pattern matching
};

// [library] Cookie middleware - backs the CSRF cookie of the reset page
use tower_cookies::CookieManagerLayer;

use std::sync::Arc;

// [business] Import application modules for dependency injection and routing
use crate::{
    accounts::AccountService, // [business] Account operations shared by every handler
    config::Config,           // [business] Application configuration
    web::{
        delete_user_handler, get_user_handler, google_login_handler, login_handler,
        logout_handler, register_handler, request_reset_handler, reset_page_handler,
        reset_submit_handler, update_user_handler,
    },
};

// [business] Application state combining the account service and configuration
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub config: Config,
}

impl AppState {
    pub fn new(accounts: Arc<AccountService>, config: Config) -> Self {
        Self { accounts, config }
    }
}

// [library] Implement FromRef to allow Axum to extract the account service from AppState
impl FromRef<AppState> for Arc<AccountService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.accounts.clone()
    }
}

// [library] Implement FromRef to allow Axum to extract Config from AppState
impl FromRef<AppState> for Config {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

// [business] Create the HTTP router with every authentication endpoint
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        // [business] Token issuance and revocation
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler)) // [security] Requires a token
        .route("/api/auth/google", post(google_login_handler))
        // [business] Profile of the authenticated user
        .route(
            "/api/auth/user",
            get(get_user_handler)
                .patch(update_user_handler)
                .delete(delete_user_handler),
        )
        // [business] Password reset: emailed link, then an HTML form served by this API
        .route("/api/auth/request_reset_password", get(request_reset_handler))
        .route(
            "/api/auth/reset_password",
            get(reset_page_handler).post(reset_submit_handler),
        )
        // [business] System health monitoring endpoint
        .route("/health", get(health_check)) // [business] Health check for load balancers
        // [library] Dependency injection - make the service and config available to all handlers
        .with_state(state)
        // [library] HTTP middleware layer for cookie management
        .layer(CookieManagerLayer::new())
}

// [business] Health check endpoint for monitoring and load balancer probes
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert_eq!(result, "OK");
    }
}
