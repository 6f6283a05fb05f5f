// [library] Error handling crate - provides flexible error types for applications
use anyhow::Result;

// [library] HTTP utilities from axum web framework
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, // [business] Headers the frontend sends
    HeaderValue,
    Method,
};

use std::sync::Arc;

// [business] Library modules - everything but process wiring lives in playfit_auth
use playfit_auth::{
    accounts::AccountService,
    config::Config,
    db::{create_pool, PgStore},
    mail::{LogMailer, Mailer, SmtpMailer},
    oauth::GoogleClient,
    web::{create_app_router, AppState},
};

use secrecy::ExposeSecret;

// [library] Tower ecosystem - middleware and service abstractions for HTTP servers
use tower_http::{
    cors::CorsLayer,   // [security] Cross-Origin Resource Sharing middleware
    trace::TraceLayer, // [library] HTTP request/response logging middleware
};

// [library] Structured logging framework
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // [library] Initialize structured logging - RUST_LOG overrides the default filter
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("playfit_auth=info,tower_http=debug")),
        )
        .finish();

    // [library] Logging failure should cause immediate program termination
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting PlayFit authentication service");

    // [business] Load application configuration from environment variables
    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    // [business] Database connection establishment with automatic migrations
    info!("Connecting to database...");
    let db = create_pool(config.database_url()).await?;
    info!("Database connection established and migrations applied");

    // [business] Outgoing mail - SMTP when configured, log output otherwise
    let mailer: Arc<dyn Mailer> = match &config.smtp_host {
        Some(host) => {
            let credentials = config
                .smtp_username
                .clone()
                .zip(config.smtp_password.as_ref().map(|p| p.expose_secret().clone()));
            Arc::new(SmtpMailer::new(host, config.smtp_port, credentials)?)
        }
        None => {
            warn!("SMTP_HOST not set - password reset emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let google = GoogleClient::new(
        config.google_userinfo_url.clone(),
        config.google_people_url.clone(),
    );

    // [security] Fails fast on a malformed FIELD_ENCRYPTION_KEY
    let accounts = AccountService::from_config(
        &config,
        Arc::new(PgStore::new(db)),
        mailer,
        Arc::new(google),
    )?;

    // [business] HTTP application setup - routes, middleware, and state injection
    info!("Setting up routes...");

    // [security] Convert allowed origins from config to HeaderValue format for CORS
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let app = create_app_router(AppState::new(Arc::new(accounts), config))
        .layer(
            // [security] Token auth travels in headers, so credentials mode is not needed
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http());

    info!("Server starting on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
