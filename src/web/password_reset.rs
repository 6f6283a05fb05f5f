use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Json},
    Form,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::{error, info, warn};

use super::extract::AuthUser;
use crate::{
    accounts::{AccountError, AccountService},
    config::Config,
    html::escape,
    security::generate_random_token,
};

pub const CSRF_COOKIE: &str = "csrftoken";
const RESET_PATH: &str = "/api/auth/reset_password";

// [business] Query string of the link sent by email
#[derive(Debug, Deserialize)]
pub struct ResetLinkParams {
    pub uid: Option<String>,
    pub token: Option<String>,
}

// [business] Reset form submission - uid/token travel as hidden fields
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub uid: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub csrf_token: Option<String>, // [security] Must match the csrftoken cookie
}

type PageResponse = (StatusCode, Html<String>);

/// GET /api/auth/request_reset_password - email the caller a reset link
pub async fn request_reset_handler(
    State(accounts): State<Arc<AccountService>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AccountError> {
    accounts.request_password_reset(&user).await?;

    Ok(Json(json!({ "message": "Password reset email sent" })))
}

/// GET /api/auth/reset_password - show the new-password form for a valid link
pub async fn reset_page_handler(
    State(accounts): State<Arc<AccountService>>,
    State(config): State<Config>,
    cookies: Cookies,
    Query(params): Query<ResetLinkParams>,
) -> PageResponse {
    match accounts
        .check_reset_link(params.uid.as_deref(), params.token.as_deref())
        .await
    {
        Ok(user) => {
            info!("Password reset page opened for user id {}", user.id);

            // [security] Double-submit CSRF: same value in the cookie and the form
            let csrf_token = generate_random_token();
            cookies.add(csrf_cookie(csrf_token.clone(), &config));

            let form = ResetFormData {
                uid: params.uid.as_deref().unwrap_or_default(),
                token: params.token.as_deref().unwrap_or_default(),
                csrf_token: &csrf_token,
                error: None,
            };
            (StatusCode::OK, Html(render_reset_form(&form)))
        }
        Err(e) => failure_page(e),
    }
}

/// POST /api/auth/reset_password - set the new password
pub async fn reset_submit_handler(
    State(accounts): State<Arc<AccountService>>,
    State(config): State<Config>,
    cookies: Cookies,
    Form(form): Form<ResetPasswordForm>,
) -> PageResponse {
    let cookie_token = cookies.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let Some(csrf_token) = verified_csrf(cookie_token.as_deref(), form.csrf_token.as_deref()) else {
        warn!("CSRF token mismatch on password reset form");
        return (
            StatusCode::BAD_REQUEST,
            Html(render_reset_message("Requête invalide")),
        );
    };

    let result = accounts
        .reset_password(
            form.uid.as_deref(),
            form.token.as_deref(),
            form.password.as_deref(),
            form.confirm_password.as_deref(),
        )
        .await;

    match result {
        Ok(()) => {
            let mut expired = csrf_cookie(String::new(), &config);
            expired.make_removal();
            cookies.add(expired);
            (
                StatusCode::OK,
                Html(render_reset_message("Mot de passe réinitialisé")),
            )
        }
        // [business] Fixable mistakes keep the form on screen
        Err(AccountError::Reset(failure)) if failure.is_form_error() => {
            let data = ResetFormData {
                uid: form.uid.as_deref().unwrap_or_default(),
                token: form.token.as_deref().unwrap_or_default(),
                csrf_token,
                error: Some(failure.message()),
            };
            (StatusCode::BAD_REQUEST, Html(render_reset_form(&data)))
        }
        Err(e) => failure_page(e),
    }
}

// [security] Constant-time comparison of the cookie and form tokens
fn verified_csrf<'a>(cookie: Option<&str>, submitted: Option<&'a str>) -> Option<&'a str> {
    let (cookie, submitted) = (cookie?, submitted?);
    if cookie.is_empty() {
        return None;
    }
    bool::from(cookie.as_bytes().ct_eq(submitted.as_bytes())).then_some(submitted)
}

fn csrf_cookie(value: String, config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::new(CSRF_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_path(RESET_PATH);
    cookie.set_same_site(SameSite::Strict);
    // [security] Secure flag whenever the public URL is HTTPS
    cookie.set_secure(config.server_base_url.starts_with("https://"));
    cookie
}

fn failure_page(err: AccountError) -> PageResponse {
    match err {
        AccountError::Reset(failure) => (
            StatusCode::BAD_REQUEST,
            Html(render_reset_message(failure.message())),
        ),
        other => {
            error!("Password reset failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_reset_message("Erreur interne, veuillez réessayer plus tard.")),
            )
        }
    }
}

struct ResetFormData<'a> {
    uid: &'a str,
    token: &'a str,
    csrf_token: &'a str,
    error: Option<&'a str>,
}

fn render_reset_form(data: &ResetFormData<'_>) -> String {
    let error_html = match data.error {
        Some(error) => format!(r#"<div class="error">{}</div>"#, escape(error)),
        None => String::new(),
    };

    let content = format!(
        r#"{error}
        <form method="POST" action="{action}">
            <div class="form-group">
                <label for="password">Nouveau mot de passe</label>
                <input type="password" id="password" name="password" required>
            </div>

            <div class="form-group">
                <label for="confirm_password">Confirmer le mot de passe</label>
                <input type="password" id="confirm_password" name="confirm_password" required>
            </div>

            <input type="hidden" name="uid" value="{uid}">
            <input type="hidden" name="token" value="{token}">
            <input type="hidden" name="csrf_token" value="{csrf}">

            <button type="submit">Réinitialiser</button>
        </form>"#,
        error = error_html,
        action = RESET_PATH,
        uid = escape(data.uid),
        token = escape(data.token),
        csrf = escape(data.csrf_token),
    );

    render_reset_page(&content)
}

fn render_reset_message(message: &str) -> String {
    render_reset_page(&format!(r#"<p class="message">{}</p>"#, escape(message)))
}

fn render_reset_page(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Réinitialisation du mot de passe - PlayFit</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 400px;
            margin: 100px auto;
            padding: 20px;
            background: #f5f5f5;
        }}
        .card {{
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }}
        h1 {{
            text-align: center;
            color: #2c3e50;
            font-size: 22px;
            margin-bottom: 30px;
        }}
        .form-group {{
            margin-bottom: 20px;
        }}
        label {{
            display: block;
            margin-bottom: 5px;
            font-weight: 500;
            color: #2c3e50;
        }}
        input[type="password"] {{
            width: 100%;
            padding: 12px;
            border: 1px solid #ddd;
            border-radius: 4px;
            font-size: 16px;
            box-sizing: border-box;
        }}
        button {{
            width: 100%;
            padding: 12px;
            background: #007bff;
            color: white;
            border: none;
            border-radius: 4px;
            font-size: 16px;
            cursor: pointer;
        }}
        button:hover {{
            background: #0056b3;
        }}
        .error {{
            background: #f8d7da;
            color: #721c24;
            padding: 12px;
            border-radius: 4px;
            margin-bottom: 20px;
            border: 1px solid #f5c6cb;
        }}
        .message {{
            text-align: center;
            color: #2c3e50;
            line-height: 1.5;
        }}
    </style>
</head>
<body>
    <div class="card">
        <h1>Réinitialisation du mot de passe</h1>
        {}
    </div>
</body>
</html>"#,
        content
    )
}
