use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::accounts::{AccountError, AccountService, User};

const NOT_PROVIDED: &str = "Authentication credentials were not provided.";

// [security] Accepted Authorization schemes - "Token" is the native one, "Bearer" for generic clients
const SCHEMES: [&str; 2] = ["Token", "Bearer"];

/// The active user behind the request's API token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AccountService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = extract_token(&parts.headers).map_err(IntoResponse::into_response)?;
        let accounts = Arc::<AccountService>::from_ref(state);

        accounts
            .authenticate_token(&key)
            .await
            .map(AuthUser)
            .map_err(IntoResponse::into_response)
    }
}

fn extract_token(headers: &HeaderMap) -> Result<String, AccountError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Err(AccountError::Unauthorized(NOT_PROVIDED));
    };
    let header = header
        .to_str()
        .map_err(|_| AccountError::Unauthorized("Invalid token header. Token string should not contain invalid characters."))?;

    let mut words = header.split_whitespace();
    let scheme = words.next().unwrap_or_default();
    if !SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Err(AccountError::Unauthorized(NOT_PROVIDED));
    }

    match (words.next(), words.next()) {
        (Some(key), None) => Ok(key.to_string()),
        (None, _) => Err(AccountError::Unauthorized(
            "Invalid token header. No credentials provided.",
        )),
        (Some(_), Some(_)) => Err(AccountError::Unauthorized(
            "Invalid token header. Token string should not contain spaces.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn detail(result: Result<String, AccountError>) -> &'static str {
        match result {
            Err(AccountError::Unauthorized(detail)) => detail,
            other => panic!("expected unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(detail(extract_token(&headers)), NOT_PROVIDED);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc123"));
        assert_eq!(extract_token(&headers).unwrap(), "abc123");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc123"));
        assert_eq!(extract_token(&headers).unwrap(), "abc123");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(detail(extract_token(&headers)), NOT_PROVIDED);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token"));
        assert!(detail(extract_token(&headers)).contains("No credentials provided"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc 123"));
        assert!(detail(extract_token(&headers)).contains("should not contain spaces"));
    }
}
