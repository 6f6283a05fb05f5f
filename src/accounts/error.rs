use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{
    db::StoreError,
    security::{password::PasswordError, CryptoError},
};

pub const REQUIRED: &str = "This field is required.";

/// Validation messages keyed by field name, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn extend(&mut self, field: &str, messages: Vec<String>) {
        self.0.entry(field.to_string()).or_default().extend(messages);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), AccountError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AccountError::Validation(self))
        }
    }
}

// [business] Why a password reset link or form was refused - rendered on the HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetFailure {
    InvalidLink,
    Expired,
    MissingData,
    PasswordMismatch,
    WeakPassword(String),
}

impl ResetFailure {
    pub fn message(&self) -> &str {
        match self {
            ResetFailure::InvalidLink => "Lien non valide",
            ResetFailure::Expired => "Le lien a expiré",
            ResetFailure::MissingData => "Données manquantes",
            ResetFailure::PasswordMismatch => "Les mots de passe ne correspondent pas",
            ResetFailure::WeakPassword(message) => message,
        }
    }

    // Form errors are shown next to the fields, link errors replace the form
    pub fn is_form_error(&self) -> bool {
        matches!(
            self,
            ResetFailure::PasswordMismatch | ResetFailure::WeakPassword(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token not found or already logged out")]
    NotLoggedIn,
    #[error("google login refused: {0}")]
    GoogleRefused(String),
    #[error("authentication required: {0}")]
    Unauthorized(&'static str),
    #[error("password reset refused: {}", .0.message())]
    Reset(ResetFailure),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        AccountError::Internal(err.into())
    }
}

impl From<CryptoError> for AccountError {
    fn from(err: CryptoError) -> Self {
        AccountError::Internal(err.into())
    }
}

impl From<PasswordError> for AccountError {
    fn from(err: PasswordError) -> Self {
        AccountError::Internal(err.into())
    }
}
