// [library] Argon2 - memory-hard password hashing (Argon2id variant)
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

// [library] Structured error types with automatic Display and Error trait derivation
use thiserror::Error;

use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashError(argon2::password_hash::Error),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PasswordError::HashError(err)
    }
}

// [security] Hash password using Argon2id with a fresh salt - result is a PHC string
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();

    Ok(password_hash)
}

// [security] Verify password against stored Argon2id hash using constant-time comparison
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::HashError(e)),
    }
}

// [security] Check a password against an optional stored hash
// Accounts without a usable password (Google sign-up, anonymized) never match
pub fn check_password(password: &str, hash: Option<&str>) -> Result<bool, PasswordError> {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => Ok(false),
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

// [business] User attributes a password must not resemble
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordContext<'a> {
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: Option<&'a str>,
}

// [security] Run the password strength rules, collecting every failure message
// Order: similarity, length, common list, numeric
pub fn validate_password(password: &str, context: &PasswordContext<'_>) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(attribute) = similar_attribute(password, context) {
        errors.push(format!("The password is too similar to the {}.", attribute));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if is_common_password(password) {
        errors.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn similar_attribute(password: &str, context: &PasswordContext<'_>) -> Option<&'static str> {
    let password = password.to_lowercase();
    if password.is_empty() {
        return None;
    }

    let email_local = context.email.map(|e| e.split('@').next().unwrap_or(e));
    let candidates = [
        ("username", context.username),
        ("first name", context.first_name),
        ("last name", context.last_name),
        ("email address", email_local),
    ];

    candidates.into_iter().find_map(|(label, value)| {
        let value = value?.trim().to_lowercase();
        if value.chars().count() < 3 {
            return None;
        }
        (password.contains(&value) || value.contains(&password)).then_some(label)
    })
}

// [security] Frequently leaked passwords, embedded at compile time
const COMMON_PASSWORD_LIST: &str = include_str!("common_passwords.txt");

fn common_passwords() -> &'static HashSet<&'static str> {
    static COMMON: OnceLock<HashSet<&'static str>> = OnceLock::new();
    COMMON.get_or_init(|| {
        COMMON_PASSWORD_LIST
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect()
    })
}

// Listed passwords, case-insensitive, including a listed word with only digits appended
pub fn is_common_password(password: &str) -> bool {
    let lowered = password.trim().to_lowercase();
    let common = common_passwords();
    if common.contains(lowered.as_str()) {
        return true;
    }

    let base = lowered.trim_end_matches(|c: char| c.is_ascii_digit());
    base.chars().count() >= 4 && base.len() < lowered.len() && common.contains(base)
}
