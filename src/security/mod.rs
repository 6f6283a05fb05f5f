// [rust] Security module organization - cryptographic and security utilities
pub mod field_crypto; // [security] AES-256-GCM encryption of PII columns and the email blind index
pub mod password; // [security] Argon2id password hashing and password strength rules
pub mod reset_token; // [security] Expiring, state-bound password reset tokens
pub mod tokens; // [security] Random API tokens, CSRF tokens and reset-link uids

// [rust] Flat re-exports for the types every caller needs
pub use field_crypto::{CryptoError, FieldCipher};
pub use reset_token::{ResetSubject, ResetTokenGenerator};
pub use tokens::*;
