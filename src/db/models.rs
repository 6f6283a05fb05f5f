// [library] Serde - rows are serialized only for debugging dumps; API shapes live in accounts
use serde::{Deserialize, Serialize};

// [library] SQLx maps TIMESTAMPTZ columns to time::OffsetDateTime
use sqlx::types::time::OffsetDateTime;

// [business] Persisted user row - PII columns hold ciphertext, never plaintext
// Decryption happens in accounts::User::open, encryption in accounts::User::seal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64, // [business] Primary key - also encoded into reset links as uid
    pub username: String, // [business] Public handle, unique, stored in clear for login

    // [security] Encrypted email plus its keyed blind index for equality lookups
    pub email: String,
    pub email_hash: String,

    pub password_hash: Option<String>, // [security] Argon2id PHC string, None = unusable password

    // [security] Encrypted optional profile fields
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub physical_particularities: Option<String>,

    // [business] Fitness data - not identifying on its own, stored in clear
    pub height: i32,
    pub weight: i32,
    pub fitness_level: String,
    pub registration_method: String,

    pub is_active: bool, // [business] False after anonymization
    pub date_joined: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
    pub anonymized_at: Option<OffsetDateTime>,
}

// [business] API token - one per user, deleted on logout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthToken {
    pub key: String, // [security] 40 hex chars, sent as "Authorization: Token <key>"
    pub user_id: i64,
    pub created_at: OffsetDateTime,
}
