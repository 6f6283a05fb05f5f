// [rust] Module declarations - organize persistence functionality
pub mod memory; // In-process store for tests and local runs without PostgreSQL
pub mod models; // Persisted rows
pub mod queries; // PostgreSQL store

pub use memory::MemoryStore;
pub use models::*;
pub use queries::PgStore;

// [library] async-trait - object-safe async methods so handlers can hold Arc<dyn UserStore>
use async_trait::async_trait;

// [library] SQLx connection pool for PostgreSQL
use sqlx::{PgPool, Pool, Postgres};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

// [rust] Shared pool handle - cheap to clone across tasks
pub type Database = Arc<Pool<Postgres>>;

// [business] Connect to PostgreSQL and apply pending migrations
pub async fn create_pool(database_url: &str) -> Result<Database, anyhow::Error> {
    let pool = PgPool::connect(database_url).await?;

    // [library] Migrations are embedded into the binary at compile time
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Arc::new(pool))
}

// [business] Which unique constraint a write collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    Conflict(UniqueField),
    #[error("user {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence seam for users and their API tokens.
///
/// Implementations must enforce uniqueness of `username`, `email_hash` and of
/// the token per user, reporting collisions as [`StoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; `row.id` is ignored and assigned by the store.
    async fn insert_user(&self, row: UserRow) -> Result<UserRow, StoreError>;

    /// Replace every mutable column of an existing user.
    async fn update_user(&self, row: &UserRow) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRow>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError>;

    async fn find_user_by_email_hash(&self, email_hash: &str)
        -> Result<Option<UserRow>, StoreError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    async fn set_last_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError>;

    /// Return the user's token, creating it with `new_key` if none exists.
    async fn get_or_create_token(&self, user_id: i64, new_key: &str)
        -> Result<AuthToken, StoreError>;

    async fn find_token(&self, key: &str) -> Result<Option<AuthToken>, StoreError>;

    /// Delete the user's token; false when there was none.
    async fn delete_token_for_user(&self, user_id: i64) -> Result<bool, StoreError>;
}
