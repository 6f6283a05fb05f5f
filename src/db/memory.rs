use super::models::*;
use super::{StoreError, UniqueField, UserStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, UserRow>,
    tokens: HashMap<String, AuthToken>,
}

/// In-process [`UserStore`] with the same uniqueness rules as the SQL schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only happens if a test panicked mid-write; keep the data usable
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn check_unique(tables: &Tables, row: &UserRow) -> Result<(), StoreError> {
    for other in tables.users.values().filter(|u| u.id != row.id) {
        if other.username == row.username {
            return Err(StoreError::Conflict(UniqueField::Username));
        }
        if other.email_hash == row.email_hash {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, mut row: UserRow) -> Result<UserRow, StoreError> {
        let mut tables = self.lock();
        tables.next_id += 1;
        row.id = tables.next_id;
        check_unique(&tables, &row)?;
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_user(&self, row: &UserRow) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if !tables.users.contains_key(&row.id) {
            return Err(StoreError::NotFound(row.id));
        }
        check_unique(&tables, row)?;
        tables.users.insert(row.id, row.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRow>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email_hash(
        &self,
        email_hash: &str,
    ) -> Result<Option<UserRow>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email_hash == email_hash)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.lock().users.values().any(|u| u.username == username))
    }

    async fn set_last_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn get_or_create_token(
        &self,
        user_id: i64,
        new_key: &str,
    ) -> Result<AuthToken, StoreError> {
        let mut tables = self.lock();
        if let Some(existing) = tables.tokens.values().find(|t| t.user_id == user_id) {
            return Ok(existing.clone());
        }
        let token = AuthToken {
            key: new_key.to_string(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.tokens.insert(token.key.clone(), token.clone());
        Ok(token)
    }

    async fn find_token(&self, key: &str) -> Result<Option<AuthToken>, StoreError> {
        Ok(self.lock().tokens.get(key).cloned())
    }

    async fn delete_token_for_user(&self, user_id: i64) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let before = tables.tokens.len();
        tables.tokens.retain(|_, t| t.user_id != user_id);
        Ok(tables.tokens.len() < before)
    }
}
