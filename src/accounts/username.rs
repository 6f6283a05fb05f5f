use crate::db::{StoreError, UserStore};

use super::validation::{is_username_char, USERNAME_MAX_LENGTH};

const FALLBACK_BASE: &str = "user";

// [business] Room left for the numeric suffix
const BASE_MAX_LENGTH: usize = USERNAME_MAX_LENGTH - 10;

// [business] Reduce a display name or email local part to a valid username stem
pub fn sanitize_username_base(raw: &str) -> String {
    let base: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| is_username_char(*c))
        .take(BASE_MAX_LENGTH)
        .collect();

    if base.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        base
    }
}

// [business] First free "<base><n>" for n = 1, 2, ...
pub async fn generate_username_with_number(
    store: &dyn UserStore,
    raw: &str,
) -> Result<String, StoreError> {
    let base = sanitize_username_base(raw);
    let mut number: u64 = 1;
    loop {
        let candidate = format!("{}{}", base, number);
        if !store.username_exists(&candidate).await? {
            return Ok(candidate);
        }
        number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, UserRow};
    use time::OffsetDateTime;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_username_base("Léa Martin"), "LéaMartin");
        assert_eq!(sanitize_username_base("jo/hn!"), "john");
        assert_eq!(sanitize_username_base("  "), "user");
        assert_eq!(sanitize_username_base(&"x".repeat(300)).len(), BASE_MAX_LENGTH);
    }

    #[tokio::test]
    async fn test_generate_skips_taken_names() {
        let store = MemoryStore::new();
        assert_eq!(generate_username_with_number(&store, "Lea").await.unwrap(), "Lea1");

        for (i, name) in ["Lea1", "Lea2"].iter().enumerate() {
            let row = UserRow {
                id: 0,
                username: name.to_string(),
                email: String::new(),
                email_hash: format!("hash{}", i),
                password_hash: None,
                first_name: None,
                last_name: None,
                date_of_birth: None,
                gender: None,
                physical_particularities: None,
                height: 250,
                weight: 250,
                fitness_level: "beginner".to_string(),
                registration_method: "google".to_string(),
                is_active: true,
                date_joined: OffsetDateTime::now_utc(),
                last_login: None,
                anonymized_at: None,
            };
            store.insert_user(row).await.unwrap();
        }

        assert_eq!(generate_username_with_number(&store, "Lea").await.unwrap(), "Lea3");
    }
}
