use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};

use super::error::AccountError;
use crate::{
    db::UserRow,
    security::{password::PasswordContext, CryptoError, FieldCipher, ResetSubject},
};

pub(crate) const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitnessLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMethod {
    #[default]
    Email,
    Google,
}

// [rust] Text form shared by the database columns and request validation
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("\"{}\" is not a valid choice.", other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Gender { Male => "male", Female => "female", Other => "other" });
text_enum!(FitnessLevel { Beginner => "beginner", Intermediate => "intermediate", Advanced => "advanced" });
text_enum!(RegistrationMethod { Email => "email", Google => "google" });

/// A user with PII decrypted. Only ever held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub email_hash: String,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Gender,
    pub physical_particularities: Option<String>,
    pub height: i32,
    pub weight: i32,
    pub fitness_level: FitnessLevel,
    pub registration_method: RegistrationMethod,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
    pub anonymized_at: Option<OffsetDateTime>,
}

impl User {
    // [security] Decrypt a stored row
    pub fn open(row: UserRow, cipher: &FieldCipher) -> Result<Self, AccountError> {
        let date_of_birth = cipher
            .decrypt_optional(row.date_of_birth.as_deref())?
            .map(|text| Date::parse(&text, DATE_FORMAT))
            .transpose()
            .map_err(|e| anyhow!("stored date_of_birth for user {} is corrupt: {}", row.id, e))?;

        let gender = match cipher.decrypt_optional(row.gender.as_deref())? {
            Some(text) => text.parse::<Gender>().map_err(|e| anyhow!(e))?,
            None => Gender::default(),
        };

        Ok(Self {
            id: row.id,
            email: cipher.decrypt_string(&row.email)?,
            email_hash: row.email_hash,
            username: row.username,
            password_hash: row.password_hash,
            first_name: cipher.decrypt_optional(row.first_name.as_deref())?,
            last_name: cipher.decrypt_optional(row.last_name.as_deref())?,
            date_of_birth,
            gender,
            physical_particularities: cipher
                .decrypt_optional(row.physical_particularities.as_deref())?,
            height: row.height,
            weight: row.weight,
            fitness_level: row
                .fitness_level
                .parse::<FitnessLevel>()
                .map_err(|e| anyhow!(e))?,
            registration_method: row
                .registration_method
                .parse::<RegistrationMethod>()
                .map_err(|e| anyhow!(e))?,
            is_active: row.is_active,
            date_joined: row.date_joined,
            last_login: row.last_login,
            anonymized_at: row.anonymized_at,
        })
    }

    // [security] Encrypt into a storable row; the email blind index is recomputed
    pub fn seal(&self, cipher: &FieldCipher) -> Result<UserRow, CryptoError> {
        let date_of_birth = self
            .date_of_birth
            .map(|d| d.format(DATE_FORMAT))
            .transpose()
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(UserRow {
            id: self.id,
            username: self.username.clone(),
            email: cipher.encrypt_string(&self.email)?,
            email_hash: cipher.blind_index(&self.email),
            password_hash: self.password_hash.clone(),
            first_name: cipher.encrypt_optional(self.first_name.as_deref())?,
            last_name: cipher.encrypt_optional(self.last_name.as_deref())?,
            date_of_birth: cipher.encrypt_optional(date_of_birth.as_deref())?,
            gender: Some(cipher.encrypt_string(self.gender.as_str())?),
            physical_particularities: cipher
                .encrypt_optional(self.physical_particularities.as_deref())?,
            height: self.height,
            weight: self.weight,
            fitness_level: self.fitness_level.as_str().to_string(),
            registration_method: self.registration_method.as_str().to_string(),
            is_active: self.is_active,
            date_joined: self.date_joined,
            last_login: self.last_login,
            anonymized_at: self.anonymized_at,
        })
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn reset_subject(&self) -> ResetSubject<'_> {
        ResetSubject {
            user_id: self.id,
            password_hash: self.password_hash.as_deref(),
            last_login: self.last_login,
            email_hash: &self.email_hash,
        }
    }

    pub fn password_context(&self) -> PasswordContext<'_> {
        PasswordContext {
            username: Some(&self.username),
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            email: Some(&self.email),
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            physical_particularities: self.physical_particularities.clone(),
            height: self.height,
            weight: self.weight,
            fitness_level: self.fitness_level,
            registration_method: self.registration_method,
            date_joined: self.date_joined,
        }
    }
}

// [business] Public view of a user - what GET/PATCH /api/auth/user return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Gender,
    pub physical_particularities: Option<String>,
    pub height: i32,
    pub weight: i32,
    pub fitness_level: FitnessLevel,
    pub registration_method: RegistrationMethod,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

#[cfg(test)]
pub(crate) fn sample_user() -> User {
    use time::macros::{date, datetime};

    User {
        id: 7,
        username: "coach_lea".to_string(),
        email: "lea@example.com".to_string(),
        email_hash: String::new(),
        password_hash: None,
        first_name: Some("Léa".to_string()),
        last_name: Some("Martin".to_string()),
        date_of_birth: Some(date!(1992 - 03 - 08)),
        gender: Gender::Female,
        physical_particularities: Some("Asthme léger".to_string()),
        height: 168,
        weight: 59,
        fitness_level: FitnessLevel::Advanced,
        registration_method: RegistrationMethod::Email,
        is_active: true,
        date_joined: datetime!(2025-01-23 12:18 UTC),
        last_login: None,
        anonymized_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::from_bytes([3u8; 32]).unwrap()
    }

    #[test]
    fn test_text_enums() {
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!(
            "expert".parse::<FitnessLevel>(),
            Err("\"expert\" is not a valid choice.".to_string())
        );
        assert_eq!(RegistrationMethod::Google.to_string(), "google");
    }

    #[test]
    fn test_seal_hides_pii_and_open_restores_it() {
        let mut user = sample_user();
        user.email_hash = cipher().blind_index(&user.email);

        let row = user.seal(&cipher()).unwrap();
        assert_ne!(row.email, user.email);
        assert_ne!(row.first_name, user.first_name);
        assert_ne!(row.last_name, user.last_name);
        assert_ne!(row.date_of_birth.as_deref(), Some("1992-03-08"));
        assert_ne!(row.gender.as_deref(), Some("female"));
        assert_ne!(row.physical_particularities, user.physical_particularities);
        assert_eq!(row.username, "coach_lea");
        assert_eq!(row.fitness_level, "advanced");

        assert_eq!(User::open(row, &cipher()).unwrap(), user);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let row = sample_user().seal(&cipher()).unwrap();
        assert!(matches!(
            User::open(row, &FieldCipher::from_bytes([4u8; 32]).unwrap()),
            Err(AccountError::Internal(_))
        ));
    }

    #[test]
    fn test_profile_json_shape() {
        let json = serde_json::to_value(sample_user().profile()).unwrap();
        assert_eq!(json["date_of_birth"], "1992-03-08");
        assert_eq!(json["gender"], "female");
        assert_eq!(json["date_joined"], "2025-01-23T12:18:00Z");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("email_hash").is_none());
    }
}
