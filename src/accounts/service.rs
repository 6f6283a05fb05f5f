use anyhow::anyhow;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::error::{AccountError, FieldErrors, ResetFailure, REQUIRED};
use super::user::{FitnessLevel, Gender, Profile, RegistrationMethod, User};
use super::username::generate_username_with_number;
use super::validation::{self, HEIGHT_RANGE, WEIGHT_RANGE};
use crate::{
    config::Config,
    db::{AuthToken, StoreError, UniqueField, UserStore},
    mail::{reset_password_email, Mailer, OutgoingEmail},
    oauth::{GoogleError, GoogleIdentity},
    security::{
        decode_uid, encode_uid, generate_auth_token_key,
        password::{check_password, hash_password, validate_password, PasswordContext},
        CryptoError, FieldCipher, ResetTokenGenerator,
    },
};

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with this email already exists.";
const NO_BIRTH_DATE: &str = "Aucune date de naissance renseignée, impossible de vérifier votre âge";

// [business] Placeholder measures for Google sign-ups until the user fills in the profile
const GOOGLE_DEFAULT_MEASURE: i32 = 250;

// [library] Distinguish an absent field from an explicit null in PATCH bodies
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// [library] Keep an explicit null as `Value::Null` so it is reported, not treated as absent
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub fitness_level: Option<String>,
    pub physical_particularities: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub weight: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// [business] Body of POST /api/auth/google - the Google OAuth access token
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GoogleLoginRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub fitness_level: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub physical_particularities: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub weight: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DeleteRequest {
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct GoogleLogin {
    pub user: User,
    pub token: AuthToken,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub server_base_url: String,
    pub mail_from: String,
    pub min_user_age: u8,
}

impl AccountSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_base_url: config.server_base_url.clone(),
            mail_from: config.mail_from.clone(),
            min_user_age: config.min_user_age,
        }
    }
}

/// Account operations, independent of HTTP.
///
/// Every PII field goes through `cipher` on its way in and out of the store;
/// handlers only ever see decrypted [`User`] values.
pub struct AccountService {
    store: Arc<dyn UserStore>,
    cipher: FieldCipher,
    reset_tokens: ResetTokenGenerator,
    mailer: Arc<dyn Mailer>,
    google: Arc<dyn GoogleIdentity>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        cipher: FieldCipher,
        reset_tokens: ResetTokenGenerator,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn GoogleIdentity>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            store,
            cipher,
            reset_tokens,
            mailer,
            google,
            settings,
        }
    }

    // [business] Wire the service from configuration - fails on a malformed encryption key
    pub fn from_config(
        config: &Config,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn GoogleIdentity>,
    ) -> Result<Self, CryptoError> {
        let cipher = FieldCipher::new(config.field_encryption_key())?;
        let reset_tokens =
            ResetTokenGenerator::new(config.secret_key(), config.password_reset_timeout())?;

        Ok(Self::new(
            store,
            cipher,
            reset_tokens,
            mailer,
            google,
            AccountSettings::from_config(config),
        ))
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    // ------------------------------------------------------------------
    // Registration and login
    // ------------------------------------------------------------------

    pub async fn register(&self, request: RegisterRequest) -> Result<(User, AuthToken), AccountError> {
        let mut errors = FieldErrors::new();

        let username = require(&mut errors, "username", request.username);
        if let Some(username) = &username {
            validation::check_username(username, &mut errors);
            if errors.get("username").is_none() && self.store.username_exists(username).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }

        let email = require(&mut errors, "email", request.email).map(|e| e.trim().to_string());
        let mut email_hash = None;
        if let Some(email) = &email {
            validation::check_email(email, &mut errors);
            if errors.get("email").is_none() {
                let hash = self.cipher.blind_index(email);
                if self.store.find_user_by_email_hash(&hash).await?.is_some() {
                    errors.add("email", EMAIL_TAKEN);
                }
                email_hash = Some(hash);
            }
        }

        for (field, value) in [("first_name", &request.first_name), ("last_name", &request.last_name)] {
            if let Some(value) = value {
                validation::check_name(field, value, &mut errors);
            }
        }

        let date_of_birth = require(&mut errors, "date_of_birth", request.date_of_birth).and_then(|raw| {
            validation::parse_date_of_birth(
                &raw,
                self.settings.min_user_age,
                validation::today(),
                &mut errors,
            )
        });

        let height = require(&mut errors, "height", request.height)
            .and_then(|raw| validation::parse_measure("height", &raw, HEIGHT_RANGE, &mut errors));
        let weight = require(&mut errors, "weight", request.weight)
            .and_then(|raw| validation::parse_measure("weight", &raw, WEIGHT_RANGE, &mut errors));

        let gender = match &request.gender {
            Some(raw) => validation::parse_choice::<Gender>("gender", raw, &mut errors),
            None => Some(Gender::default()),
        };
        let fitness_level = match &request.fitness_level {
            Some(raw) => validation::parse_choice::<FitnessLevel>("fitness_level", raw, &mut errors),
            None => Some(FitnessLevel::default()),
        };

        let password = require(&mut errors, "password", request.password);
        if let Some(password) = &password {
            let context = PasswordContext {
                username: username.as_deref(),
                first_name: request.first_name.as_deref(),
                last_name: request.last_name.as_deref(),
                email: email.as_deref(),
            };
            if let Err(messages) = validate_password(password, &context) {
                errors.extend("password", messages);
            }
        }

        errors.into_result()?;

        // [rust] Every required value is present once the error map is empty
        let (
            Some(username),
            Some(email),
            Some(email_hash),
            Some(password),
            Some(date_of_birth),
            Some(height),
            Some(weight),
            Some(gender),
            Some(fitness_level),
        ) = (
            username,
            email,
            email_hash,
            password,
            date_of_birth,
            height,
            weight,
            gender,
            fitness_level,
        )
        else {
            return Err(anyhow!("registration passed validation with missing fields").into());
        };

        let user = User {
            id: 0,
            username,
            email,
            email_hash,
            password_hash: Some(hash_password(&password)?),
            first_name: request.first_name,
            last_name: request.last_name,
            date_of_birth: Some(date_of_birth),
            gender,
            physical_particularities: request.physical_particularities,
            height,
            weight,
            fitness_level,
            registration_method: RegistrationMethod::Email,
            is_active: true,
            date_joined: OffsetDateTime::now_utc(),
            last_login: None,
            anonymized_at: None,
        };

        let user = self.insert(user).await?;
        let token = self.issue_token(user.id).await?;

        info!("User registered: {} (id {})", user.username, user.id);
        Ok((user, token))
    }

    // [business] Username first, then the email blind index as a fallback
    pub async fn login(&self, request: LoginRequest) -> Result<(User, AuthToken), AccountError> {
        let password = request.password.unwrap_or_default();

        let mut user = match request.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => self.authenticate(username, &password).await?,
            None => None,
        };

        if user.is_none() {
            if let Some(email) = request.email.as_deref().filter(|e| !e.trim().is_empty()) {
                let hash = self.cipher.blind_index(email);
                if let Some(row) = self.store.find_user_by_email_hash(&hash).await? {
                    user = self.authenticate(&row.username, &password).await?;
                }
            }
        }

        let Some(mut user) = user else {
            warn!("Login failed");
            return Err(AccountError::InvalidCredentials);
        };

        self.touch_last_login(&mut user).await?;
        let token = self.issue_token(user.id).await?;

        info!("User logged in: {} (id {})", user.username, user.id);
        Ok((user, token))
    }

    pub async fn logout(&self, user: &User) -> Result<(), AccountError> {
        if !self.store.delete_token_for_user(user.id).await? {
            return Err(AccountError::NotLoggedIn);
        }

        info!("User logged out: id {}", user.id);
        Ok(())
    }

    pub async fn google_login(&self, request: GoogleLoginRequest) -> Result<GoogleLogin, AccountError> {
        let Some(access_token) = request.token.filter(|t| !t.trim().is_empty()) else {
            return Err(AccountError::GoogleRefused("No token provided".to_string()));
        };

        let profile = match self.google.user_profile(&access_token).await {
            Ok(profile) => profile,
            Err(GoogleError::Rejected(status)) => {
                warn!("Google rejected access token (status {})", status);
                return Err(AccountError::GoogleRefused("Invalid token".to_string()));
            }
            Err(e) => return Err(anyhow!(e).into()),
        };

        let Some(email) = profile.email.filter(|e| !e.trim().is_empty()) else {
            return Err(AccountError::GoogleRefused("Invalid token".to_string()));
        };
        let email = email.trim().to_string();
        let email_hash = self.cipher.blind_index(&email);

        if let Some(row) = self.store.find_user_by_email_hash(&email_hash).await? {
            let mut user = User::open(row, &self.cipher)?;
            if !user.is_active {
                return Err(AccountError::GoogleRefused("Account is disabled".to_string()));
            }

            self.touch_last_login(&mut user).await?;
            let token = self.issue_token(user.id).await?;
            info!("User logged in with Google: {} (id {})", user.username, user.id);
            return Ok(GoogleLogin {
                user,
                token,
                created: false,
            });
        }

        let Some(date_of_birth) = self.google.birth_date(&access_token).await else {
            return Err(AccountError::GoogleRefused(NO_BIRTH_DATE.to_string()));
        };
        let min_age = self.settings.min_user_age;
        if validation::age_on(date_of_birth, validation::today()) < i32::from(min_age) {
            return Err(AccountError::GoogleRefused(format!(
                "You must be at least {} years old.",
                min_age
            )));
        }

        let base = profile
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let username = generate_username_with_number(self.store.as_ref(), &base).await?;

        let user = User {
            id: 0,
            username,
            email,
            email_hash,
            password_hash: None,
            first_name: profile.given_name,
            last_name: profile.family_name,
            date_of_birth: Some(date_of_birth),
            gender: Gender::default(),
            physical_particularities: None,
            height: GOOGLE_DEFAULT_MEASURE,
            weight: GOOGLE_DEFAULT_MEASURE,
            fitness_level: FitnessLevel::default(),
            registration_method: RegistrationMethod::Google,
            is_active: true,
            date_joined: OffsetDateTime::now_utc(),
            last_login: None,
            anonymized_at: None,
        };

        let mut user = self.insert(user).await?;
        self.touch_last_login(&mut user).await?;
        let token = self.issue_token(user.id).await?;

        info!("User created with Google: {} (id {})", user.username, user.id);
        Ok(GoogleLogin {
            user,
            token,
            created: true,
        })
    }

    // [security] Resolve an API token to its active user
    pub async fn authenticate_token(&self, key: &str) -> Result<User, AccountError> {
        let token = self
            .store
            .find_token(key)
            .await?
            .ok_or(AccountError::Unauthorized("Invalid token."))?;
        let row = self
            .store
            .find_user_by_id(token.user_id)
            .await?
            .ok_or(AccountError::Unauthorized("Invalid token."))?;

        let user = User::open(row, &self.cipher)?;
        if !user.is_active {
            return Err(AccountError::Unauthorized("User inactive or deleted."));
        }
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    pub fn profile(&self, user: &User) -> Profile {
        user.profile()
    }

    pub async fn update_profile(&self, user: &User, request: UpdateRequest) -> Result<Profile, AccountError> {
        let mut errors = FieldErrors::new();
        let mut updated = user.clone();

        if let Some(username) = request.username {
            validation::check_username(&username, &mut errors);
            if errors.get("username").is_none()
                && username != user.username
                && self.store.username_exists(&username).await?
            {
                errors.add("username", USERNAME_TAKEN);
            }
            updated.username = username;
        }

        if let Some(email) = request.email {
            let email = email.trim().to_string();
            validation::check_email(&email, &mut errors);
            if errors.get("email").is_none() {
                let hash = self.cipher.blind_index(&email);
                if hash != user.email_hash
                    && self.store.find_user_by_email_hash(&hash).await?.is_some()
                {
                    errors.add("email", EMAIL_TAKEN);
                }
                updated.email_hash = hash;
            }
            updated.email = email;
        }

        if let Some(first_name) = request.first_name {
            if let Some(value) = &first_name {
                validation::check_name("first_name", value, &mut errors);
            }
            updated.first_name = first_name;
        }
        if let Some(last_name) = request.last_name {
            if let Some(value) = &last_name {
                validation::check_name("last_name", value, &mut errors);
            }
            updated.last_name = last_name;
        }
        if let Some(particularities) = request.physical_particularities {
            updated.physical_particularities = particularities;
        }

        if let Some(raw) = request.date_of_birth {
            let today = validation::today();
            if let Some(date) =
                validation::parse_date_of_birth(&raw, self.settings.min_user_age, today, &mut errors)
            {
                updated.date_of_birth = Some(date);
            }
        }
        if let Some(raw) = request.gender {
            if let Some(gender) = validation::parse_choice::<Gender>("gender", &raw, &mut errors) {
                updated.gender = gender;
            }
        }
        if let Some(raw) = request.fitness_level {
            if let Some(level) = validation::parse_choice::<FitnessLevel>("fitness_level", &raw, &mut errors) {
                updated.fitness_level = level;
            }
        }
        if let Some(raw) = request.height {
            if let Some(height) = validation::parse_measure("height", &raw, HEIGHT_RANGE, &mut errors) {
                updated.height = height;
            }
        }
        if let Some(raw) = request.weight {
            if let Some(weight) = validation::parse_measure("weight", &raw, WEIGHT_RANGE, &mut errors) {
                updated.weight = weight;
            }
        }

        errors.into_result()?;

        self.save(&updated).await?;
        info!("User profile updated: id {}", updated.id);
        Ok(updated.profile())
    }

    // [business] Right to erasure - the row stays for referential integrity, the PII goes
    pub async fn anonymize(&self, user: &User, request: DeleteRequest) -> Result<(), AccountError> {
        if user.has_usable_password() {
            let Some(password) = request.password else {
                return Err(AccountError::Validation(FieldErrors::single("password", REQUIRED)));
            };
            if !check_password(&password, user.password_hash.as_deref())? {
                return Err(AccountError::Validation(FieldErrors::single(
                    "password",
                    "Incorrect password.",
                )));
            }
        }

        let placeholder = uuid::Uuid::new_v4().simple().to_string();
        let mut anonymized = user.clone();
        anonymized.username = format!("deleted_{}", placeholder);
        anonymized.email = format!("{}@anonymized.invalid", placeholder);
        anonymized.email_hash = self.cipher.blind_index(&anonymized.email);
        anonymized.password_hash = None;
        anonymized.first_name = None;
        anonymized.last_name = None;
        anonymized.date_of_birth = None;
        anonymized.gender = Gender::default();
        anonymized.physical_particularities = None;
        anonymized.is_active = false;
        anonymized.anonymized_at = Some(OffsetDateTime::now_utc());

        self.save(&anonymized).await?;
        self.store.delete_token_for_user(user.id).await?;

        info!("User anonymized: id {}", user.id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Password reset
    // ------------------------------------------------------------------

    pub fn reset_link_for(&self, user: &User) -> String {
        let token = self.reset_tokens.make_signed_token(&user.reset_subject());
        format!(
            "{}/api/auth/reset_password?uid={}&token={}",
            self.settings.server_base_url.trim_end_matches('/'),
            urlencoding::encode(&encode_uid(user.id)),
            urlencoding::encode(&token)
        )
    }

    pub async fn request_password_reset(&self, user: &User) -> Result<(), AccountError> {
        if user.anonymized_at.is_some() {
            return Err(AccountError::Unauthorized("User inactive or deleted."));
        }

        let link = self.reset_link_for(user);
        let rendered = reset_password_email(user.first_name.as_deref(), &user.username, &link);

        self.mailer
            .send(OutgoingEmail {
                from: self.settings.mail_from.clone(),
                to: user.email.clone(),
                subject: rendered.subject,
                text_body: rendered.text_body,
                html_body: rendered.html_body,
            })
            .await?;

        info!("Password reset email sent to user id {}", user.id);
        Ok(())
    }

    // [business] Validate a reset link before showing the form
    pub async fn check_reset_link(&self, uid: Option<&str>, token: Option<&str>) -> Result<User, AccountError> {
        let (Some(uid), Some(token)) = (non_blank(uid), non_blank(token)) else {
            return Err(AccountError::Reset(ResetFailure::InvalidLink));
        };
        let Some(user) = self.user_for_uid(uid).await? else {
            return Err(AccountError::Reset(ResetFailure::InvalidLink));
        };

        if !self.reset_tokens.check_signed_token(&user.reset_subject(), token) {
            return Err(AccountError::Reset(ResetFailure::Expired));
        }
        Ok(user)
    }

    pub async fn reset_password(
        &self,
        uid: Option<&str>,
        token: Option<&str>,
        password: Option<&str>,
        confirm_password: Option<&str>,
    ) -> Result<(), AccountError> {
        let (Some(uid), Some(token), Some(password)) =
            (non_blank(uid), non_blank(token), non_blank(password))
        else {
            return Err(AccountError::Reset(ResetFailure::MissingData));
        };
        let Some(mut user) = self.user_for_uid(uid).await? else {
            return Err(AccountError::Reset(ResetFailure::MissingData));
        };

        if !self.reset_tokens.check_signed_token(&user.reset_subject(), token) {
            return Err(AccountError::Reset(ResetFailure::Expired));
        }
        if Some(password) != confirm_password {
            return Err(AccountError::Reset(ResetFailure::PasswordMismatch));
        }
        if let Err(messages) = validate_password(password, &user.password_context()) {
            let first = messages.into_iter().next().unwrap_or_default();
            return Err(AccountError::Reset(ResetFailure::WeakPassword(first)));
        }

        // [security] Changing the hash invalidates the token just used
        user.password_hash = Some(hash_password(password)?);
        self.save(&user).await?;

        info!("Password reset for user id {}", user.id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, AccountError> {
        let Some(row) = self.store.find_user_by_username(username).await? else {
            return Ok(None);
        };
        let user = User::open(row, &self.cipher)?;
        if !user.is_active {
            return Ok(None);
        }

        if check_password(password, user.password_hash.as_deref())? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn user_for_uid(&self, uid: &str) -> Result<Option<User>, AccountError> {
        let Some(id) = decode_uid(uid) else {
            return Ok(None);
        };
        match self.store.find_user_by_id(id).await? {
            Some(row) => Ok(Some(User::open(row, &self.cipher)?)),
            None => Ok(None),
        }
    }

    async fn touch_last_login(&self, user: &mut User) -> Result<(), AccountError> {
        let now = OffsetDateTime::now_utc();
        self.store.set_last_login(user.id, now).await?;
        user.last_login = Some(now);
        Ok(())
    }

    async fn issue_token(&self, user_id: i64) -> Result<AuthToken, AccountError> {
        Ok(self
            .store
            .get_or_create_token(user_id, &generate_auth_token_key())
            .await?)
    }

    async fn insert(&self, mut user: User) -> Result<User, AccountError> {
        let row = user.seal(&self.cipher)?;
        let stored = self.store.insert_user(row).await.map_err(conflict_to_field_error)?;
        user.id = stored.id;
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), AccountError> {
        let row = user.seal(&self.cipher)?;
        self.store.update_user(&row).await.map_err(conflict_to_field_error)
    }
}

// [business] A unique-constraint race lost to a concurrent writer reads like the pre-check
fn conflict_to_field_error(err: StoreError) -> AccountError {
    match err {
        StoreError::Conflict(UniqueField::Username) => {
            AccountError::Validation(FieldErrors::single("username", USERNAME_TAKEN))
        }
        StoreError::Conflict(UniqueField::Email) => {
            AccountError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
        }
        other => other.into(),
    }
}

fn require<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
