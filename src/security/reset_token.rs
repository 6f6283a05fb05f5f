// [library] HMAC-SHA256 signing with constant-time verification
use hmac::{Hmac, Mac};
use sha2::Sha256;

// [library] base64url for the signature part - safe inside query strings
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use time::{Duration, OffsetDateTime};

use super::field_crypto::CryptoError;

type HmacSha256 = Hmac<Sha256>;

const KEY_SALT: &str = "playfit.security.ExpiringPasswordResetTokenGenerator";

// [business] The parts of a user's state a reset token is bound to
// Any change (new password, new login, new email) invalidates outstanding tokens
#[derive(Debug, Clone, Copy)]
pub struct ResetSubject<'a> {
    pub user_id: i64,
    pub password_hash: Option<&'a str>,
    pub last_login: Option<OffsetDateTime>,
    pub email_hash: &'a str,
}

/// Makes and checks password-reset tokens of the form `<timestamp base36>-<signature>`.
///
/// Nothing is stored server side: the signature covers the user's current
/// password hash and last login, so a token dies as soon as it is used.
#[derive(Clone)]
pub struct ResetTokenGenerator {
    mac: HmacSha256, // [security] Keyed once, cloned per signature
    timeout: Duration,
}

impl std::fmt::Debug for ResetTokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetTokenGenerator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ResetTokenGenerator {
    pub fn new(secret: &[u8], timeout: Duration) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| CryptoError::InvalidMacKey)?;
        Ok(Self { mac, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn make_signed_token(&self, subject: &ResetSubject<'_>) -> String {
        self.make_token_at(subject, OffsetDateTime::now_utc())
    }

    pub fn check_signed_token(&self, subject: &ResetSubject<'_>, token: &str) -> bool {
        self.check_token_at(subject, token, OffsetDateTime::now_utc())
    }

    pub fn make_token_at(&self, subject: &ResetSubject<'_>, now: OffsetDateTime) -> String {
        let timestamp = now.unix_timestamp();
        let signature = URL_SAFE_NO_PAD.encode(self.sign(subject, timestamp).finalize().into_bytes());
        format!("{}-{}", to_base36(timestamp), signature)
    }

    pub fn check_token_at(&self, subject: &ResetSubject<'_>, token: &str, now: OffsetDateTime) -> bool {
        // The timestamp never contains '-', the signature may
        let Some((ts_b36, signature)) = token.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(ts_b36) else {
            return false;
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };

        // [security] Constant-time comparison
        if self.sign(subject, timestamp).verify_slice(&signature).is_err() {
            return false;
        }

        let age = now.unix_timestamp() - timestamp;
        if age < 0 {
            return false;
        }
        age <= self.timeout.whole_seconds()
    }

    fn sign(&self, subject: &ResetSubject<'_>, timestamp: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        let last_login = subject
            .last_login
            .map(|t| t.unix_timestamp().to_string())
            .unwrap_or_default();

        let user_id = subject.user_id.to_string();
        let timestamp = timestamp.to_string();
        let parts: [&str; 6] = [
            KEY_SALT,
            &user_id,
            subject.password_hash.unwrap_or(""),
            &last_login,
            subject.email_hash,
            &timestamp,
        ];

        // Fields are separated so "1" + "23" never collides with "12" + "3"
        for part in parts {
            mac.update(part.as_bytes());
            mac.update(b"\x1f");
        }
        mac
    }
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(value: &str) -> Option<i64> {
    // Anything longer would overflow i64 (and is not a real timestamp)
    if value.is_empty() || value.len() > 12 {
        return None;
    }
    i64::from_str_radix(value, 36).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-01-23 12:00 UTC);

    fn generator() -> ResetTokenGenerator {
        ResetTokenGenerator::new(b"test-secret", Duration::hours(1)).unwrap()
    }

    fn subject<'a>(password_hash: Option<&'a str>) -> ResetSubject<'a> {
        ResetSubject {
            user_id: 42,
            password_hash,
            last_login: Some(datetime!(2025-01-20 08:30 UTC)),
            email_hash: "ab12",
        }
    }

    #[test]
    fn test_base36_round_trip() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        let ts = NOW.unix_timestamp();
        assert_eq!(from_base36(&to_base36(ts)), Some(ts));
        assert_eq!(from_base36(""), None);
        assert_eq!(from_base36("zzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn test_valid_token_within_timeout() {
        let subject = subject(Some("$argon2id$hash-v1"));
        let token = generator().make_token_at(&subject, NOW);

        assert!(generator().check_token_at(&subject, &token, NOW));
        assert!(generator().check_token_at(&subject, &token, NOW + Duration::minutes(59)));
        assert!(generator().check_token_at(&subject, &token, NOW + Duration::hours(1)));
    }

    #[test]
    fn test_expired_token() {
        let subject = subject(Some("$argon2id$hash-v1"));
        let token = generator().make_token_at(&subject, NOW);
        assert!(!generator().check_token_at(&subject, &token, NOW + Duration::seconds(3601)));
    }

    #[test]
    fn test_token_from_the_future() {
        let subject = subject(Some("$argon2id$hash-v1"));
        let token = generator().make_token_at(&subject, NOW + Duration::minutes(5));
        assert!(!generator().check_token_at(&subject, &token, NOW));
    }

    #[test]
    fn test_password_change_invalidates_token() {
        let before = subject(Some("$argon2id$hash-v1"));
        let token = generator().make_token_at(&before, NOW);
        let after = subject(Some("$argon2id$hash-v2"));
        assert!(!generator().check_token_at(&after, &token, NOW));
    }

    #[test]
    fn test_login_and_email_change_invalidate_token() {
        let original = subject(None);
        let token = generator().make_token_at(&original, NOW);

        let logged_in = ResetSubject {
            last_login: Some(NOW),
            ..original
        };
        assert!(!generator().check_token_at(&logged_in, &token, NOW));

        let new_email = ResetSubject {
            email_hash: "cd34",
            ..original
        };
        assert!(!generator().check_token_at(&new_email, &token, NOW));
    }

    #[test]
    fn test_token_is_bound_to_user_and_secret() {
        let subject = subject(None);
        let token = generator().make_token_at(&subject, NOW);

        let other_user = ResetSubject { user_id: 43, ..subject };
        assert!(!generator().check_token_at(&other_user, &token, NOW));

        let other_secret = ResetTokenGenerator::new(b"other-secret", Duration::hours(1)).unwrap();
        assert!(!other_secret.check_token_at(&subject, &token, NOW));
    }

    #[test]
    fn test_shared_generator_signs_consistently() {
        let generator = ResetTokenGenerator::new(b"", Duration::hours(1)).unwrap();
        let subject = subject(None);

        let first = generator.make_token_at(&subject, NOW);
        assert_eq!(generator.make_token_at(&subject, NOW), first);
        assert!(generator.check_token_at(&subject, &first, NOW));
        assert!(generator.clone().check_token_at(&subject, &first, NOW));
    }

    #[test]
    fn test_malformed_tokens() {
        let subject = subject(None);
        let token = generator().make_token_at(&subject, NOW);
        let (ts, signature) = token.split_once('-').unwrap();

        let malformed = vec![
            String::new(),
            "-".to_string(),
            "nodash".to_string(),
            format!("{}-", ts),
            format!("-{}", signature),
            format!("{}-!!!", ts),
            format!("{}-{}", to_base36(NOW.unix_timestamp() - 1), signature),
        ];
        for bad in malformed {
            assert!(!generator().check_token_at(&subject, &bad, NOW), "accepted {:?}", bad);
        }
    }
}
