use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Generate a FIELD_ENCRYPTION_KEY: 32 random bytes, hex encoded (AES-256).
pub fn generate_field_encryption_key() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    hex::encode(key)
}

/// Generate a SECRET_KEY for signing reset tokens: 48 random bytes, base64url.
pub fn generate_secret_key() -> String {
    let mut key = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut key);
    URL_SAFE_NO_PAD.encode(key)
}

// [business] Ready-to-paste .env lines
pub fn env_lines() -> String {
    format!(
        "SECRET_KEY={}\nFIELD_ENCRYPTION_KEY={}\n",
        generate_secret_key(),
        generate_field_encryption_key()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::FieldCipher;

    #[test]
    fn test_generated_keys() {
        let field_key = generate_field_encryption_key();
        assert_eq!(field_key.len(), 64);
        assert!(FieldCipher::new(&field_key).is_ok());
        assert_ne!(field_key, generate_field_encryption_key());

        let secret = generate_secret_key();
        assert_eq!(secret.len(), 64);
        assert_eq!(URL_SAFE_NO_PAD.decode(&secret).unwrap().len(), 48);
        assert_ne!(secret, generate_secret_key());

        let lines = env_lines();
        assert!(lines.starts_with("SECRET_KEY="));
        assert!(lines.contains("\nFIELD_ENCRYPTION_KEY="));
    }
}
