//! Field-level encryption for personally identifiable data.
//!
//! PII columns are stored as `base64(nonce || ciphertext || tag)` using
//! AES-256-GCM with a random 96-bit nonce per value, so equal plaintexts never
//! produce equal ciphertexts. Equality lookups (login by email) go through a
//! keyed blind index instead: an HMAC-SHA256 of the normalized plaintext under
//! a key derived from the field key.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const INDEX_KEY_CONTEXT: &[u8] = b"playfit.blind-index.v1";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("Key is neither hex nor base64")]
    InvalidKeyEncoding,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("Invalid HMAC key")]
    InvalidMacKey,
}

/// Encrypts and decrypts PII fields, and computes their blind index.
///
/// Cheap to clone; share it across handlers.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
    index_mac: HmacSha256,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Create a cipher from a hex- or base64-encoded 32-byte key.
    pub fn new(key_str: &str) -> Result<Self, CryptoError> {
        let key_bytes = decode_key(key_str.trim())?;
        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: key_bytes.len(),
            });
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Self::from_bytes(key)
    }

    pub fn from_bytes(key: [u8; 32]) -> Result<Self, CryptoError> {
        let mut hasher = Sha256::new();
        hasher.update(INDEX_KEY_CONTEXT);
        hasher.update(key);
        let index_key: [u8; 32] = hasher.finalize().into();

        let index_mac =
            <HmacSha256 as Mac>::new_from_slice(&index_key).map_err(|_| CryptoError::InvalidMacKey)?;
        Ok(Self { key, index_mac })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::EncryptionFailed)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidCiphertext("Ciphertext too short".into()));
        }

        let (nonce, encrypted) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), encrypted)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(self.encrypt(plaintext.as_bytes())?))
    }

    pub fn decrypt_string(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|_| CryptoError::InvalidCiphertext("Invalid base64".into()))?;
        String::from_utf8(self.decrypt(&bytes)?)
            .map_err(|_| CryptoError::InvalidCiphertext("Invalid UTF-8".into()))
    }

    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt_string(p)).transpose()
    }

    pub fn decrypt_optional(&self, ciphertext: Option<&str>) -> Result<Option<String>, CryptoError> {
        ciphertext.map(|c| self.decrypt_string(c)).transpose()
    }

    /// Deterministic lookup hash: trimmed, lowercased, then HMAC-SHA256 (hex).
    pub fn blind_index(&self, value: &str) -> String {
        let normalized = value.trim().to_lowercase();
        let mut mac = self.index_mac.clone();
        mac.update(normalized.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn decode_key(key_str: &str) -> Result<Vec<u8>, CryptoError> {
    if key_str.len() == 64 && key_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(key_str).map_err(|_| CryptoError::InvalidKeyEncoding);
    }
    STANDARD
        .decode(key_str)
        .map_err(|_| CryptoError::InvalidKeyEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_hex_and_base64_keys_are_equivalent() {
        let from_hex = FieldCipher::new(HEX_KEY).unwrap();
        let bytes: Vec<u8> = (0u8..32).collect();
        let from_b64 = FieldCipher::new(&STANDARD.encode(&bytes)).unwrap();

        let sealed = from_hex.encrypt_string("lea@example.com").unwrap();
        assert_eq!(from_b64.decrypt_string(&sealed).unwrap(), "lea@example.com");
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        assert_eq!(
            FieldCipher::new(&STANDARD.encode([7u8; 16])).unwrap_err(),
            CryptoError::InvalidKeyLength { expected: 32, actual: 16 }
        );
        assert_eq!(FieldCipher::new("not a key!").unwrap_err(), CryptoError::InvalidKeyEncoding);
    }

    #[test]
    fn test_same_plaintext_gives_different_ciphertexts() {
        let cipher = FieldCipher::new(HEX_KEY).unwrap();
        let a = cipher.encrypt_string("1990-04-12").unwrap();
        let b = cipher.encrypt_string("1990-04-12").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("1990"));
    }

    #[test]
    fn test_tampering_is_detected() {
        let cipher = FieldCipher::new(HEX_KEY).unwrap();
        let mut sealed = cipher.encrypt(b"knee injury, left side").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(cipher.decrypt(&sealed).unwrap_err(), CryptoError::DecryptionFailed);
        assert!(matches!(cipher.decrypt(&[0u8; 10]), Err(CryptoError::InvalidCiphertext(_))));
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let cipher = FieldCipher::new(HEX_KEY).unwrap();
        let other = FieldCipher::from_bytes([9u8; 32]).unwrap();
        let sealed = cipher.encrypt_string("Martin").unwrap();
        assert_eq!(other.decrypt_string(&sealed).unwrap_err(), CryptoError::DecryptionFailed);
    }

    #[test]
    fn test_optional_fields() {
        let cipher = FieldCipher::new(HEX_KEY).unwrap();
        assert_eq!(cipher.encrypt_optional(None).unwrap(), None);
        let sealed = cipher.encrypt_optional(Some("Dupont")).unwrap();
        assert_eq!(cipher.decrypt_optional(sealed.as_deref()).unwrap().as_deref(), Some("Dupont"));
    }

    #[test]
    fn test_blind_index_normalizes_and_is_keyed() {
        let cipher = FieldCipher::new(HEX_KEY).unwrap();
        let index = cipher.blind_index("Lea@Example.com ");
        assert_eq!(index, cipher.blind_index("lea@example.com"));
        assert_eq!(index, cipher.clone().blind_index("LEA@example.com"));
        assert_eq!(index.len(), 64);
        assert_ne!(index, cipher.blind_index("leo@example.com"));
        assert_ne!(index, FieldCipher::from_bytes([9u8; 32]).unwrap().blind_index("lea@example.com"));
    }
}
