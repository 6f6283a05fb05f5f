// [library] base64url without padding - uids and CSRF tokens travel in URLs and cookies
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;

// [business] Encode a user id for reset links: base64url of the decimal id
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

// [business] Reverse of encode_uid - None for anything that is not an encoded id
pub fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

// [security] API token key: 20 random bytes as 40 lowercase hex characters
pub fn generate_auth_token_key() -> String {
    let random_bytes: [u8; 20] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}

// [security] 256-bit random value, base64url encoded - used for CSRF tokens
pub fn generate_random_token() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
