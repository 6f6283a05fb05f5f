// [rust] Third-party identity providers
pub mod google; // [business] Google OAuth access-token lookups (profile, birth date)

pub use google::{GoogleClient, GoogleError, GoogleIdentity, GoogleProfile};
