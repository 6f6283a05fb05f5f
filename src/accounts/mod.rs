// [rust] Account operations and the user domain model
pub mod error; // [business] Field errors and the account error type
pub mod service; // [business] Register, login, profile, anonymization, password reset
pub mod user; // [security] Decrypted user model and its seal/open conversions
pub mod username; // [business] Unique username generation for Google sign-ups
pub mod validation; // [business] Per-field input rules

pub use error::{AccountError, FieldErrors, ResetFailure};
pub use service::{
    AccountService, AccountSettings, DeleteRequest, GoogleLogin, GoogleLoginRequest,
    LoginRequest, RegisterRequest, UpdateRequest,
};
pub use user::{FitnessLevel, Gender, Profile, RegistrationMethod, User};
