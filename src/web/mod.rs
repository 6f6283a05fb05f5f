pub mod auth;
pub mod error;
pub mod extract;
pub mod password_reset;
pub mod routes;
pub mod user;

pub use auth::*;
pub use error::JsonBody;
pub use extract::AuthUser;
pub use password_reset::*;
pub use routes::*;
pub use user::*;
