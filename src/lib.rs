// [rust] Module declarations - the library behind the playfit-auth binary
pub mod accounts; // Registration, login, profile and password reset operations
pub mod config; // Configuration management and environment variable handling
pub mod db; // Persisted rows, the UserStore seam, PostgreSQL and in-memory stores
pub mod html; // HTML escaping for pages and emails
pub mod keygen; // Key material for SECRET_KEY and FIELD_ENCRYPTION_KEY
pub mod mail; // Outgoing email
pub mod oauth; // Google identity lookups
pub mod security; // Password hashing, field encryption, reset tokens
pub mod testing; // Test doubles shared with tests/
pub mod web; // HTTP routing and handlers
