//! Security primitives shared by middleware and services.
//!
//! Nothing in here touches the database or HTTP types, so every piece can be
//! unit tested on its own.

/// HS256 token issuance and verification
pub mod jwt;
/// Bcrypt password hashing
pub mod password;
/// Fixed-window request counter keyed by client
pub mod rate_limit;
/// XSS escaping and field validation
pub mod sanitize;
/// HMAC-signed envelopes and random tokens
pub mod signing;
