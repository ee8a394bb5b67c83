//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Throttle clients
//! - Harden responses
//! - Short-circuit requests (reject unauthorized)

/// JWT authentication middleware
pub mod auth;
/// Fixed-window rate limiting per client IP
pub mod rate_limit;
/// Security headers and CORS
pub mod security_headers;
