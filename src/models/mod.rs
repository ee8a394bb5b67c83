//! Data models representing database entities and API payloads.

/// Bills and their request types
pub mod bill;
/// Spending categories
pub mod category;
/// Uploaded or scanned documents
pub mod document;
/// External account connections
pub mod integration;
/// Payment methods
pub mod payment_method;
/// Analytics windows and aggregates
pub mod stats;
/// Registered users
pub mod user;
