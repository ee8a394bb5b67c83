//! HTTP request handlers.
//!
//! Handlers stay thin: extract the caller and the request, call a service,
//! wrap the result in the JSON shape the client expects.

/// Registration, login and profile endpoints
pub mod auth;
/// Bill endpoints
pub mod bills;
/// Category endpoints
pub mod categories;
/// Document and OCR endpoints
pub mod documents;
/// JSON body extractor with enveloped rejections
pub mod extract;
/// Health check endpoint
pub mod health;
/// Integration endpoints
pub mod integrations;
/// Payment method endpoints
pub mod payment_methods;
