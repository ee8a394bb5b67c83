//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bearer token is missing, malformed, expired, or badly signed.
    #[error("{0}")]
    Unauthorized(String),

    /// Email/password pair did not match a user.
    ///
    /// Unknown email and wrong password share this variant so the response
    /// does not reveal which accounts exist.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Requested resource does not exist or belongs to another user.
    ///
    /// The payload is the resource kind, e.g. `"bill"`.
    #[error("{} not found", capitalize(.0))]
    NotFound(&'static str),

    /// Request collides with existing state (duplicate email, already paid).
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// One or more fields failed validation.
    #[error("Validation failed")]
    Validation(Vec<String>),

    /// Request was well-formed but cannot be carried out in the current state.
    #[error("{0}")]
    UnprocessableEntity(String),

    /// Client exceeded its request budget. Carries seconds until reset.
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// Failure inside the service that is not the client's fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> String {
        match self {
            AppError::Unauthorized(_) => "unauthorized".to_string(),
            AppError::InvalidCredentials => "invalid_credentials".to_string(),
            AppError::NotFound(resource) => format!("{resource}_not_found"),
            AppError::Conflict(_) => "conflict".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::Validation(_) => "validation_failed".to_string(),
            AppError::UnprocessableEntity(_) => "unprocessable_entity".to_string(),
            AppError::RateLimited { .. } => "rate_limited".to_string(),
            AppError::Database(_) | AppError::Internal(_) => "internal_error".to_string(),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Validation errors add a `details` array. Database and internal errors
/// are logged and replaced by a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::Validation(details) = &self {
            error["details"] = json!(details);
        }

        let mut response = (status, Json(json!({ "error": error }))).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Bcrypt failures are never the client's fault.
impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {e}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_uses_resource_in_code_and_message() {
        let response = AppError::NotFound("payment_method").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "payment_method_not_found");
        assert_eq!(body["error"]["message"], "Payment method not found");
    }

    #[tokio::test]
    async fn validation_lists_details() {
        let response = AppError::Validation(vec![
            "name is required".to_string(),
            "amount_cents must be positive".to_string(),
        ])
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_failed");
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Internal("secret stack".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
