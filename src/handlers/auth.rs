//! Authentication and profile endpoints.
//!
//! - POST /api/v1/auth/register - Create an account (public)
//! - POST /api/v1/auth/login - Exchange credentials for a token (public)
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update name and settings
//! - PUT /api/v1/auth/password - Change password

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    error::AppError,
    handlers::extract::JsonBody,
    middleware::auth::AuthUser,
    models::user::{
        AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest, User,
        UserResponse,
    },
    security::jwt::JwtKeys,
    services::auth_service,
    state::AppState,
};

fn auth_response(keys: &JwtKeys, message: &'static str, user: User) -> Result<AuthResponse, AppError> {
    let token = keys
        .issue(user.id, &user.email, &user.name)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(AuthResponse {
        message,
        user: user.into(),
        token,
        expires_in: keys.expiry_hours() * 3600,
    })
}

/// Register a new user.
///
/// # Request Body
///
/// ```json
/// { "email": "ana@example.com", "name": "Ana", "password": "correct-horse" }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "message": "User registered successfully",
///   "user": { "id": "550e8400-...", "email": "ana@example.com", "name": "Ana", "settings": {} },
///   "token": "eyJhbGciOiJIUzI1NiJ9...",
///   "expires_in": 86400
/// }
/// ```
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = auth_service::register(&state.pool, request, state.config.bcrypt_cost).await?;
    let response = auth_response(&state.jwt, "User registered successfully", user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in.
///
/// # Errors
///
/// 401 `invalid_credentials` for an unknown email or a wrong password alike.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = auth_service::login(&state.pool, request).await?;
    Ok(Json(auth_response(&state.jwt, "Login successful", user)?))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let user = auth_service::get_user(&state.pool, auth.user_id).await?;
    Ok(Json(json!({ "user": UserResponse::from(user) })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let user = auth_service::update_profile(&state.pool, auth.user_id, request).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": UserResponse::from(user),
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    auth_service::change_password(&state.pool, auth.user_id, request, state.config.bcrypt_cost).await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}
