//! Account lifecycle: registration, login, profile and password changes.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::user::{
        ChangePasswordRequest, DEFAULT_CATEGORIES, LoginRequest, RegisterRequest,
        UpdateProfileRequest, User,
    },
    security::{
        password::{check_password_strength, hash_password_blocking, verify_password_blocking},
        sanitize::{Validator, escape_html, is_valid_email, sanitize_value},
    },
};

const USER_COLUMNS: &str = "id, email, name, password_hash, settings, created_at, updated_at";

/// Normalize an email for storage and lookup.
fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Create a user and seed their default categories.
///
/// # Process
///
/// 1. Validate email, name and password
/// 2. Reject duplicate email with 409
/// 3. Hash the password off the async runtime
/// 4. Insert the user and the five default categories in one transaction
pub async fn register(pool: &DbPool, request: RegisterRequest, bcrypt_cost: u32) -> Result<User, AppError> {
    let mut v = Validator::new();
    v.required("email", request.email.as_deref())
        .required("name", request.name.as_deref())
        .required("password", request.password.as_deref())
        .max_len("name", request.name.as_deref(), 100)
        .max_len("email", request.email.as_deref(), 254);
    if let Some(email) = request.email.as_deref() {
        if !email.trim().is_empty() {
            v.check("email", is_valid_email(email.trim()), "has an invalid format");
        }
    }
    v.finish()?;

    // Validator guarantees presence.
    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    let name = escape_html(request.name.as_deref().unwrap_or_default().trim());
    let password = request.password.unwrap_or_default();
    check_password_strength(&password)?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password_blocking(password, bcrypt_cost).await?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(&name)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match &e {
        // Lost a race with a concurrent registration
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("User with this email already exists".to_string())
        }
        _ => AppError::Database(e),
    })?;

    for (cat_name, color, icon) in DEFAULT_CATEGORIES {
        sqlx::query("INSERT INTO categories (user_id, name, color, icon) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(cat_name)
            .bind(color)
            .bind(icon)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Check credentials. Unknown email and wrong password are indistinguishable.
pub async fn login(pool: &DbPool, request: LoginRequest) -> Result<User, AppError> {
    let mut v = Validator::new();
    v.required("email", request.email.as_deref())
        .required("password", request.password.as_deref());
    v.finish()?;

    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    let password = request.password.unwrap_or_default();

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("user"))
}

fn clean_profile(request: UpdateProfileRequest) -> Result<UpdateProfileRequest, AppError> {
    let mut v = Validator::new();
    if let Some(name) = request.name.as_deref() {
        v.check("name", !name.trim().is_empty(), "must not be empty")
            .max_len("name", Some(name), 100);
    }
    if let Some(settings) = &request.settings {
        v.check("settings", settings.is_object(), "must be an object");
    }
    v.finish()?;

    Ok(UpdateProfileRequest {
        name: request.name.map(|n| escape_html(n.trim())),
        settings: request.settings.map(sanitize_value),
    })
}

/// Update name and/or settings. Absent fields keep their stored values.
pub async fn update_profile(
    pool: &DbPool,
    user_id: Uuid,
    request: UpdateProfileRequest,
) -> Result<User, AppError> {
    let request = clean_profile(request)?;

    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET name = COALESCE($1, name),
            settings = COALESCE($2, settings),
            updated_at = NOW()
        WHERE id = $3
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(request.name)
    .bind(request.settings)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("user"))
}

pub async fn change_password(
    pool: &DbPool,
    user_id: Uuid,
    request: ChangePasswordRequest,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    let mut v = Validator::new();
    v.required("current_password", request.current_password.as_deref())
        .required("new_password", request.new_password.as_deref());
    v.finish()?;

    let current = request.current_password.unwrap_or_default();
    let new = request.new_password.unwrap_or_default();
    check_password_strength(&new)?;

    let user = get_user(pool, user_id).await?;

    if !verify_password_blocking(current, user.password_hash).await? {
        return Err(AppError::InvalidRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password_blocking(new, bcrypt_cost).await?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user_id, "password changed");
    Ok(())
}
