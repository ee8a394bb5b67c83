//! Payment method endpoints under `/api/v1/payment-methods`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::extract::JsonBody,
    middleware::auth::AuthUser,
    models::{
        payment_method::PaymentMethodRequest,
        stats::{StatsQuery, TimeRange},
    },
    services::{bill_service, payment_method_service},
};

/// Default method first, then by name.
pub async fn list_payment_methods(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let methods = payment_method_service::list(&pool, auth.user_id).await?;
    Ok(Json(json!({ "payment_methods": methods })))
}

/// Create a payment method.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Visa ending 4567",
///   "type": "credit",
///   "details": { "last4": "4567", "expiry": "05/27" },
///   "is_default": true
/// }
/// ```
///
/// Setting `is_default` clears the flag on every other method.
pub async fn create_payment_method(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<PaymentMethodRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let method = payment_method_service::create(&pool, auth.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Payment method created successfully", "payment_method": method })),
    ))
}

pub async fn update_payment_method(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(method_id): Path<Uuid>,
    JsonBody(request): JsonBody<PaymentMethodRequest>,
) -> Result<Json<Value>, AppError> {
    let method = payment_method_service::update(&pool, auth.user_id, method_id, request).await?;
    Ok(Json(json!({ "message": "Payment method updated successfully", "payment_method": method })))
}

pub async fn delete_payment_method(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(method_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    payment_method_service::delete(&pool, auth.user_id, method_id).await?;
    Ok(Json(json!({ "message": "Payment method deleted successfully" })))
}

pub async fn payment_method_statistics(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let start = TimeRange::parse(query.time_range.as_deref()).start_date(bill_service::today());
    let (methods, total_amount) = payment_method_service::statistics(&pool, auth.user_id, start).await?;
    Ok(Json(json!({ "payment_methods": methods, "total_amount": total_amount })))
}
