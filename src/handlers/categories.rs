//! Category endpoints under `/api/v1/categories`.

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
        category::CategoryRequest,
        stats::{StatsQuery, TimeRange},
    },
    services::{bill_service, category_service},
};

pub async fn list_categories(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let categories = category_service::list(&pool, auth.user_id).await?;
    Ok(Json(json!({ "categories": categories })))
}

/// Create a category. `color` defaults to `#6B7280`, `icon` to `folder`.
pub async fn create_category(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<CategoryRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let category = category_service::create(&pool, auth.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Category created successfully", "category": category })),
    ))
}

pub async fn update_category(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(category_id): Path<Uuid>,
    JsonBody(request): JsonBody<CategoryRequest>,
) -> Result<Json<Value>, AppError> {
    let category = category_service::update(&pool, auth.user_id, category_id, request).await?;
    Ok(Json(json!({ "message": "Category updated successfully", "category": category })))
}

/// Delete a category. Its bills move to "Other", or become uncategorized.
pub async fn delete_category(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    category_service::delete(&pool, auth.user_id, category_id).await?;
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

/// Per-category spending.
///
/// # Response (200)
///
/// ```json
/// {
///   "categories": [
///     { "id": "...", "name": "Utilities", "total": 14549, "bill_count": 2, "paid": 5999, "unpaid": 8550, "percentage": 64 }
///   ],
///   "total_amount": 22648
/// }
/// ```
pub async fn category_statistics(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let start = TimeRange::parse(query.time_range.as_deref()).start_date(bill_service::today());
    let (categories, total_amount) = category_service::statistics(&pool, auth.user_id, start).await?;
    Ok(Json(json!({ "categories": categories, "total_amount": total_amount })))
}
