//! Bill HTTP handlers.
//!
//! This module implements the bill endpoints:
//! - GET /api/v1/bills - List with filters and sorting
//! - GET /api/v1/bills/upcoming - Unpaid bills due soon (calendar view)
//! - GET /api/v1/bills/statistics - Spending totals
//! - GET /api/v1/bills/{id} - One bill with its documents
//! - POST /api/v1/bills - Create
//! - PUT /api/v1/bills/{id} - Replace
//! - DELETE /api/v1/bills/{id} - Delete
//! - POST /api/v1/bills/{id}/pay - Mark paid, rolling recurring bills forward

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
        bill::{BillListQuery, BillRequest, PayBillRequest, UpcomingQuery},
        stats::{BillStatistics, StatsQuery, TimeRange},
    },
    services::bill_service,
};

/// List bills.
///
/// # Endpoint
///
/// `GET /api/v1/bills?status=unpaid&category=<uuid>&sort_by=amount&sort_order=desc`
///
/// # Response (200)
///
/// ```json
/// {
///   "bills": [
///     {
///       "id": "550e8400-...",
///       "name": "Electricity",
///       "amount_cents": 8550,
///       "due_date": "2025-04-15",
///       "status": "unpaid",
///       "recurrence": "monthly",
///       "category_name": "Utilities",
///       "category_color": "#3B82F6",
///       "payment_method_name": "Visa"
///     }
///   ]
/// }
/// ```
pub async fn list_bills(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<BillListQuery>,
) -> Result<Json<Value>, AppError> {
    let bills = bill_service::list_bills(&pool, auth.user_id, query).await?;
    Ok(Json(json!({ "bills": bills })))
}

/// Get one bill and the documents attached to it.
///
/// # Response (200)
///
/// ```json
/// { "bill": { "id": "550e8400-...", "name": "Electricity" }, "documents": [] }
/// ```
pub async fn get_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (bill, documents) = bill_service::get_bill_with_documents(&pool, auth.user_id, bill_id).await?;
    Ok(Json(json!({ "bill": bill, "documents": documents })))
}

/// Create a bill.
///
/// # Validation
///
/// - `name`, `amount_cents` (> 0), `due_date` and `status` are required
/// - `category_id` and `payment_method_id` must belong to the caller
pub async fn create_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<BillRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let bill = bill_service::create_bill(&pool, auth.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Bill created successfully", "bill": bill })),
    ))
}

pub async fn update_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(bill_id): Path<Uuid>,
    JsonBody(request): JsonBody<BillRequest>,
) -> Result<Json<Value>, AppError> {
    let bill = bill_service::update_bill(&pool, auth.user_id, bill_id, request).await?;
    Ok(Json(json!({ "message": "Bill updated successfully", "bill": bill })))
}

pub async fn delete_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    bill_service::delete_bill(&pool, auth.user_id, bill_id).await?;
    Ok(Json(json!({ "message": "Bill deleted successfully" })))
}

/// Pay a bill.
///
/// # Endpoint
///
/// `POST /api/v1/bills/{id}/pay` with an optional body
/// `{ "payment_method_id": "..." }`.
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Bill paid successfully",
///   "bill": { "status": "paid", "paid_at": "2025-04-14T09:12:00Z" },
///   "next_bill": { "status": "unpaid", "due_date": "2025-05-15" }
/// }
/// ```
///
/// `next_bill` is only present for recurring bills. Paying a bill twice
/// returns 409.
pub async fn pay_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(bill_id): Path<Uuid>,
    request: Option<JsonBody<PayBillRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = request.map(|JsonBody(r)| r).unwrap_or_default();
    let paid = bill_service::pay_bill(&pool, auth.user_id, bill_id, request).await?;

    let mut body = json!({ "message": "Bill paid successfully", "bill": paid.bill });
    if let Some(next) = paid.next_bill {
        body["next_bill"] = json!(next);
    }
    Ok(Json(body))
}

/// Unpaid bills due in the next `days` days (default 30, max 365).
pub async fn upcoming_bills(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, AppError> {
    let bills = bill_service::upcoming_bills(&pool, auth.user_id, bill_service::today(), query.days).await?;
    Ok(Json(json!({ "bills": bills })))
}

/// Spending statistics.
///
/// # Endpoint
///
/// `GET /api/v1/bills/statistics?time_range=90d`
///
/// # Response (200)
///
/// ```json
/// {
///   "total": 45120,
///   "paid": 30000,
///   "unpaid": 15120,
///   "categories": [{ "id": "...", "name": "Utilities", "color": "#3B82F6", "icon": "lightning-bolt", "total": 14549 }],
///   "monthly": [{ "month": "2025-04", "total": 45120, "paid": 30000, "unpaid": 15120 }]
/// }
/// ```
pub async fn bill_statistics(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BillStatistics>, AppError> {
    let start = TimeRange::parse(query.time_range.as_deref()).start_date(bill_service::today());
    let stats = bill_service::bill_statistics(&pool, auth.user_id, start).await?;
    Ok(Json(stats))
}
