//! Document HTTP handlers.
//!
//! - GET /api/v1/documents - List, optionally by `bill_id`
//! - GET /api/v1/documents/{id} - One document
//! - POST /api/v1/documents - Register an uploaded file
//! - PUT /api/v1/documents/{id} - Update link, name or OCR data
//! - DELETE /api/v1/documents/{id} - Delete
//! - POST /api/v1/documents/{id}/ocr - Run OCR
//! - POST /api/v1/documents/{id}/bill - Create a bill from OCR output

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
    models::document::{CreateDocumentRequest, DocumentListQuery, UpdateDocumentRequest},
    services::document_service,
};

pub async fn list_documents(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Value>, AppError> {
    let documents = document_service::list(&pool, auth.user_id, query).await?;
    Ok(Json(json!({ "documents": documents })))
}

pub async fn get_document(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let document = document_service::get(&pool, auth.user_id, document_id).await?;
    Ok(Json(json!({ "document": document })))
}

/// Record an uploaded file.
///
/// # Request Body
///
/// ```json
/// {
///   "file_name": "electricity.jpg",
///   "file_type": "image/jpeg",
///   "file_size": 204800,
///   "file_path": "/uploads/electricity.jpg",
///   "bill_id": null
/// }
/// ```
///
/// `file_type` must be an image or `application/pdf`.
pub async fn create_document(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let document = document_service::create(&pool, auth.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Document uploaded successfully", "document": document })),
    ))
}

pub async fn update_document(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
    JsonBody(request): JsonBody<UpdateDocumentRequest>,
) -> Result<Json<Value>, AppError> {
    let document = document_service::update(&pool, auth.user_id, document_id, request).await?;
    Ok(Json(json!({ "message": "Document updated successfully", "document": document })))
}

pub async fn delete_document(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    document_service::delete(&pool, auth.user_id, document_id).await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

/// Run OCR on a document.
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "OCR processing completed",
///   "ocr_data": {
///     "text": "ACME Utilities\nInvoice #12345\n...",
///     "extracted": { "vendor": "ACME Utilities", "amount_cents": 8550, "due_date": "2025-04-15" },
///     "confidence": 0.92
///   }
/// }
/// ```
pub async fn process_ocr(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ocr_data = document_service::process_ocr(&pool, auth.user_id, document_id).await?;
    Ok(Json(json!({ "message": "OCR processing completed", "ocr_data": ocr_data })))
}

/// Create an unpaid bill from a processed document and link the two.
pub async fn create_bill_from_document(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let bill = document_service::create_bill_from_ocr(&pool, auth.user_id, document_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Bill created from document", "bill": bill })),
    ))
}
