//! Bill documents, OCR and the scan-to-bill flow.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        bill::{Bill, BillRequest, BillStatus, Recurrence},
        document::{
            CreateDocumentRequest, DOCUMENT_SELECT, Document, DocumentListQuery, UpdateDocumentRequest,
            is_supported_file_type,
        },
    },
    security::sanitize::{Validator, clean_optional, escape_html, sanitize_value},
    services::{
        bill_service,
        ocr::{self, OcrFields, OcrResult},
    },
};

async fn ensure_bill_owned(pool: &DbPool, user_id: Uuid, bill_id: Option<Uuid>) -> Result<(), AppError> {
    let Some(bill_id) = bill_id else {
        return Ok(());
    };
    let owned: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bills WHERE id = $1 AND user_id = $2)")
        .bind(bill_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if owned { Ok(()) } else { Err(AppError::NotFound("bill")) }
}

/// Newest first, optionally narrowed to one bill.
pub async fn list(pool: &DbPool, user_id: Uuid, query: DocumentListQuery) -> Result<Vec<Document>, AppError> {
    let documents = sqlx::query_as::<_, Document>(&format!(
        r#"{DOCUMENT_SELECT}
        WHERE d.user_id = $1 AND ($2::UUID IS NULL OR d.bill_id = $2)
        ORDER BY d.created_at DESC"#
    ))
    .bind(user_id)
    .bind(query.bill_id)
    .fetch_all(pool)
    .await?;
    Ok(documents)
}

pub async fn get(pool: &DbPool, user_id: Uuid, document_id: Uuid) -> Result<Document, AppError> {
    sqlx::query_as::<_, Document>(&format!("{DOCUMENT_SELECT} WHERE d.id = $1 AND d.user_id = $2"))
        .bind(document_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("document"))
}

pub async fn create(pool: &DbPool, user_id: Uuid, request: CreateDocumentRequest) -> Result<Document, AppError> {
    let mut v = Validator::new();
    v.required("file_name", request.file_name.as_deref())
        .max_len("file_name", request.file_name.as_deref(), 255)
        .required("file_type", request.file_type.as_deref())
        .present("file_size", request.file_size.as_ref())
        .positive("file_size", request.file_size)
        .required("file_path", request.file_path.as_deref())
        .max_len("file_path", request.file_path.as_deref(), 1024);
    if let Some(file_type) = request.file_type.as_deref() {
        if !file_type.trim().is_empty() {
            v.check(
                "file_type",
                is_supported_file_type(file_type),
                "must be an image or a PDF",
            );
        }
    }
    v.finish()?;

    ensure_bill_owned(pool, user_id, request.bill_id).await?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO documents (user_id, bill_id, file_name, file_type, file_size, file_path, thumbnail_path)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(request.bill_id)
    .bind(escape_html(request.file_name.as_deref().unwrap_or_default().trim()))
    .bind(request.file_type.as_deref().unwrap_or_default().trim().to_ascii_lowercase())
    .bind(request.file_size.unwrap_or_default())
    .bind(request.file_path.as_deref().unwrap_or_default().trim())
    .bind(clean_optional(request.thumbnail_path))
    .fetch_one(pool)
    .await?;

    tracing::info!(document_id = %id, "document stored");
    get(pool, user_id, id).await
}

/// Check a partial update and escape its free text, including every string
/// inside `ocr_data`.
fn clean_update(request: UpdateDocumentRequest) -> Result<UpdateDocumentRequest, AppError> {
    let mut v = Validator::new();
    if let Some(name) = request.file_name.as_deref() {
        v.check("file_name", !name.trim().is_empty(), "must not be empty")
            .max_len("file_name", Some(name), 255);
    }
    if let Some(data) = &request.ocr_data {
        v.check("ocr_data", data.is_object(), "must be an object");
    }
    v.finish()?;

    Ok(UpdateDocumentRequest {
        bill_id: request.bill_id,
        file_name: request.file_name.map(|n| escape_html(n.trim())),
        ocr_processed: request.ocr_processed,
        ocr_data: request.ocr_data.map(sanitize_value),
    })
}

/// `bill_id` is overwritten even when absent, which detaches the document.
pub async fn update(
    pool: &DbPool,
    user_id: Uuid,
    document_id: Uuid,
    request: UpdateDocumentRequest,
) -> Result<Document, AppError> {
    let request = clean_update(request)?;

    ensure_bill_owned(pool, user_id, request.bill_id).await?;

    let updated = sqlx::query(
        r#"
        UPDATE documents
        SET bill_id = $1,
            file_name = COALESCE($2, file_name),
            ocr_processed = COALESCE($3, ocr_processed),
            ocr_data = COALESCE($4, ocr_data),
            updated_at = NOW()
        WHERE id = $5 AND user_id = $6
        "#,
    )
    .bind(request.bill_id)
    .bind(request.file_name)
    .bind(request.ocr_processed)
    .bind(request.ocr_data)
    .bind(document_id)
    .bind(user_id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("document"));
    }
    get(pool, user_id, document_id).await
}

pub async fn delete(pool: &DbPool, user_id: Uuid, document_id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
        .bind(document_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("document"));
    }
    Ok(())
}

/// Run OCR on a document and store the result on it.
pub async fn process_ocr(pool: &DbPool, user_id: Uuid, document_id: Uuid) -> Result<OcrResult, AppError> {
    let document = get(pool, user_id, document_id).await?;
    let result = ocr::extract(&document.file_path);

    let stored = serde_json::to_value(&result).map_err(|e| AppError::Internal(e.to_string()))?;

    sqlx::query(
        "UPDATE documents SET ocr_processed = TRUE, ocr_data = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
    )
    .bind(stored)
    .bind(document_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(%document_id, confidence = result.confidence, "OCR completed");
    Ok(result)
}

/// One-time unpaid bill described by extracted OCR fields, not yet validated.
fn bill_request_from_ocr(fields: OcrFields) -> BillRequest {
    BillRequest {
        name: Some(fields.vendor),
        amount_cents: Some(fields.amount_cents),
        due_date: Some(fields.due_date),
        category_id: None,
        payment_method_id: None,
        status: Some(BillStatus::Unpaid.as_str().to_string()),
        recurrence: Some(Recurrence::None.as_str().to_string()),
        recurrence_details: None,
        notes: Some(format!(
            "Invoice #{}, service period {}",
            fields.invoice_number, fields.service_period
        )),
    }
}

/// Turn an OCR-processed document into an unpaid bill and link them.
///
/// The extracted fields pass through the same validation as a created bill.
///
/// # Errors
///
/// - 404 if the document does not exist
/// - 400 if OCR has not run, its stored output is unreadable, or the
///   extracted fields do not make a valid bill
pub async fn create_bill_from_ocr(pool: &DbPool, user_id: Uuid, document_id: Uuid) -> Result<Bill, AppError> {
    let document = get(pool, user_id, document_id).await?;

    let fields = match (document.ocr_processed, document.ocr_data.as_ref()) {
        (true, Some(data)) => ocr::fields_from_stored(data),
        _ => None,
    }
    .ok_or_else(|| AppError::InvalidRequest("Document has not been processed by OCR".to_string()))?;

    let bill = bill_service::validate_bill(bill_request_from_ocr(fields))?;

    let mut tx = pool.begin().await?;
    let bill_id = bill_service::insert_bill(&mut *tx, user_id, &bill).await?;
    sqlx::query("UPDATE documents SET bill_id = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3")
        .bind(bill_id)
        .bind(document_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%document_id, %bill_id, "bill created from scanned document");
    bill_service::get_bill(pool, user_id, bill_id).await
}
