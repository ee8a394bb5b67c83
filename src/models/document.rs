//! Document model: uploaded or scanned bill images and PDFs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub bill_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub ocr_processed: bool,
    pub ocr_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Name of the linked bill, from a LEFT JOIN
    pub bill_name: Option<String>,
}

/// Column list shared by document reads. The documents table is aliased `d`.
pub const DOCUMENT_SELECT: &str = r#"
    SELECT d.id, d.bill_id, d.file_name, d.file_type, d.file_size, d.file_path,
           d.thumbnail_path, d.ocr_processed, d.ocr_data, d.created_at, d.updated_at,
           b.name AS bill_name
    FROM documents d
    LEFT JOIN bills b ON d.bill_id = b.id
"#;

/// Slim listing attached to a single bill response.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub bill_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub file_path: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// Partial update. Absent fields keep their stored value, except `bill_id`
/// which is cleared when absent.
#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub bill_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub ocr_processed: Option<bool>,
    pub ocr_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub bill_id: Option<Uuid>,
}

/// Accepted upload types: any image, or PDF.
pub fn is_supported_file_type(file_type: &str) -> bool {
    let file_type = file_type.trim().to_ascii_lowercase();
    file_type == "application/pdf"
        || file_type
            .strip_prefix("image/")
            .is_some_and(|sub| !sub.is_empty())
}
