//! Payment method model.
//!
//! At most one method per user is the default. The service layer clears the
//! old default in the same transaction that sets a new one, and a partial
//! unique index backs that up in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PAYMENT_METHOD_TYPES: [&str; 6] = ["credit", "debit", "bank", "digital", "cash", "other"];

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub method_type: String,
    /// Free-form display details, e.g. `{"last4": "4567", "expiry": "05/27"}`
    pub details: serde_json::Value,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for both create and update.
#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub method_type: Option<String>,
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub is_default: bool,
}
