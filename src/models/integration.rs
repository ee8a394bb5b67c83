//! User integration model: email inboxes, cloud storage and smart assistants.
//!
//! # Credential Storage
//!
//! A string `access_token` in `details` is stored as a signed envelope and
//! is always replaced by [`REDACTED`] in responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACCESS_TOKEN_FIELD: &str = "access_token";
pub const REDACTED: &str = "[redacted]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationKind {
    Email,
    Dropbox,
    GoogleAssistant,
    Alexa,
}

impl IntegrationKind {
    pub const ALL: [&'static str; 4] = ["email", "dropbox", "google_assistant", "alexa"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(IntegrationKind::Email),
            "dropbox" => Some(IntegrationKind::Dropbox),
            "google_assistant" => Some(IntegrationKind::GoogleAssistant),
            "alexa" => Some(IntegrationKind::Alexa),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationKind::Email => "email",
            IntegrationKind::Dropbox => "dropbox",
            IntegrationKind::GoogleAssistant => "google_assistant",
            IntegrationKind::Alexa => "alexa",
        }
    }

    pub fn is_assistant(self) -> bool {
        matches!(self, IntegrationKind::GoogleAssistant | IntegrationKind::Alexa)
    }
}

pub const INTEGRATION_STATUSES: [&str; 4] = ["pending", "active", "error", "disconnected"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Integration {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub details: serde_json::Value,
    pub status: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: serde_json::Value,
    pub status: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Integration> for IntegrationResponse {
    fn from(integration: Integration) -> Self {
        Self {
            id: integration.id,
            kind: integration.kind,
            details: redact_details(integration.details),
            status: integration.status,
            last_sync: integration.last_sync,
            created_at: integration.created_at,
            updated_at: integration.updated_at,
        }
    }
}

/// Replace a stored credential with a placeholder.
pub fn redact_details(mut details: serde_json::Value) -> serde_json::Value {
    if let Some(token) = details.get_mut(ACCESS_TOKEN_FIELD) {
        if !token.is_null() {
            *token = serde_json::Value::String(REDACTED.to_string());
        }
    }
    details
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntegrationRequest {
    pub details: Option<serde_json::Value>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectAssistantRequest {
    pub assistant_type: Option<String>,
    pub device_name: Option<String>,
}

/// One bill-like item found during a sync.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FoundBill {
    Email {
        subject: String,
        from: String,
        date: DateTime<Utc>,
        extracted: ExtractedBill,
    },
    File {
        filename: String,
        path: String,
        size: i64,
        modified: DateTime<Utc>,
        extracted: ExtractedBill,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedBill {
    pub vendor: String,
    pub amount_cents: i64,
    pub due_date: chrono::NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncResults {
    pub scanned: u32,
    pub found: u32,
    pub bills: Vec<FoundBill>,
}
