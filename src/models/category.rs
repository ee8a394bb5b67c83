//! Category model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_COLOR: &str = "#6B7280";
pub const DEFAULT_ICON: &str = "folder";

/// Name of the category that absorbs bills when another category is deleted.
pub const FALLBACK_CATEGORY: &str = "Other";

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for both create and update.
///
/// ```json
/// { "name": "Streaming", "color": "#8B5CF6", "icon": "tv" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}
