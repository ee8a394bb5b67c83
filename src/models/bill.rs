//! Bill data models and API request types.
//!
//! # Amount Storage
//!
//! Amounts are stored as `i64` cents, never as floats. $85.50 is 8550.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Unpaid,
    Paid,
    Overdue,
}

impl BillStatus {
    pub const ALL: [&'static str; 3] = ["unpaid", "paid", "overdue"];

    pub fn as_str(self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(BillStatus::Unpaid),
            "paid" => Some(BillStatus::Paid),
            "overdue" => Some(BillStatus::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl Recurrence {
    pub const ALL: [&'static str; 6] = ["none", "daily", "weekly", "monthly", "quarterly", "annually"];

    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Quarterly => "quarterly",
            Recurrence::Annually => "annually",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Recurrence::None),
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            "quarterly" => Some(Recurrence::Quarterly),
            "annually" => Some(Recurrence::Annually),
            _ => None,
        }
    }

    /// Due date of the occurrence after `due`, or `None` for one-time bills.
    ///
    /// Month-based steps clamp to the last day of the month, so Jan 31 is
    /// followed by Feb 28 (or 29).
    pub fn next_due(self, due: NaiveDate) -> Option<NaiveDate> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => due.checked_add_days(chrono::Days::new(1)),
            Recurrence::Weekly => due.checked_add_days(chrono::Days::new(7)),
            Recurrence::Monthly => due.checked_add_months(Months::new(1)),
            Recurrence::Quarterly => due.checked_add_months(Months::new(3)),
            Recurrence::Annually => due.checked_add_months(Months::new(12)),
        }
    }
}

/// A bill joined with its category and payment method display fields.
///
/// # Database Table
///
/// Maps to `bills`, with `category_*` and `payment_method_*` columns coming
/// from LEFT JOINs. See [`BILL_SELECT`].
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Bill {
    pub id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub category_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub status: String,
    pub recurrence: String,
    pub recurrence_details: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub category_icon: Option<String>,
    pub payment_method_name: Option<String>,
    pub payment_method_type: Option<String>,
}

/// Column list and joins shared by every bill read. Callers append the
/// WHERE clause; the bills table is aliased `b`.
pub const BILL_SELECT: &str = r#"
    SELECT b.id, b.name, b.amount_cents, b.due_date, b.category_id,
           b.payment_method_id, b.status, b.recurrence, b.recurrence_details, b.notes,
           b.paid_at, b.created_at, b.updated_at,
           c.name AS category_name, c.color AS category_color, c.icon AS category_icon,
           pm.name AS payment_method_name, pm.type AS payment_method_type
    FROM bills b
    LEFT JOIN categories c ON b.category_id = c.id
    LEFT JOIN payment_methods pm ON b.payment_method_id = pm.id
"#;

/// Body for create and full update.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Electricity",
///   "amount_cents": 8550,
///   "due_date": "2025-04-15",
///   "status": "unpaid",
///   "recurrence": "monthly",
///   "category_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct BillRequest {
    pub name: Option<String>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub category_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub status: Option<String>,
    pub recurrence: Option<String>,
    pub recurrence_details: Option<serde_json::Value>,
    pub notes: Option<String>,
}

/// A `BillRequest` that passed validation and sanitization.
#[derive(Debug, Clone)]
pub struct ValidBill {
    pub name: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub category_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub status: BillStatus,
    pub recurrence: Recurrence,
    pub recurrence_details: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillListQuery {
    pub status: Option<String>,
    pub category: Option<Uuid>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PayBillRequest {
    pub payment_method_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

/// Sortable bill columns. User input is matched against this list and never
/// interpolated into SQL.
pub fn sort_column(sort_by: Option<&str>) -> Option<&'static str> {
    match sort_by.unwrap_or("due_date") {
        "due_date" => Some("b.due_date"),
        "amount" | "amount_cents" => Some("b.amount_cents"),
        "name" => Some("b.name"),
        "created_at" => Some("b.created_at"),
        "status" => Some("b.status"),
        _ => None,
    }
}

pub fn sort_direction(sort_order: Option<&str>) -> Option<&'static str> {
    match sort_order.map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => Some("ASC"),
        Some("desc") => Some("DESC"),
        _ => None,
    }
}
