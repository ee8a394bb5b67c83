//! Analytics windows and aggregate rows.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Look-back window for statistics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeRange {
    /// `7d`, `30d`, `90d` or `1y`. Anything else, including nothing, is 30 days.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("7d") => TimeRange::Week,
            Some("90d") => TimeRange::Quarter,
            Some("1y") => TimeRange::Year,
            _ => TimeRange::Month,
        }
    }

    /// First day included in the window ending on `today`.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        let start = match self {
            TimeRange::Week => today.checked_sub_days(Days::new(7)),
            TimeRange::Month => today.checked_sub_days(Days::new(30)),
            TimeRange::Quarter => today.checked_sub_days(Days::new(90)),
            TimeRange::Year => today.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub time_range: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Totals {
    pub total: i64,
    pub paid: i64,
    pub unpaid: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryTotal {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub total: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: i64,
    pub paid: i64,
    pub unpaid: i64,
}

#[derive(Debug, Serialize)]
pub struct BillStatistics {
    pub total: i64,
    pub paid: i64,
    pub unpaid: i64,
    pub categories: Vec<CategoryTotal>,
    pub monthly: Vec<MonthlyTotal>,
}

/// Per-category breakdown row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryBreakdown {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub total: i64,
    pub bill_count: i64,
    pub paid: i64,
    pub unpaid: i64,
    #[sqlx(skip)]
    pub percentage: i64,
}

/// Per-payment-method breakdown row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentMethodBreakdown {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub method_type: String,
    pub total: i64,
    pub bill_count: i64,
    pub paid: i64,
    pub unpaid: i64,
    #[sqlx(skip)]
    pub percentage: i64,
}

/// Share of `part` in `whole`, rounded to a whole percent. Zero when `whole` is.
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as i64
}

/// Fill in `percentage` on each row and return the grand total.
pub fn apply_percentages<T>(rows: &mut [T], total: impl Fn(&T) -> i64, set: impl Fn(&mut T, i64)) -> i64 {
    let grand_total: i64 = rows.iter().map(&total).sum();
    for row in rows.iter_mut() {
        let share = percentage(total(&*row), grand_total);
        set(row, share);
    }
    grand_total
}
