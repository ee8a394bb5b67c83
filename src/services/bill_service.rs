//! Bill business logic: CRUD, payment with recurring rollover, the upcoming
//! calendar view and spending statistics.

use chrono::{Days, NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        bill::{
            BILL_SELECT, Bill, BillListQuery, BillRequest, BillStatus, PayBillRequest, Recurrence,
            ValidBill, sort_column, sort_direction,
        },
        document::DocumentSummary,
        stats::{BillStatistics, CategoryTotal, MonthlyTotal, Totals},
    },
    security::sanitize::{Validator, clean_optional, escape_html, sanitize_value},
};

pub const DEFAULT_UPCOMING_DAYS: i64 = 30;
pub const MAX_UPCOMING_DAYS: i64 = 365;

/// Result of paying a bill. `next_bill` is the rolled-over occurrence of a
/// recurring bill.
#[derive(Debug)]
pub struct PaidBill {
    pub bill: Bill,
    pub next_bill: Option<Bill>,
}

/// Validate and sanitize a create/update body.
pub fn validate_bill(request: BillRequest) -> Result<ValidBill, AppError> {
    let mut v = Validator::new();
    v.required("name", request.name.as_deref())
        .max_len("name", request.name.as_deref(), 100)
        .present("amount_cents", request.amount_cents.as_ref())
        .positive("amount_cents", request.amount_cents)
        .present("due_date", request.due_date.as_ref())
        .required("status", request.status.as_deref())
        .one_of("status", request.status.as_deref(), &BillStatus::ALL)
        .one_of("recurrence", request.recurrence.as_deref(), &Recurrence::ALL)
        .max_len("notes", request.notes.as_deref(), 1000);
    v.finish()?;

    // Presence checked above.
    Ok(ValidBill {
        name: escape_html(request.name.as_deref().unwrap_or_default().trim()),
        amount_cents: request.amount_cents.unwrap_or_default(),
        due_date: request.due_date.unwrap_or_default(),
        category_id: request.category_id,
        payment_method_id: request.payment_method_id,
        status: request
            .status
            .as_deref()
            .and_then(BillStatus::parse)
            .unwrap_or(BillStatus::Unpaid),
        recurrence: request
            .recurrence
            .as_deref()
            .and_then(Recurrence::parse)
            .unwrap_or(Recurrence::None),
        recurrence_details: request.recurrence_details.map(sanitize_value),
        notes: clean_optional(request.notes),
    })
}

/// 404 unless `category_id` and `payment_method_id`, when set, belong to `user_id`.
pub async fn ensure_references_owned(
    conn: &mut PgConnection,
    user_id: Uuid,
    category_id: Option<Uuid>,
    payment_method_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(id) = category_id {
        let owned: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1 AND user_id = $2)")
                .bind(id)
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
        if !owned {
            return Err(AppError::NotFound("category"));
        }
    }
    if let Some(id) = payment_method_id {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payment_methods WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        if !owned {
            return Err(AppError::NotFound("payment_method"));
        }
    }
    Ok(())
}

/// Insert a validated bill and return its id.
pub async fn insert_bill(conn: &mut PgConnection, user_id: Uuid, bill: &ValidBill) -> Result<Uuid, AppError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO bills (user_id, name, amount_cents, due_date, category_id, payment_method_id,
                           status, recurrence, recurrence_details, notes, paid_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                CASE WHEN $7 = 'paid' THEN NOW() END)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&bill.name)
    .bind(bill.amount_cents)
    .bind(bill.due_date)
    .bind(bill.category_id)
    .bind(bill.payment_method_id)
    .bind(bill.status.as_str())
    .bind(bill.recurrence.as_str())
    .bind(&bill.recurrence_details)
    .bind(&bill.notes)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// List a user's bills.
///
/// Filters on `status` and `category`; `sort_by`/`sort_order` are resolved
/// through allowlists so only known column names reach the SQL text.
pub async fn list_bills(pool: &DbPool, user_id: Uuid, query: BillListQuery) -> Result<Vec<Bill>, AppError> {
    let mut v = Validator::new();
    v.one_of("status", query.status.as_deref(), &BillStatus::ALL);
    let column = sort_column(query.sort_by.as_deref());
    let direction = sort_direction(query.sort_order.as_deref());
    v.check("sort_by", column.is_some(), "must be one of: due_date, amount, name, created_at, status")
        .check("sort_order", direction.is_some(), "must be asc or desc");
    v.finish()?;

    let sql = format!(
        r#"{BILL_SELECT}
        WHERE b.user_id = $1
          AND ($2::TEXT IS NULL OR b.status = $2)
          AND ($3::UUID IS NULL OR b.category_id = $3)
        ORDER BY {} {}, b.id"#,
        column.unwrap_or("b.due_date"),
        direction.unwrap_or("ASC"),
    );

    let bills = sqlx::query_as::<_, Bill>(&sql)
        .bind(user_id)
        .bind(query.status)
        .bind(query.category)
        .fetch_all(pool)
        .await?;
    Ok(bills)
}

pub async fn get_bill(pool: &DbPool, user_id: Uuid, bill_id: Uuid) -> Result<Bill, AppError> {
    sqlx::query_as::<_, Bill>(&format!("{BILL_SELECT} WHERE b.id = $1 AND b.user_id = $2"))
        .bind(bill_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("bill"))
}

/// A bill together with the documents attached to it.
pub async fn get_bill_with_documents(
    pool: &DbPool,
    user_id: Uuid,
    bill_id: Uuid,
) -> Result<(Bill, Vec<DocumentSummary>), AppError> {
    let bill = get_bill(pool, user_id, bill_id).await?;

    let documents = sqlx::query_as::<_, DocumentSummary>(
        r#"
        SELECT id, file_name, file_type, file_size, file_path, thumbnail_path, created_at
        FROM documents
        WHERE bill_id = $1 AND user_id = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(bill_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok((bill, documents))
}

pub async fn create_bill(pool: &DbPool, user_id: Uuid, request: BillRequest) -> Result<Bill, AppError> {
    let bill = validate_bill(request)?;

    let mut tx = pool.begin().await?;
    ensure_references_owned(&mut *tx, user_id, bill.category_id, bill.payment_method_id).await?;
    let id = insert_bill(&mut *tx, user_id, &bill).await?;
    tx.commit().await?;

    tracing::info!(bill_id = %id, amount_cents = bill.amount_cents, "bill created");
    get_bill(pool, user_id, id).await
}

/// Full replacement. `paid_at` is stamped when the status becomes `paid`
/// and cleared when it leaves `paid`.
pub async fn update_bill(
    pool: &DbPool,
    user_id: Uuid,
    bill_id: Uuid,
    request: BillRequest,
) -> Result<Bill, AppError> {
    let bill = validate_bill(request)?;

    let mut tx = pool.begin().await?;
    ensure_references_owned(&mut *tx, user_id, bill.category_id, bill.payment_method_id).await?;

    let updated = sqlx::query(
        r#"
        UPDATE bills
        SET name = $1, amount_cents = $2, due_date = $3, category_id = $4,
            payment_method_id = $5, status = $6, recurrence = $7,
            recurrence_details = $8, notes = $9,
            paid_at = CASE
                WHEN $6 <> 'paid' THEN NULL
                WHEN status = 'paid' THEN paid_at
                ELSE NOW()
            END,
            updated_at = NOW()
        WHERE id = $10 AND user_id = $11
        "#,
    )
    .bind(&bill.name)
    .bind(bill.amount_cents)
    .bind(bill.due_date)
    .bind(bill.category_id)
    .bind(bill.payment_method_id)
    .bind(bill.status.as_str())
    .bind(bill.recurrence.as_str())
    .bind(&bill.recurrence_details)
    .bind(&bill.notes)
    .bind(bill_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound("bill"));
    }
    tx.commit().await?;

    get_bill(pool, user_id, bill_id).await
}

pub async fn delete_bill(pool: &DbPool, user_id: Uuid, bill_id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM bills WHERE id = $1 AND user_id = $2")
        .bind(bill_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("bill"));
    }
    tracing::info!(%bill_id, "bill deleted");
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct LockedBill {
    status: String,
    recurrence: String,
    due_date: NaiveDate,
}

/// Mark a bill paid and, for recurring bills, schedule the next occurrence.
///
/// # Process
///
/// 1. Lock the bill row; 404 if missing, 409 if already paid
/// 2. Check the optional payment method belongs to the user
/// 3. Set `status = paid`, `paid_at = NOW()`
/// 4. Insert the next unpaid occurrence with the due date advanced by one period
///
/// All steps share one transaction.
pub async fn pay_bill(
    pool: &DbPool,
    user_id: Uuid,
    bill_id: Uuid,
    request: PayBillRequest,
) -> Result<PaidBill, AppError> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, LockedBill>(
        "SELECT status, recurrence, due_date FROM bills WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(bill_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("bill"))?;

    if locked.status == BillStatus::Paid.as_str() {
        tx.rollback().await?;
        return Err(AppError::Conflict("Bill is already paid".to_string()));
    }

    ensure_references_owned(&mut *tx, user_id, None, request.payment_method_id).await?;

    sqlx::query(
        r#"
        UPDATE bills
        SET status = 'paid', paid_at = NOW(),
            payment_method_id = COALESCE($1, payment_method_id),
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(request.payment_method_id)
    .bind(bill_id)
    .execute(&mut *tx)
    .await?;

    let next_due = Recurrence::parse(&locked.recurrence)
        .and_then(|recurrence| recurrence.next_due(locked.due_date));
    let mut next_id = None;
    if let Some(due) = next_due {
        // The copy keeps everything but status, paid_at and the due date.
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bills (user_id, name, amount_cents, due_date, category_id, payment_method_id,
                               status, recurrence, recurrence_details, notes)
            SELECT user_id, name, amount_cents, $1, category_id, payment_method_id,
                   'unpaid', recurrence, recurrence_details, notes
            FROM bills
            WHERE id = $2
            RETURNING id
            "#,
        )
        .bind(due)
        .bind(bill_id)
        .fetch_one(&mut *tx)
        .await?;
        next_id = Some(id);
    }

    tx.commit().await?;

    tracing::info!(%bill_id, next_bill_id = ?next_id, "bill paid");

    let bill = get_bill(pool, user_id, bill_id).await?;
    let next_bill = match next_id {
        Some(id) => Some(get_bill(pool, user_id, id).await?),
        None => None,
    };
    Ok(PaidBill { bill, next_bill })
}

/// Clamp a requested look-ahead to `1..=365`, defaulting to 30 days.
pub fn clamp_upcoming_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_UPCOMING_DAYS).clamp(1, MAX_UPCOMING_DAYS)
}

/// Unpaid bills due from `today` through `today + days`, soonest first.
pub async fn upcoming_bills(
    pool: &DbPool,
    user_id: Uuid,
    today: NaiveDate,
    days: Option<i64>,
) -> Result<Vec<Bill>, AppError> {
    let days = clamp_upcoming_days(days);
    let until = today
        .checked_add_days(Days::new(days as u64))
        .unwrap_or(NaiveDate::MAX);

    let bills = sqlx::query_as::<_, Bill>(&format!(
        r#"{BILL_SELECT}
        WHERE b.user_id = $1 AND b.status = 'unpaid'
          AND b.due_date >= $2 AND b.due_date <= $3
        ORDER BY b.due_date ASC, b.name ASC"#
    ))
    .bind(user_id)
    .bind(today)
    .bind(until)
    .fetch_all(pool)
    .await?;
    Ok(bills)
}

/// Totals, per-category totals and a monthly series for bills due since `start`.
pub async fn bill_statistics(pool: &DbPool, user_id: Uuid, start: NaiveDate) -> Result<BillStatistics, AppError> {
    let totals = sqlx::query_as::<_, Totals>(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT AS total,
               COALESCE(SUM(amount_cents) FILTER (WHERE status = 'paid'), 0)::BIGINT AS paid,
               COALESCE(SUM(amount_cents) FILTER (WHERE status = 'unpaid'), 0)::BIGINT AS unpaid
        FROM bills
        WHERE user_id = $1 AND due_date >= $2
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_one(pool)
    .await?;

    let categories = sqlx::query_as::<_, CategoryTotal>(
        r#"
        SELECT c.id, c.name, c.color, c.icon, COALESCE(SUM(b.amount_cents), 0)::BIGINT AS total
        FROM bills b
        JOIN categories c ON b.category_id = c.id
        WHERE b.user_id = $1 AND b.due_date >= $2
        GROUP BY c.id
        ORDER BY total DESC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    let monthly = sqlx::query_as::<_, MonthlyTotal>(
        r#"
        SELECT to_char(due_date, 'YYYY-MM') AS month,
               COALESCE(SUM(amount_cents), 0)::BIGINT AS total,
               COALESCE(SUM(amount_cents) FILTER (WHERE status = 'paid'), 0)::BIGINT AS paid,
               COALESCE(SUM(amount_cents) FILTER (WHERE status = 'unpaid'), 0)::BIGINT AS unpaid
        FROM bills
        WHERE user_id = $1 AND due_date >= $2
        GROUP BY month
        ORDER BY month ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    Ok(BillStatistics {
        total: totals.total,
        paid: totals.paid,
        unpaid: totals.unpaid,
        categories,
        monthly,
    })
}

/// Today's date in UTC, the reference point for windows and the calendar.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use serde_json::json;

    fn request() -> BillRequest {
        BillRequest {
            name: Some("  Electricity ".to_string()),
            amount_cents: Some(8550),
            due_date: NaiveDate::from_ymd_opt(2025, 4, 15),
            category_id: None,
            payment_method_id: None,
            status: Some("unpaid".to_string()),
            recurrence: None,
            recurrence_details: Some(json!({ "note": "<i>x</i>" })),
            notes: Some("   ".to_string()),
        }
    }

    #[test]
    fn valid_bill_is_cleaned() {
        let bill = validate_bill(request()).unwrap();
        assert_eq!(bill.name, "Electricity");
        assert_eq!(bill.recurrence, Recurrence::None);
        assert_eq!(bill.status, BillStatus::Unpaid);
        assert_eq!(bill.notes, None);
        assert_eq!(
            bill.recurrence_details,
            Some(json!({ "note": "&lt;i&gt;x&lt;&#x2F;i&gt;" }))
        );
    }

    #[test]
    fn missing_and_invalid_fields_are_all_reported() {
        let mut req = request();
        req.name = None;
        req.amount_cents = Some(0);
        req.due_date = None;
        req.status = Some("late".to_string());
        req.recurrence = Some("hourly".to_string());

        match validate_bill(req) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.contains(&"name is required".to_string()));
                assert!(errors.contains(&"amount_cents must be positive".to_string()));
                assert!(errors.contains(&"due_date is required".to_string()));
                assert!(errors.iter().any(|e| e.starts_with("status must be one of")));
                assert!(errors.iter().any(|e| e.starts_with("recurrence must be one of")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn status_is_required() {
        let mut req = request();
        req.status = None;
        assert!(matches!(validate_bill(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn upcoming_window_is_clamped() {
        assert_eq!(clamp_upcoming_days(None), 30);
        assert_eq!(clamp_upcoming_days(Some(0)), 1);
        assert_eq!(clamp_upcoming_days(Some(-4)), 1);
        assert_eq!(clamp_upcoming_days(Some(14)), 14);
        assert_eq!(clamp_upcoming_days(Some(10_000)), 365);
    }

    fn monthly_rent() -> BillRequest {
        BillRequest {
            name: Some("Rent".to_string()),
            amount_cents: Some(120_000),
            due_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            category_id: None,
            payment_method_id: None,
            status: Some("unpaid".to_string()),
            recurrence: Some("monthly".to_string()),
            recurrence_details: None,
            notes: Some("Landlord".to_string()),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn paying_recurring_bill_schedules_next_and_rejects_second_payment(pool: DbPool) {
        let user = insert_test_user(&pool, "rent@example.com").await;
        let bill = create_bill(&pool, user, monthly_rent()).await.unwrap();
        assert!(bill.paid_at.is_none());

        let paid = pay_bill(&pool, user, bill.id, PayBillRequest::default()).await.unwrap();
        assert_eq!(paid.bill.status, "paid");
        assert!(paid.bill.paid_at.is_some());

        let next = paid.next_bill.expect("monthly bill rolls over");
        assert_eq!(next.status, "unpaid");
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(next.amount_cents, 120_000);
        assert_eq!(next.recurrence, "monthly");
        assert_eq!(next.notes.as_deref(), Some("Landlord"));
        assert!(next.paid_at.is_none());

        let again = pay_bill(&pool, user, bill.id, PayBillRequest::default()).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills WHERE user_id = $1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn one_time_bill_has_no_next_occurrence(pool: DbPool) {
        let user = insert_test_user(&pool, "once@example.com").await;
        let mut request = monthly_rent();
        request.recurrence = None;
        let bill = create_bill(&pool, user, request).await.unwrap();

        let paid = pay_bill(&pool, user, bill.id, PayBillRequest::default()).await.unwrap();
        assert!(paid.next_bill.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn references_to_another_users_data_are_404(pool: DbPool) {
        let owner = insert_test_user(&pool, "owner@example.com").await;
        let intruder = insert_test_user(&pool, "intruder@example.com").await;

        let category: Uuid =
            sqlx::query_scalar("INSERT INTO categories (user_id, name) VALUES ($1, 'Private') RETURNING id")
                .bind(owner)
                .fetch_one(&pool)
                .await
                .unwrap();
        let method: Uuid = sqlx::query_scalar(
            "INSERT INTO payment_methods (user_id, name, type) VALUES ($1, 'Visa', 'credit') RETURNING id",
        )
        .bind(owner)
        .fetch_one(&pool)
        .await
        .unwrap();

        let mut request = monthly_rent();
        request.category_id = Some(category);
        let result = create_bill(&pool, intruder, request).await;
        assert!(matches!(result, Err(AppError::NotFound("category"))));

        let mut request = monthly_rent();
        request.payment_method_id = Some(method);
        let result = create_bill(&pool, intruder, request).await;
        assert!(matches!(result, Err(AppError::NotFound("payment_method"))));

        let own = create_bill(&pool, owner, monthly_rent()).await.unwrap();
        assert!(matches!(
            get_bill(&pool, intruder, own.id).await,
            Err(AppError::NotFound("bill"))
        ));
    }
}
