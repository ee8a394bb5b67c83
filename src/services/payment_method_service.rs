//! Payment methods and the one-default-per-user rule.
//!
//! Every write that can change which method is the default runs in a
//! transaction that first clears the other defaults, so the partial unique
//! index on `(user_id) WHERE is_default` is never violated.

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        payment_method::{PAYMENT_METHOD_TYPES, PaymentMethod, PaymentMethodRequest},
        stats::{PaymentMethodBreakdown, apply_percentages},
    },
    security::sanitize::{Validator, escape_html, sanitize_value},
};

const PM_COLUMNS: &str = "id, name, type, details, is_default, created_at, updated_at";

#[derive(Debug)]
struct ValidPaymentMethod {
    name: String,
    method_type: String,
    details: serde_json::Value,
    is_default: bool,
}

fn validate(request: PaymentMethodRequest) -> Result<ValidPaymentMethod, AppError> {
    let mut v = Validator::new();
    v.required("name", request.name.as_deref())
        .max_len("name", request.name.as_deref(), 100)
        .required("type", request.method_type.as_deref())
        .one_of("type", request.method_type.as_deref(), &PAYMENT_METHOD_TYPES)
        .present("details", request.details.as_ref());
    if let Some(details) = &request.details {
        v.check("details", details.is_object(), "must be an object");
    }
    v.finish()?;

    Ok(ValidPaymentMethod {
        name: escape_html(request.name.as_deref().unwrap_or_default().trim()),
        method_type: request.method_type.unwrap_or_default(),
        details: sanitize_value(request.details.unwrap_or_default()),
        is_default: request.is_default,
    })
}

async fn clear_default(conn: &mut PgConnection, user_id: Uuid, except: Option<Uuid>) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE payment_methods
        SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_default AND ($2::UUID IS NULL OR id <> $2)
        "#,
    )
    .bind(user_id)
    .bind(except)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list(pool: &DbPool, user_id: Uuid) -> Result<Vec<PaymentMethod>, AppError> {
    let methods = sqlx::query_as::<_, PaymentMethod>(&format!(
        "SELECT {PM_COLUMNS} FROM payment_methods WHERE user_id = $1 ORDER BY is_default DESC, name ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(methods)
}

pub async fn create(pool: &DbPool, user_id: Uuid, request: PaymentMethodRequest) -> Result<PaymentMethod, AppError> {
    let method = validate(request)?;

    let mut tx = pool.begin().await?;
    if method.is_default {
        clear_default(&mut *tx, user_id, None).await?;
    }

    let created = sqlx::query_as::<_, PaymentMethod>(&format!(
        r#"
        INSERT INTO payment_methods (user_id, name, type, details, is_default)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PM_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&method.name)
    .bind(&method.method_type)
    .bind(&method.details)
    .bind(method.is_default)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(created)
}

pub async fn update(
    pool: &DbPool,
    user_id: Uuid,
    method_id: Uuid,
    request: PaymentMethodRequest,
) -> Result<PaymentMethod, AppError> {
    let method = validate(request)?;

    let mut tx = pool.begin().await?;
    if method.is_default {
        clear_default(&mut *tx, user_id, Some(method_id)).await?;
    }

    let updated = sqlx::query_as::<_, PaymentMethod>(&format!(
        r#"
        UPDATE payment_methods
        SET name = $1, type = $2, details = $3, is_default = $4, updated_at = NOW()
        WHERE id = $5 AND user_id = $6
        RETURNING {PM_COLUMNS}
        "#
    ))
    .bind(&method.name)
    .bind(&method.method_type)
    .bind(&method.details)
    .bind(method.is_default)
    .bind(method_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    match updated {
        Some(updated) => {
            tx.commit().await?;
            Ok(updated)
        }
        None => {
            tx.rollback().await?;
            Err(AppError::NotFound("payment_method"))
        }
    }
}

/// Delete a method, detach it from bills and, if it was the default,
/// promote the oldest remaining method.
pub async fn delete(pool: &DbPool, user_id: Uuid, method_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let was_default: bool = sqlx::query_scalar(
        "SELECT is_default FROM payment_methods WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(method_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("payment_method"))?;

    sqlx::query(
        "UPDATE bills SET payment_method_id = NULL, updated_at = NOW() WHERE payment_method_id = $1 AND user_id = $2",
    )
    .bind(method_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM payment_methods WHERE id = $1 AND user_id = $2")
        .bind(method_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if was_default {
        let promoted: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE payment_methods
            SET is_default = TRUE, updated_at = NOW()
            WHERE id = (
                SELECT id FROM payment_methods
                WHERE user_id = $1
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tracing::info!(%method_id, ?promoted, "default payment method deleted");
    }

    tx.commit().await?;
    Ok(())
}

/// Spending per payment method since `start`, with each method's share.
pub async fn statistics(
    pool: &DbPool,
    user_id: Uuid,
    start: NaiveDate,
) -> Result<(Vec<PaymentMethodBreakdown>, i64), AppError> {
    let mut rows = sqlx::query_as::<_, PaymentMethodBreakdown>(
        r#"
        SELECT pm.id, pm.name, pm.type,
               COALESCE(SUM(b.amount_cents), 0)::BIGINT AS total,
               COUNT(b.id) AS bill_count,
               COALESCE(SUM(b.amount_cents) FILTER (WHERE b.status = 'paid'), 0)::BIGINT AS paid,
               COALESCE(SUM(b.amount_cents) FILTER (WHERE b.status = 'unpaid'), 0)::BIGINT AS unpaid
        FROM payment_methods pm
        LEFT JOIN bills b ON pm.id = b.payment_method_id AND b.due_date >= $1
        WHERE pm.user_id = $2
        GROUP BY pm.id
        ORDER BY total DESC, pm.name ASC
        "#,
    )
    .bind(start)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let total_amount = apply_percentages(&mut rows, |r| r.total, |r, p| r.percentage = p);
    Ok((rows, total_amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use serde_json::json;

    fn request(method_type: &str, details: Option<serde_json::Value>) -> PaymentMethodRequest {
        PaymentMethodRequest {
            name: Some("Visa".to_string()),
            method_type: Some(method_type.to_string()),
            details,
            is_default: true,
        }
    }

    #[test]
    fn accepts_known_type_with_object_details() {
        let method = validate(request("credit", Some(json!({ "last4": "4567" })))).unwrap();
        assert_eq!(method.method_type, "credit");
        assert!(method.is_default);
        assert_eq!(method.details["last4"], "4567");
    }

    #[test]
    fn rejects_unknown_type_and_non_object_details() {
        match validate(request("barter", Some(json!("card")))) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.starts_with("type must be one of")));
                assert!(errors.contains(&"details must be an object".to_string()));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn details_are_required() {
        assert!(matches!(
            validate(request("cash", None)),
            Err(AppError::Validation(_))
        ));
    }

    fn named(name: &str, is_default: bool) -> PaymentMethodRequest {
        PaymentMethodRequest {
            name: Some(name.to_string()),
            method_type: Some("debit".to_string()),
            details: Some(json!({})),
            is_default,
        }
    }

    async fn defaults(pool: &DbPool, user_id: Uuid) -> Vec<String> {
        list(pool, user_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_default)
            .map(|m| m.name)
            .collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn new_default_replaces_the_old_one(pool: DbPool) {
        let user = insert_test_user(&pool, "pm@example.com").await;
        let first = create(&pool, user, named("First", true)).await.unwrap();
        create(&pool, user, named("Second", true)).await.unwrap();
        assert_eq!(defaults(&pool, user).await, vec!["Second".to_string()]);

        update(&pool, user, first.id, named("First", true)).await.unwrap();
        assert_eq!(defaults(&pool, user).await, vec!["First".to_string()]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn deleting_the_default_promotes_the_oldest(pool: DbPool) {
        let user = insert_test_user(&pool, "promote@example.com").await;
        let doomed = create(&pool, user, named("Doomed", true)).await.unwrap();
        create(&pool, user, named("Older", false)).await.unwrap();
        create(&pool, user, named("Newer", false)).await.unwrap();

        delete(&pool, user, doomed.id).await.unwrap();
        assert_eq!(defaults(&pool, user).await, vec!["Older".to_string()]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn deleting_a_method_detaches_its_bills(pool: DbPool) {
        let user = insert_test_user(&pool, "detach@example.com").await;
        let method = create(&pool, user, named("Card", false)).await.unwrap();
        let bill_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bills (user_id, name, amount_cents, due_date, payment_method_id, status)
            VALUES ($1, 'Phone', 4500, '2025-05-01', $2, 'unpaid')
            RETURNING id
            "#,
        )
        .bind(user)
        .bind(method.id)
        .fetch_one(&pool)
        .await
        .unwrap();

        delete(&pool, user, method.id).await.unwrap();

        let attached: Option<Uuid> = sqlx::query_scalar("SELECT payment_method_id FROM bills WHERE id = $1")
            .bind(bill_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(attached, None);
        assert!(matches!(
            delete(&pool, user, method.id).await,
            Err(AppError::NotFound("payment_method"))
        ));
    }
}
