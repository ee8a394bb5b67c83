//! Category management and per-category analytics.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        category::{Category, CategoryRequest, DEFAULT_COLOR, DEFAULT_ICON, FALLBACK_CATEGORY},
        stats::{CategoryBreakdown, apply_percentages},
    },
    security::sanitize::{Validator, escape_html, is_hex_color},
};

const CATEGORY_COLUMNS: &str = "id, name, color, icon, created_at, updated_at";

/// Validated name, color, icon.
fn validate(request: CategoryRequest) -> Result<(String, String, String), AppError> {
    let color = request
        .color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let icon = request
        .icon
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_string());

    let mut v = Validator::new();
    v.required("name", request.name.as_deref())
        .max_len("name", request.name.as_deref(), 50)
        .check("color", is_hex_color(&color), "must be a #RRGGBB hex color")
        .max_len("icon", Some(icon.as_str()), 50);
    v.finish()?;

    let name = escape_html(request.name.as_deref().unwrap_or_default().trim());
    Ok((name, color, escape_html(&icon)))
}

pub async fn list(pool: &DbPool, user_id: Uuid) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = $1 ORDER BY name ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

pub async fn create(pool: &DbPool, user_id: Uuid, request: CategoryRequest) -> Result<Category, AppError> {
    let (name, color, icon) = validate(request)?;

    let category = sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (user_id, name, color, icon) VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .bind(color)
    .bind(icon)
    .fetch_one(pool)
    .await?;
    Ok(category)
}

pub async fn update(
    pool: &DbPool,
    user_id: Uuid,
    category_id: Uuid,
    request: CategoryRequest,
) -> Result<Category, AppError> {
    let (name, color, icon) = validate(request)?;

    sqlx::query_as::<_, Category>(&format!(
        r#"
        UPDATE categories
        SET name = $1, color = $2, icon = $3, updated_at = NOW()
        WHERE id = $4 AND user_id = $5
        RETURNING {CATEGORY_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(color)
    .bind(icon)
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("category"))
}

/// Delete a category, moving its bills to the user's "Other" category.
///
/// If "Other" is the category being deleted, or does not exist, the bills
/// end up uncategorized.
pub async fn delete(pool: &DbPool, user_id: Uuid, category_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let locked: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(category_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        tx.rollback().await?;
        return Err(AppError::NotFound("category"));
    }

    let fallback: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM categories WHERE user_id = $1 AND name = $2 AND id <> $3 ORDER BY created_at LIMIT 1",
    )
    .bind(user_id)
    .bind(FALLBACK_CATEGORY)
    .bind(category_id)
    .fetch_optional(&mut *tx)
    .await?;

    let moved = sqlx::query(
        "UPDATE bills SET category_id = $1, updated_at = NOW() WHERE category_id = $2 AND user_id = $3",
    )
    .bind(fallback)
    .bind(category_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
        .bind(category_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if moved > 0 {
        tracing::info!(%category_id, moved, reassigned_to = ?fallback, "category deleted, bills reassigned");
    }
    Ok(())
}

/// Spending per category since `start`, with each category's share.
pub async fn statistics(
    pool: &DbPool,
    user_id: Uuid,
    start: NaiveDate,
) -> Result<(Vec<CategoryBreakdown>, i64), AppError> {
    let mut rows = sqlx::query_as::<_, CategoryBreakdown>(
        r#"
        SELECT c.id, c.name, c.color, c.icon,
               COALESCE(SUM(b.amount_cents), 0)::BIGINT AS total,
               COUNT(b.id) AS bill_count,
               COALESCE(SUM(b.amount_cents) FILTER (WHERE b.status = 'paid'), 0)::BIGINT AS paid,
               COALESCE(SUM(b.amount_cents) FILTER (WHERE b.status = 'unpaid'), 0)::BIGINT AS unpaid
        FROM categories c
        LEFT JOIN bills b ON c.id = b.category_id AND b.due_date >= $1
        WHERE c.user_id = $2
        GROUP BY c.id
        ORDER BY total DESC, c.name ASC
        "#,
    )
    .bind(start)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let total_amount = apply_percentages(&mut rows, |r| r.total, |r, p| r.percentage = p);
    Ok((rows, total_amount))
}
