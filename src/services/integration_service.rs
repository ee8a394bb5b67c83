//! Integrations: connection records, credential sealing, mock syncs and
//! smart-assistant pairing.

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::integration::{
        ACCESS_TOKEN_FIELD, ConnectAssistantRequest, CreateIntegrationRequest,
        INTEGRATION_STATUSES, Integration, IntegrationKind, REDACTED, SyncResults,
        UpdateIntegrationRequest,
    },
    security::{
        sanitize::{Validator, escape_html, sanitize_value},
        signing::{generate_secure_token, open, seal},
    },
    services::scanner,
};

const INTEGRATION_COLUMNS: &str = "id, type, details, status, last_sync, created_at, updated_at";

pub const DEFAULT_DEVICE_NAME: &str = "Unknown Device";

/// Seal a plaintext `access_token`, then escape the remaining strings.
///
/// `previous` supplies the stored envelope when the client sends back the
/// redaction placeholder.
fn prepare_details(mut details: Value, previous: Option<&Value>, secret: &str) -> Value {
    let token = details
        .get(ACCESS_TOKEN_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);

    let sealed = match token.as_deref() {
        Some(REDACTED) => previous.and_then(|p| p.get(ACCESS_TOKEN_FIELD)).cloned(),
        Some(plain) => Some(Value::String(seal(plain, secret))),
        None => None,
    };

    if let Some(map) = details.as_object_mut() {
        map.remove(ACCESS_TOKEN_FIELD);
    }
    let mut details = sanitize_value(details);
    if let (Some(map), Some(sealed)) = (details.as_object_mut(), sealed) {
        map.insert(ACCESS_TOKEN_FIELD.to_string(), sealed);
    }
    details
}

/// Verify a stored credential. Details without a token pass.
fn verify_stored_token(details: &Value, secret: &str) -> Result<(), AppError> {
    match details.get(ACCESS_TOKEN_FIELD).and_then(Value::as_str) {
        Some(envelope) => open(envelope, secret)
            .map(|_| ())
            .map_err(|e| AppError::UnprocessableEntity(format!("Stored credentials are invalid: {e}"))),
        None => Ok(()),
    }
}

fn map_duplicate(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Integration of this type already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

pub async fn list(pool: &DbPool, user_id: Uuid) -> Result<Vec<Integration>, AppError> {
    let integrations = sqlx::query_as::<_, Integration>(&format!(
        "SELECT {INTEGRATION_COLUMNS} FROM user_integrations WHERE user_id = $1 ORDER BY type ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(integrations)
}

async fn get(pool: &DbPool, user_id: Uuid, integration_id: Uuid) -> Result<Integration, AppError> {
    sqlx::query_as::<_, Integration>(&format!(
        "SELECT {INTEGRATION_COLUMNS} FROM user_integrations WHERE id = $1 AND user_id = $2"
    ))
    .bind(integration_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("integration"))
}

pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateIntegrationRequest,
    signing_secret: &str,
) -> Result<Integration, AppError> {
    let mut v = Validator::new();
    v.required("type", request.kind.as_deref())
        .one_of("type", request.kind.as_deref(), &IntegrationKind::ALL)
        .present("details", request.details.as_ref())
        .one_of("status", request.status.as_deref(), &INTEGRATION_STATUSES);
    if let Some(details) = &request.details {
        v.check("details", details.is_object(), "must be an object");
    }
    v.finish()?;

    let details = prepare_details(request.details.unwrap_or_default(), None, signing_secret);
    let status = request.status.unwrap_or_else(|| "pending".to_string());

    let integration = sqlx::query_as::<_, Integration>(&format!(
        r#"
        INSERT INTO user_integrations (user_id, type, details, status)
        VALUES ($1, $2, $3, $4)
        RETURNING {INTEGRATION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(request.kind)
    .bind(details)
    .bind(status)
    .fetch_one(pool)
    .await
    .map_err(map_duplicate)?;

    tracing::info!(integration_id = %integration.id, kind = %integration.kind, "integration created");
    Ok(integration)
}

/// Replace details and/or status. Absent fields keep their stored values.
pub async fn update(
    pool: &DbPool,
    user_id: Uuid,
    integration_id: Uuid,
    request: UpdateIntegrationRequest,
    signing_secret: &str,
) -> Result<Integration, AppError> {
    let mut v = Validator::new();
    v.one_of("status", request.status.as_deref(), &INTEGRATION_STATUSES);
    if let Some(details) = &request.details {
        v.check("details", details.is_object(), "must be an object");
    }
    v.finish()?;

    let mut tx = pool.begin().await?;

    let stored: Value = sqlx::query_scalar(
        "SELECT details FROM user_integrations WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(integration_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("integration"))?;

    let details = request
        .details
        .map(|d| prepare_details(d, Some(&stored), signing_secret));

    let integration = sqlx::query_as::<_, Integration>(&format!(
        r#"
        UPDATE user_integrations
        SET details = COALESCE($1, details),
            status = COALESCE($2, status),
            updated_at = NOW()
        WHERE id = $3 AND user_id = $4
        RETURNING {INTEGRATION_COLUMNS}
        "#
    ))
    .bind(details)
    .bind(request.status)
    .bind(integration_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(integration)
}

pub async fn delete(pool: &DbPool, user_id: Uuid, integration_id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM user_integrations WHERE id = $1 AND user_id = $2")
        .bind(integration_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("integration"));
    }
    Ok(())
}

/// Run a (simulated) scan for new bills.
///
/// A stored credential that fails verification flips the integration to
/// `error` and aborts the sync with 422.
pub async fn sync(
    pool: &DbPool,
    user_id: Uuid,
    integration_id: Uuid,
    signing_secret: &str,
) -> Result<SyncResults, AppError> {
    let integration = get(pool, user_id, integration_id).await?;

    if let Err(e) = verify_stored_token(&integration.details, signing_secret) {
        sqlx::query("UPDATE user_integrations SET status = 'error', updated_at = NOW() WHERE id = $1")
            .bind(integration_id)
            .execute(pool)
            .await?;
        tracing::warn!(%integration_id, "sync aborted: credential envelope rejected");
        return Err(e);
    }

    let now = Utc::now();
    let results = match IntegrationKind::parse(&integration.kind) {
        Some(kind) => scanner::scan(kind, now),
        None => SyncResults {
            scanned: 0,
            found: 0,
            bills: Vec::new(),
        },
    };

    sqlx::query("UPDATE user_integrations SET last_sync = $1, updated_at = NOW() WHERE id = $2")
        .bind(now)
        .bind(integration_id)
        .execute(pool)
        .await?;

    tracing::info!(
        %integration_id,
        scanned = results.scanned,
        found = results.found,
        "integration synced"
    );
    Ok(results)
}

/// Pair a smart assistant, creating or refreshing its integration.
///
/// Returns the integration and whether it was newly created.
pub async fn connect_assistant(
    pool: &DbPool,
    user_id: Uuid,
    request: ConnectAssistantRequest,
) -> Result<(Integration, bool), AppError> {
    let kind = request.assistant_type.as_deref().and_then(IntegrationKind::parse);
    let mut v = Validator::new();
    v.required("assistant_type", request.assistant_type.as_deref())
        .check(
            "assistant_type",
            request.assistant_type.is_none() || kind.is_some_and(IntegrationKind::is_assistant),
            "must be one of: google_assistant, alexa",
        )
        .max_len("device_name", request.device_name.as_deref(), 100);
    v.finish()?;

    let kind = kind.map(IntegrationKind::as_str).unwrap_or_default();
    let device_name = request
        .device_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(|n| escape_html(&n))
        .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

    let details = json!({
        "device_name": device_name,
        "connected_at": Utc::now(),
        "connection_id": generate_secure_token(4),
    });

    let mut tx = pool.begin().await?;

    let existed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_integrations WHERE user_id = $1 AND type = $2)",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(&mut *tx)
    .await?;

    let integration = sqlx::query_as::<_, Integration>(&format!(
        r#"
        INSERT INTO user_integrations (user_id, type, details, status)
        VALUES ($1, $2, $3, 'active')
        ON CONFLICT (user_id, type)
        DO UPDATE SET details = EXCLUDED.details, status = 'active', updated_at = NOW()
        RETURNING {INTEGRATION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(kind)
    .bind(details)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(integration_id = %integration.id, kind, created = !existed, "smart assistant connected");
    Ok((integration, !existed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;

    const SECRET: &str = "integration-test-secret";

    #[test]
    fn plaintext_token_is_sealed() {
        let details = prepare_details(
            json!({ "access_token": "tok/123", "folder": "<Bills>" }),
            None,
            SECRET,
        );
        let envelope = details[ACCESS_TOKEN_FIELD].as_str().unwrap();
        assert_eq!(open(envelope, SECRET).unwrap(), "tok/123");
        assert_eq!(details["folder"], "&lt;Bills&gt;");
    }

    #[test]
    fn redacted_placeholder_keeps_stored_envelope() {
        let stored = json!({ "access_token": seal("original", SECRET) });
        let details = prepare_details(json!({ "access_token": REDACTED }), Some(&stored), SECRET);
        assert_eq!(details[ACCESS_TOKEN_FIELD], stored[ACCESS_TOKEN_FIELD]);
    }

    #[test]
    fn tampered_token_fails_verification() {
        let details = json!({ "access_token": seal("original", SECRET) });
        assert!(verify_stored_token(&details, SECRET).is_ok());
        assert!(matches!(
            verify_stored_token(&details, "another-secret"),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(verify_stored_token(&json!({ "email": "a@b.co" }), SECRET).is_ok());
    }

    fn dropbox() -> CreateIntegrationRequest {
        CreateIntegrationRequest {
            kind: Some("dropbox".to_string()),
            details: Some(json!({ "folder": "/Bills", "access_token": "sl.abc" })),
            status: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn duplicate_type_is_a_conflict(pool: DbPool) {
        let user = insert_test_user(&pool, "dup@example.com").await;
        let first = create(&pool, user, dropbox(), SECRET).await.unwrap();
        assert_eq!(first.status, "pending");

        let second = create(&pool, user, dropbox(), SECRET).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let other = insert_test_user(&pool, "other-dup@example.com").await;
        assert!(create(&pool, other, dropbox(), SECRET).await.is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn sync_with_foreign_envelope_marks_error(pool: DbPool) {
        let user = insert_test_user(&pool, "sync@example.com").await;
        let integration = create(&pool, user, dropbox(), SECRET).await.unwrap();

        assert!(sync(&pool, user, integration.id, SECRET).await.is_ok());
        let result = sync(&pool, user, integration.id, "rotated-secret").await;
        assert!(matches!(result, Err(AppError::UnprocessableEntity(_))));

        let stored = get(&pool, user, integration.id).await.unwrap();
        assert_eq!(stored.status, "error");
        assert!(stored.last_sync.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn reconnecting_an_assistant_updates_in_place(pool: DbPool) {
        let user = insert_test_user(&pool, "alexa@example.com").await;
        let connect = |device: Option<&str>| ConnectAssistantRequest {
            assistant_type: Some("alexa".to_string()),
            device_name: device.map(str::to_string),
        };

        let (first, created) = connect_assistant(&pool, user, connect(None)).await.unwrap();
        assert!(created);
        assert_eq!(first.details["device_name"], DEFAULT_DEVICE_NAME);

        let (second, created) = connect_assistant(&pool, user, connect(Some("Kitchen"))).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, "active");
        assert_eq!(second.details["device_name"], "Kitchen");
    }
}
