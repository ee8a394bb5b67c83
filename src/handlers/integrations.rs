//! Integration endpoints under `/api/v1/integrations`.
//!
//! Responses never carry a stored `access_token`; see
//! [`IntegrationResponse`].

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::extract::JsonBody,
    middleware::auth::AuthUser,
    models::integration::{
        ConnectAssistantRequest, CreateIntegrationRequest, IntegrationResponse, UpdateIntegrationRequest,
    },
    services::integration_service,
    state::AppState,
};

pub async fn list_integrations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let integrations: Vec<IntegrationResponse> = integration_service::list(&state.pool, auth.user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(json!({ "integrations": integrations })))
}

/// Connect an integration.
///
/// # Request Body
///
/// ```json
/// { "type": "dropbox", "details": { "folder": "/Bills", "access_token": "sl.B2x..." } }
/// ```
///
/// # Errors
///
/// 409 if the caller already has an integration of this type.
pub async fn create_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<CreateIntegrationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let integration = integration_service::create(
        &state.pool,
        auth.user_id,
        request,
        &state.config.data_signing_secret,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Integration created successfully",
            "integration": IntegrationResponse::from(integration),
        })),
    ))
}

pub async fn update_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(integration_id): Path<Uuid>,
    JsonBody(request): JsonBody<UpdateIntegrationRequest>,
) -> Result<Json<Value>, AppError> {
    let integration = integration_service::update(
        &state.pool,
        auth.user_id,
        integration_id,
        request,
        &state.config.data_signing_secret,
    )
    .await?;
    Ok(Json(json!({
        "message": "Integration updated successfully",
        "integration": IntegrationResponse::from(integration),
    })))
}

pub async fn delete_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    integration_service::delete(&state.pool, auth.user_id, integration_id).await?;
    Ok(Json(json!({ "message": "Integration deleted successfully" })))
}

/// Scan the connected source for bills.
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Sync completed successfully",
///   "results": {
///     "scanned": 15,
///     "found": 3,
///     "bills": [
///       {
///         "subject": "Your Electric Bill for April 2025",
///         "from": "billing@acmeutilities.com",
///         "date": "2025-04-08T10:00:00Z",
///         "extracted": { "vendor": "ACME Utilities", "amount_cents": 8550, "due_date": "2025-04-15" }
///       }
///     ]
///   }
/// }
/// ```
pub async fn sync_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let results = integration_service::sync(
        &state.pool,
        auth.user_id,
        integration_id,
        &state.config.data_signing_secret,
    )
    .await?;
    Ok(Json(json!({ "message": "Sync completed successfully", "results": results })))
}

/// Pair Google Assistant or Alexa.
pub async fn connect_smart_assistant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(request): JsonBody<ConnectAssistantRequest>,
) -> Result<Json<Value>, AppError> {
    let (integration, created) = integration_service::connect_assistant(&state.pool, auth.user_id, request).await?;
    let message = if created {
        "Smart assistant connected successfully"
    } else {
        "Smart assistant connection updated"
    };
    Ok(Json(json!({
        "message": message,
        "integration": IntegrationResponse::from(integration),
    })))
}
