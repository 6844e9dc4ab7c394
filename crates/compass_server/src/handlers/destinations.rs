//! Destination fetcher handlers.
//!
//! PUT <root>/destinations           : sync the caller's tenant destinations
//! GET <root>/destinations/sensitive : credentials of the `name` destinations

use std::sync::Arc;

use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::{Extension, Json};
use compass_core::tenant::TenantId;
use compass_core::transaction::Transactioner;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::error::AppError;
use crate::middleware::jwt::{Principal, SCOPE_DESTINATIONS_SYNC, SCOPE_SENSITIVE_DATA_READ};
use crate::state::AppState;

pub async fn sync_tenant_destinations<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
) -> Result<StatusCode, AppError> {
    principal.require_scope(SCOPE_DESTINATIONS_SYNC)?;
    let scope = state.scope_for(&principal).await?;
    let tenant = scope.tenant()?;
    require_subscribed(&state, tenant).await?;

    state
        .destinations
        .sync_tenant_destinations(tenant)
        .await
        .map_err(|e| {
            error!(%tenant, error = %e, "failed to sync destinations");
            if e.is_not_found() {
                AppError::BadRequest(e.to_string())
            } else {
                AppError::Internal(format!("Failed to sync destinations for tenant {tenant}"))
            }
        })?;

    info!(%tenant, "synced destinations on request");
    Ok(StatusCode::OK)
}

pub async fn fetch_destinations_sensitive_data<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    RawQuery(query): RawQuery,
) -> Result<Json<JsonValue>, AppError> {
    principal.require_scope(SCOPE_SENSITIVE_DATA_READ)?;
    let names = destination_names(query.as_deref());
    if names.is_empty() {
        return Err(AppError::BadRequest("missing query parameter 'name'".into()));
    }

    let scope = state.scope_for(&principal).await?;
    let tenant = scope.tenant()?;
    require_subscribed(&state, tenant).await?;

    let data = state
        .destinations
        .fetch_destinations_sensitive_data(tenant, &names)
        .await
        .map_err(|e| {
            error!(%tenant, ?names, error = %e, "failed to fetch destinations sensitive data");
            if e.is_not_found() {
                AppError::from(e)
            } else {
                AppError::Internal(format!("Failed to fetch sensitive data for destinations {names:?}"))
            }
        })?;
    Ok(Json(data))
}

async fn require_subscribed<T: Transactioner>(state: &AppState<T>, tenant: TenantId) -> Result<(), AppError> {
    if state.destinations.is_tenant_subscribed(tenant).await? {
        return Ok(());
    }
    Err(AppError::BadRequest(format!("tenant {tenant} is not subscribed")))
}

/// Every non-empty `name` query value, in order.
fn destination_names(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, value)| key == "name" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .collect()
}
