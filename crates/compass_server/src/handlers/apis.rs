//! POST   /bundles/:id/apis : create an API definition in the bundle
//! GET    /bundles/:id/apis : one page of the bundle's API definitions
//! GET    /apis/:id
//! PUT    /apis/:id         : full replace
//! DELETE /apis/:id

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use compass_core::graphql::{ApiDefinition, ApiDefinitionInput, ApiDefinitionPage};
use compass_core::transaction::Transactioner;
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppError;
use crate::middleware::jwt::Principal;
use crate::state::AppState;

pub async fn add_to_bundle<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(bundle_id): Path<Uuid>,
    Json(input): Json<ApiDefinitionInput>,
) -> Result<(StatusCode, Json<ApiDefinition>), AppError> {
    let scope = state.scope_for(&principal).await?;
    let api = state
        .resolvers
        .apis
        .add_api_definition_to_bundle(&scope, bundle_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(api)))
}

pub async fn list_for_bundle<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(bundle_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiDefinitionPage>, AppError> {
    let scope = state.scope_for(&principal).await?;
    let page = state
        .resolvers
        .apis
        .apis_for_bundle(&scope, bundle_id, page.first, &page.after)
        .await?;
    Ok(Json(page))
}

pub async fn get<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiDefinition>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.apis.api_definition(&scope, id).await?))
}

pub async fn update<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
    Json(input): Json<ApiDefinitionInput>,
) -> Result<Json<ApiDefinition>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.apis.update_api_definition(&scope, id, &input).await?))
}

pub async fn delete<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiDefinition>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.apis.delete_api_definition(&scope, id).await?))
}
