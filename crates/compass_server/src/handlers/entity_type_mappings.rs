//! POST   /apis/:id/entity-type-mappings
//! GET    /apis/:id/entity-type-mappings : paged
//! DELETE /entity-type-mappings/:id

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use compass_core::graphql::{EntityTypeMapping, EntityTypeMappingInput, EntityTypeMappingPage};
use compass_core::resource::ResourceType;
use compass_core::transaction::Transactioner;
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppError;
use crate::middleware::jwt::Principal;
use crate::state::AppState;

pub async fn add_for_api<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(api_id): Path<Uuid>,
    Json(input): Json<EntityTypeMappingInput>,
) -> Result<(StatusCode, Json<EntityTypeMapping>), AppError> {
    let scope = state.scope_for(&principal).await?;
    let mapping = state
        .resolvers
        .entity_type_mappings
        .add_entity_type_mapping(&scope, ResourceType::Api, api_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

pub async fn list_for_api<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(api_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<EntityTypeMappingPage>, AppError> {
    let scope = state.scope_for(&principal).await?;
    let page = state
        .resolvers
        .entity_type_mappings
        .entity_type_mappings_for_api(&scope, api_id, page.first, &page.after)
        .await?;
    Ok(Json(page))
}

pub async fn delete<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntityTypeMapping>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.entity_type_mappings.delete_entity_type_mapping(&scope, id).await?))
}
