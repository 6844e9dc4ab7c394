//! POST   /applications/:id/bundles : add a bundle to an application
//! GET    /applications/:id/bundles : list the application's bundles
//! GET    /bundles/:id
//! PUT    /bundles/:id
//! DELETE /bundles/:id              : delete with its definitions

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use compass_core::graphql::{Bundle, BundleCreateInput, BundleUpdateInput};
use compass_core::transaction::Transactioner;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::jwt::Principal;
use crate::state::AppState;

pub async fn add<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(application_id): Path<Uuid>,
    Json(input): Json<BundleCreateInput>,
) -> Result<(StatusCode, Json<Bundle>), AppError> {
    let scope = state.scope_for(&principal).await?;
    let bundle = state.resolvers.bundles.add_bundle(&scope, application_id, &input).await?;
    Ok((StatusCode::CREATED, Json(bundle)))
}

pub async fn list_for_application<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<Bundle>>, AppError> {
    let scope = state.scope_for(&principal).await?;
    let bundles = state
        .resolvers
        .bundles
        .bundles_for_application(&scope, application_id)
        .await?;
    Ok(Json(bundles))
}

pub async fn get<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bundle>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.bundles.bundle(&scope, id).await?))
}

pub async fn update<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
    Json(input): Json<BundleUpdateInput>,
) -> Result<Json<Bundle>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.bundles.update_bundle(&scope, id, &input).await?))
}

pub async fn delete<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bundle>, AppError> {
    let scope = state.scope_for(&principal).await?;
    Ok(Json(state.resolvers.bundles.delete_bundle(&scope, id).await?))
}
