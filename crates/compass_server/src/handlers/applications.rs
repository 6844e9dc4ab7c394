//! POST /applications     : register an application for the caller's tenant
//! GET  /applications/:id : fetch one application

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use compass_core::error::CompassError;
use compass_core::graphql::{Application, ApplicationRegisterInput};
use compass_core::resource::ResourceType;
use compass_core::transaction::Transactioner;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::jwt::Principal;
use crate::state::AppState;

pub async fn register<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Json(input): Json<ApplicationRegisterInput>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let scope = state.scope_for(&principal).await?;
    let app = state.resolvers.applications.register_application(&scope, &input).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

pub async fn get<T: Transactioner + 'static>(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<Arc<AppState<T>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    let scope = state.scope_for(&principal).await?;
    state
        .resolvers
        .applications
        .application(&scope, id)
        .await?
        .map(Json)
        .ok_or_else(|| CompassError::not_found(ResourceType::Application, id).into())
}
