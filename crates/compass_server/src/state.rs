use std::sync::Arc;

use compass_core::resolver::Resolvers;
use compass_core::service::DestinationService;
use compass_core::tenant::RequestScope;
use compass_core::transaction::Transactioner;

use crate::error::AppError;
use crate::middleware::jwt::Principal;

/// Shared handler state, generic over the storage adapter.
pub struct AppState<T: Transactioner> {
    pub resolvers: Resolvers<T>,
    pub destinations: Arc<DestinationService<T>>,
}

impl<T: Transactioner> AppState<T> {
    pub fn new(resolvers: Resolvers<T>, destinations: Arc<DestinationService<T>>) -> Self {
        Self {
            resolvers,
            destinations,
        }
    }

    /// Request scope for the token's external tenant.
    pub async fn scope_for(&self, principal: &Principal) -> Result<RequestScope, AppError> {
        let external = principal.tenant()?;
        let tenant = self.destinations.resolve_tenant(external).await.map_err(|e| {
            if e.is_not_found() {
                AppError::BadRequest(format!("tenant {external} is not known"))
            } else {
                AppError::from(e)
            }
        })?;
        Ok(RequestScope::for_tenant(tenant).with_external_tenant(external))
    }
}
