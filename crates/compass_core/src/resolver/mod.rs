//! Request-level entry points.
//!
//! Each operation opens one transaction, converts the wire input, calls the
//! services on `tx.conn()`, converts the result and commits. Any `?` before
//! the commit drops the transaction and rolls it back.

pub mod api;
pub mod application;
pub mod bundle;
pub mod entity_type_mapping;

use std::sync::Arc;

use crate::service::Services;
use crate::transaction::Transactioner;

pub use api::ApiDefinitionResolver;
pub use application::ApplicationResolver;
pub use bundle::BundleResolver;
pub use entity_type_mapping::EntityTypeMappingResolver;

/// Every resolver over one transactioner and service graph.
pub struct Resolvers<T: Transactioner> {
    pub applications: ApplicationResolver<T>,
    pub bundles: BundleResolver<T>,
    pub apis: ApiDefinitionResolver<T>,
    pub entity_type_mappings: EntityTypeMappingResolver<T>,
}

impl<T: Transactioner> Resolvers<T> {
    pub fn new(transactioner: Arc<T>, services: Arc<Services<T::Conn>>) -> Self {
        Self {
            applications: ApplicationResolver::new(Arc::clone(&transactioner), Arc::clone(&services)),
            bundles: BundleResolver::new(Arc::clone(&transactioner), Arc::clone(&services)),
            apis: ApiDefinitionResolver::new(Arc::clone(&transactioner), Arc::clone(&services)),
            entity_type_mappings: EntityTypeMappingResolver::new(transactioner, services),
        }
    }
}
