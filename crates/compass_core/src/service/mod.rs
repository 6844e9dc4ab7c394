//! Tenant-scoped business rules. Services never open transactions; they run
//! on the connection of the caller's transaction and read the tenant from
//! the explicit `RequestScope`.

pub mod api;
pub mod application;
pub mod bundle;
pub mod bundle_reference;
pub mod destination;
pub mod entity_type_mapping;
pub mod event;
pub mod spec;

pub use api::ApiService;
pub use application::ApplicationService;
pub use bundle::BundleService;
pub use bundle_reference::BundleReferenceService;
pub use destination::{DestinationService, DestinationSyncConfig};
pub use entity_type_mapping::EntityTypeMappingService;
pub use event::EventService;
pub use spec::SpecService;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::ports::{
    ApiRepository, ApplicationRepository, BundleReferenceRepository, BundleRepository,
    DestinationRepository, EntityTypeMappingRepository, EventRepository, LabelRepository,
    SpecRepository, TenantRepository,
};
use crate::resource::ResourceType;
use crate::tenant::TenantId;
use crate::uid::UidService;

/// One adapter per port, all bound to the same connection type.
pub struct Repositories<C: Send> {
    pub applications: Arc<dyn ApplicationRepository<C>>,
    pub bundles: Arc<dyn BundleRepository<C>>,
    pub apis: Arc<dyn ApiRepository<C>>,
    pub events: Arc<dyn EventRepository<C>>,
    pub bundle_references: Arc<dyn BundleReferenceRepository<C>>,
    pub specs: Arc<dyn SpecRepository<C>>,
    pub entity_type_mappings: Arc<dyn EntityTypeMappingRepository<C>>,
    pub destinations: Arc<dyn DestinationRepository<C>>,
    pub labels: Arc<dyn LabelRepository<C>>,
    pub tenants: Arc<dyn TenantRepository<C>>,
}

impl<C: Send> Clone for Repositories<C> {
    fn clone(&self) -> Self {
        Self {
            applications: Arc::clone(&self.applications),
            bundles: Arc::clone(&self.bundles),
            apis: Arc::clone(&self.apis),
            events: Arc::clone(&self.events),
            bundle_references: Arc::clone(&self.bundle_references),
            specs: Arc::clone(&self.specs),
            entity_type_mappings: Arc::clone(&self.entity_type_mappings),
            destinations: Arc::clone(&self.destinations),
            labels: Arc::clone(&self.labels),
            tenants: Arc::clone(&self.tenants),
        }
    }
}

/// The service graph, wired bottom-up from a set of repositories.
pub struct Services<C: Send> {
    pub applications: Arc<ApplicationService<C>>,
    pub bundles: Arc<BundleService<C>>,
    pub apis: Arc<ApiService<C>>,
    pub events: Arc<EventService<C>>,
    pub bundle_references: Arc<BundleReferenceService<C>>,
    pub specs: Arc<SpecService<C>>,
    pub entity_type_mappings: Arc<EntityTypeMappingService<C>>,
}

impl<C: Send> Services<C> {
    pub fn new(repos: &Repositories<C>, uid: Arc<dyn UidService>) -> Self {
        let specs = Arc::new(SpecService::new(Arc::clone(&repos.specs), Arc::clone(&uid)));
        let bundle_references = Arc::new(BundleReferenceService::new(
            Arc::clone(&repos.bundle_references),
            Arc::clone(&uid),
        ));
        let entity_type_mappings = Arc::new(EntityTypeMappingService::new(
            Arc::clone(&repos.entity_type_mappings),
            Arc::clone(&uid),
        ));
        let apis = Arc::new(
            ApiService::new(
                Arc::clone(&repos.apis),
                Arc::clone(&repos.bundles),
                Arc::clone(&specs),
                Arc::clone(&bundle_references),
                Arc::clone(&uid),
            )
            .with_entity_type_mappings(Arc::clone(&repos.entity_type_mappings)),
        );
        let events = Arc::new(EventService::new(
            Arc::clone(&repos.events),
            Arc::clone(&repos.bundles),
            Arc::clone(&specs),
            Arc::clone(&bundle_references),
            Arc::clone(&uid),
        ));
        let bundles = Arc::new(BundleService::new(
            Arc::clone(&repos.bundles),
            Arc::clone(&apis),
            Arc::clone(&events),
            Arc::clone(&bundle_references),
            Arc::clone(&uid),
        ));
        let applications = Arc::new(ApplicationService::new(
            Arc::clone(&repos.applications),
            Arc::clone(&bundles),
            Arc::clone(&apis),
            uid,
        ));
        Self {
            applications,
            bundles,
            apis,
            events,
            bundle_references,
            specs,
            entity_type_mappings,
        }
    }
}

/// Fails with `NotFound` for the first bundle the tenant cannot see, so
/// listings keyed by bundle never describe another tenant's rows.
pub(crate) async fn require_visible_bundles<C: Send>(
    bundles: &dyn BundleRepository<C>,
    conn: &mut C,
    tenant: TenantId,
    bundle_ids: &[Uuid],
) -> Result<()> {
    for &bundle_id in bundle_ids {
        if !bundles.exists(conn, tenant, bundle_id).await? {
            return Err(CompassError::not_found(ResourceType::Bundle, bundle_id));
        }
    }
    Ok(())
}
