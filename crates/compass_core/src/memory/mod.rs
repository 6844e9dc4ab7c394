//! In-memory adapter for every repository port.
//!
//! Backs the unit tests of services, resolvers and the HTTP layer. The
//! adapter reproduces the observable behaviour of the SQL repositories:
//! access rows created for the owning tenant and its ancestors, parent
//! ownership checks on child creation, `NotFound` for rows hidden by
//! isolation, the destination upsert key and restrictive foreign keys.
//!
//! A transaction works on a snapshot of the store; `commit` writes the
//! snapshot back and dropping it discards every change.

mod director;
mod tenancy;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::model::{
    ApiDefinition, Application, Bundle, BundleReference, BusinessTenantMapping, Destination,
    EntityTypeMapping, EventDefinition, Label, Spec,
};
use crate::resource::ResourceType;
use crate::service::Repositories;
use crate::tenant::TenantId;
use crate::transaction::{Transaction, Transactioner};

pub use director::{
    MemoryApiRepository, MemoryApplicationRepository, MemoryBundleReferenceRepository,
    MemoryBundleRepository, MemoryEntityTypeMappingRepository, MemoryEventRepository,
    MemorySpecRepository,
};
pub use tenancy::{MemoryDestinationRepository, MemoryLabelRepository, MemoryTenantRepository};

const DELETE_RESTRICTED: &str = "The record cannot be deleted because another record refers to it";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TenantAccess {
    pub tenant_id: TenantId,
    pub id: Uuid,
    pub owner: bool,
}

/// Whole-store snapshot; the connection type of the in-memory adapter.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub(crate) tenants: Vec<BusinessTenantMapping>,
    pub(crate) tenant_applications: Vec<TenantAccess>,
    pub(crate) applications: Vec<Application>,
    pub(crate) bundles: Vec<Bundle>,
    pub(crate) apis: Vec<ApiDefinition>,
    pub(crate) events: Vec<EventDefinition>,
    pub(crate) specs: Vec<Spec>,
    pub(crate) bundle_references: Vec<BundleReference>,
    pub(crate) entity_type_mappings: Vec<EntityTypeMapping>,
    pub(crate) destinations: Vec<Destination>,
    pub(crate) labels: Vec<Label>,
}

impl MemoryState {
    /// `None` when the tenant has no access row, otherwise the owner flag.
    fn app_access(&self, tenant: TenantId, app_id: Uuid) -> Option<bool> {
        self.tenant_applications
            .iter()
            .find(|a| a.tenant_id == tenant && a.id == app_id)
            .map(|a| a.owner)
    }

    fn sees_app(&self, tenant: TenantId, app_id: Uuid, owner: bool) -> bool {
        self.app_access(tenant, app_id)
            .is_some_and(|is_owner| is_owner || !owner)
    }

    /// The tenant followed by its ancestors, as stored.
    fn tenant_chain(&self, tenant: TenantId) -> Vec<TenantId> {
        let mut chain = Vec::new();
        let mut current = self.tenants.iter().find(|t| t.id == tenant);
        while let Some(t) = current {
            if chain.contains(&t.id) {
                break;
            }
            chain.push(t.id);
            current = t.parent.and_then(|p| self.tenants.iter().find(|t| t.id == p));
        }
        chain
    }

    /// Application owning a child resource, used to resolve isolation.
    fn owning_app(&self, resource: ResourceType, id: Uuid) -> Option<Uuid> {
        match resource {
            ResourceType::Application => Some(id),
            ResourceType::Bundle => self
                .bundles
                .iter()
                .find(|b| b.id == id)
                .and_then(|b| b.application_id),
            ResourceType::Api => self
                .apis
                .iter()
                .find(|a| a.id == id)
                .and_then(|a| a.application_id),
            ResourceType::EventDefinition => self
                .events
                .iter()
                .find(|e| e.id == id)
                .and_then(|e| e.application_id),
            ResourceType::Specification => {
                let spec = self.specs.iter().find(|s| s.id == id)?;
                self.owning_app(spec.object_type.resource_type(), spec.object_id)
            }
            ResourceType::EntityTypeMapping => {
                let (parent, parent_id) = self
                    .entity_type_mappings
                    .iter()
                    .find(|m| m.id == id)?
                    .parent()?;
                self.owning_app(parent, parent_id)
            }
            _ => None,
        }
    }

    /// Whether `tenant` can see (or, with `owner`, modify) the resource.
    pub(crate) fn visible(&self, tenant: TenantId, resource: ResourceType, id: Uuid, owner: bool) -> bool {
        self.owning_app(resource, id)
            .is_some_and(|app_id| self.sees_app(tenant, app_id, owner))
    }

    /// Parent check performed before a tenant-scoped child insert.
    pub(crate) fn require_parent_owner(
        &self,
        tenant: TenantId,
        parent: ResourceType,
        parent_id: Uuid,
    ) -> Result<()> {
        if self.visible(tenant, parent, parent_id, true) {
            return Ok(());
        }
        Err(CompassError::Unauthorized(format!(
            "tenant {tenant} does not have access to the parent resource {parent} with ID {parent_id}"
        )))
    }

    /// Access rows for a new top-level application: the tenant and every ancestor.
    pub(crate) fn grant_app_access(&mut self, tenant: TenantId, app_id: Uuid) {
        for tenant_id in self.tenant_chain(tenant) {
            self.tenant_applications.push(TenantAccess {
                tenant_id,
                id: app_id,
                owner: true,
            });
        }
    }

    pub(crate) fn delete_restricted() -> CompassError {
        CompassError::InvalidData(DELETE_RESTRICTED.into())
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn bundle_references(&self) -> &[BundleReference] {
        &self.bundle_references
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn entity_type_mappings(&self) -> &[EntityTypeMapping] {
        &self.entity_type_mappings
    }
}

/// Shared in-memory store handing out snapshot transactions.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactioner {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransactioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

pub struct MemoryTransaction {
    store: Arc<Mutex<MemoryState>>,
    working: MemoryState,
}

#[async_trait]
impl Transactioner for MemoryTransactioner {
    type Conn = MemoryState;
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        let working = self.state.lock().await.clone();
        Ok(MemoryTransaction {
            store: Arc::clone(&self.state),
            working,
        })
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    type Conn = MemoryState;

    fn conn(&mut self) -> &mut MemoryState {
        &mut self.working
    }

    async fn commit(self) -> Result<()> {
        *self.store.lock().await = self.working;
        Ok(())
    }
}

/// Every port backed by the in-memory adapter.
pub fn repositories() -> Repositories<MemoryState> {
    Repositories {
        applications: Arc::new(MemoryApplicationRepository),
        bundles: Arc::new(MemoryBundleRepository),
        apis: Arc::new(MemoryApiRepository),
        events: Arc::new(MemoryEventRepository),
        bundle_references: Arc::new(MemoryBundleReferenceRepository),
        specs: Arc::new(MemorySpecRepository),
        entity_type_mappings: Arc::new(MemoryEntityTypeMappingRepository),
        destinations: Arc::new(MemoryDestinationRepository),
        labels: Arc::new(MemoryLabelRepository),
        tenants: Arc::new(MemoryTenantRepository),
    }
}
