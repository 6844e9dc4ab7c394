//! Port traits. Core logic depends only on these; `compass_postgres`
//! implements them over `PgConnection`, `crate::memory` over an in-memory
//! snapshot.
//!
//! Every method takes the connection of the caller's open transaction as
//! `conn`. Tenant-scoped methods apply isolation; `*_global` methods are
//! only used for tenant-ignorable owners.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    ApiDefinition, ApiDefinitionPage, Application, Bundle, BundleReference,
    BundleReferenceObjectType, BusinessTenantMapping, Destination, DestinationFromService,
    DestinationInput,
    EntityTypeMapping, EventDefinition, EventDefinitionPage, Label, LabelableObject, Spec,
    SpecReferenceObjectType,
};
use crate::pagination::Page;
use crate::resource::ResourceType;
use crate::tenant::TenantId;

#[async_trait]
pub trait ApplicationRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &Application) -> Result<()>;
    async fn get_by_id(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<Application>;
    async fn exists(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<bool>;
    async fn list(&self, conn: &mut C, tenant: TenantId) -> Result<Vec<Application>>;
    async fn delete(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait BundleRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &Bundle) -> Result<()>;
    async fn get_by_id(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<Bundle>;
    async fn exists(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<bool>;
    async fn list_by_application_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<Bundle>>;
    /// Bundles of the system a destination points at, matched by correlation ID.
    async fn list_by_destination(
        &self,
        conn: &mut C,
        tenant: TenantId,
        destination: &DestinationInput,
    ) -> Result<Vec<Bundle>>;
    async fn update(&self, conn: &mut C, tenant: TenantId, item: &Bundle) -> Result<()>;
    async fn delete(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ApiRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &ApiDefinition) -> Result<()>;
    async fn create_global(&self, conn: &mut C, item: &ApiDefinition) -> Result<()>;
    async fn get_by_id(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<ApiDefinition>;
    async fn get_by_id_global(&self, conn: &mut C, id: Uuid) -> Result<ApiDefinition>;
    async fn get_for_bundle(
        &self,
        conn: &mut C,
        tenant: TenantId,
        id: Uuid,
        bundle_id: Uuid,
    ) -> Result<ApiDefinition>;
    async fn exists(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<bool>;
    /// Second phase of a per-bundle page: rows for already-selected references.
    #[allow(clippy::too_many_arguments)]
    async fn list_by_bundle_ids(
        &self,
        conn: &mut C,
        tenant: TenantId,
        bundle_ids: &[Uuid],
        bundle_refs: &[BundleReference],
        total_counts: &HashMap<Uuid, i64>,
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<ApiDefinitionPage>>;
    async fn list_by_application_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<ApiDefinition>>;
    async fn list_by_application_template_version_id(
        &self,
        conn: &mut C,
        app_template_version_id: Uuid,
    ) -> Result<Vec<ApiDefinition>>;
    async fn update(&self, conn: &mut C, tenant: TenantId, item: &ApiDefinition) -> Result<()>;
    async fn update_global(&self, conn: &mut C, item: &ApiDefinition) -> Result<()>;
    async fn delete(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<()>;
    async fn delete_global(&self, conn: &mut C, id: Uuid) -> Result<()>;
    async fn delete_all_by_bundle_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        bundle_id: Uuid,
    ) -> Result<()>;
}

#[async_trait]
pub trait EventRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &EventDefinition) -> Result<()>;
    async fn create_global(&self, conn: &mut C, item: &EventDefinition) -> Result<()>;
    async fn get_by_id(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<EventDefinition>;
    #[allow(clippy::too_many_arguments)]
    async fn list_by_bundle_ids(
        &self,
        conn: &mut C,
        tenant: TenantId,
        bundle_ids: &[Uuid],
        bundle_refs: &[BundleReference],
        total_counts: &HashMap<Uuid, i64>,
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<EventDefinitionPage>>;
    async fn delete(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<()>;
    async fn delete_global(&self, conn: &mut C, id: Uuid) -> Result<()>;
}

/// Bundle references are global rows; isolation comes from the objects they link.
#[async_trait]
pub trait BundleReferenceRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, item: &BundleReference) -> Result<()>;
    async fn update(&self, conn: &mut C, item: &BundleReference) -> Result<()>;
    async fn get_by_id(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<BundleReference>;
    async fn get_bundle_ids_for_object(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Uuid>>;
    async fn list_by_bundle_id(&self, conn: &mut C, bundle_id: Uuid) -> Result<Vec<BundleReference>>;
    /// References per bundle for one page, plus the total per bundle.
    async fn list_by_bundle_ids(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<BundleReference>, HashMap<Uuid, i64>)>;
    async fn delete_by_reference_object_id(
        &self,
        conn: &mut C,
        bundle_id: Uuid,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()>;
    async fn delete_all_for_object(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()>;
}

#[async_trait]
pub trait SpecRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &Spec) -> Result<()>;
    async fn create_global(&self, conn: &mut C, item: &Spec) -> Result<()>;
    async fn get_by_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        id: Uuid,
        object_type: SpecReferenceObjectType,
    ) -> Result<Spec>;
    async fn list_by_reference_object_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>>;
    async fn list_by_reference_object_id_global(
        &self,
        conn: &mut C,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>>;
    async fn list_by_reference_object_ids(
        &self,
        conn: &mut C,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_ids: &[Uuid],
    ) -> Result<Vec<Spec>>;
    async fn update(&self, conn: &mut C, tenant: TenantId, item: &Spec) -> Result<()>;
    async fn update_global(&self, conn: &mut C, item: &Spec) -> Result<()>;
    async fn delete_by_reference_object_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()>;
    async fn delete_by_reference_object_id_global(
        &self,
        conn: &mut C,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()>;
}

#[async_trait]
pub trait EntityTypeMappingRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, tenant: TenantId, item: &EntityTypeMapping) -> Result<()>;
    async fn create_global(&self, conn: &mut C, item: &EntityTypeMapping) -> Result<()>;
    async fn get_by_id(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<EntityTypeMapping>;
    async fn get_by_id_global(&self, conn: &mut C, id: Uuid) -> Result<EntityTypeMapping>;
    async fn get_by_api_definition_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        api_id: Uuid,
    ) -> Result<EntityTypeMapping>;
    async fn get_by_event_definition_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        event_id: Uuid,
    ) -> Result<EntityTypeMapping>;
    async fn list_by_api_definition_id_page(
        &self,
        conn: &mut C,
        tenant: TenantId,
        api_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)>;
    async fn list_by_event_definition_id_page(
        &self,
        conn: &mut C,
        tenant: TenantId,
        event_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)>;
    /// Locks the returned rows (`FOR UPDATE`) for a following mutation.
    async fn list_by_resource_id(
        &self,
        conn: &mut C,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>>;
    async fn list_by_resource_id_global(
        &self,
        conn: &mut C,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>>;
    async fn update(&self, conn: &mut C, tenant: TenantId, item: &EntityTypeMapping) -> Result<()>;
    async fn update_global(&self, conn: &mut C, item: &EntityTypeMapping) -> Result<()>;
    async fn exists(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<bool>;
    async fn delete(&self, conn: &mut C, tenant: TenantId, id: Uuid) -> Result<()>;
    async fn delete_global(&self, conn: &mut C, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait DestinationRepository<C: Send>: Send + Sync {
    /// Insert or refresh by `(name, tenant_id, bundle_id)`.
    async fn upsert(
        &self,
        conn: &mut C,
        input: &DestinationInput,
        id: Uuid,
        tenant: TenantId,
        bundle_id: Uuid,
        revision: Uuid,
    ) -> Result<()>;
    /// Removes the tenant's destinations not written by `revision`.
    async fn delete_old(&self, conn: &mut C, revision: Uuid, tenant: TenantId) -> Result<u64>;
    async fn list_by_tenant(&self, conn: &mut C, tenant: TenantId) -> Result<Vec<Destination>>;
}

#[async_trait]
pub trait LabelRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, item: &Label) -> Result<()>;
    async fn get_by_key(
        &self,
        conn: &mut C,
        tenant: TenantId,
        object_type: LabelableObject,
        object_id: Uuid,
        key: &str,
    ) -> Result<Label>;
}

#[async_trait]
pub trait TenantRepository<C: Send>: Send + Sync {
    async fn create(&self, conn: &mut C, item: &BusinessTenantMapping) -> Result<()>;
    async fn get(&self, conn: &mut C, id: TenantId) -> Result<BusinessTenantMapping>;
    async fn get_by_external_tenant(
        &self,
        conn: &mut C,
        external_tenant: &str,
    ) -> Result<BusinessTenantMapping>;
    /// Subaccounts carrying the subdomain label.
    async fn list_subscribed(
        &self,
        conn: &mut C,
        subdomain_label_key: &str,
    ) -> Result<Vec<BusinessTenantMapping>>;
    async fn exists_subscribed(
        &self,
        conn: &mut C,
        id: TenantId,
        subdomain_label_key: &str,
    ) -> Result<bool>;
}

/// Client for the external destination service, bound to one tenant subdomain.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// One page of the tenant's destinations and the total page count.
    async fn fetch_tenant_destinations_page(
        &self,
        page: u32,
    ) -> Result<(Vec<DestinationFromService>, u32)>;
    /// Full destination document including credentials.
    async fn fetch_destination_sensitive_data(&self, name: &str) -> Result<Vec<u8>>;
}

/// Builds a client for the instance serving `region`, authenticating as `subdomain`.
#[async_trait]
pub trait DestinationClientFactory: Send + Sync {
    async fn client_for(
        &self,
        region: &str,
        subdomain: &str,
    ) -> Result<Arc<dyn DestinationClient>>;
}
