use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{CompassError, Result, WrapErr};
use crate::model::{EntityTypeMapping, EntityTypeMappingInput};
use crate::pagination::{validate_page_size, Page};
use crate::ports::EntityTypeMappingRepository;
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct EntityTypeMappingService<C: Send> {
    repo: Arc<dyn EntityTypeMappingRepository<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> EntityTypeMappingService<C> {
    pub fn new(repo: Arc<dyn EntityTypeMappingRepository<C>>, uid: Arc<dyn UidService>) -> Self {
        Self { repo, uid }
    }

    /// `resource_type` is the parent kind: `Api` or `EventDefinition`.
    /// `owner_type` decides between tenant-scoped and global storage.
    pub async fn create(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        owner_type: ResourceType,
        resource_type: ResourceType,
        resource_id: Uuid,
        input: &EntityTypeMappingInput,
    ) -> Result<Uuid> {
        let id = self.uid.generate();
        let mapping = input.to_entity_type_mapping(id, resource_type, resource_id, Utc::now())?;

        let created = if owner_type.is_tenant_ignorable() {
            self.repo.create_global(conn, &mapping).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.create(conn, tenant, &mapping).await
        };
        created.wrap_err_with(|| format!("while creating entity type mapping for {resource_type} with id {resource_id}"))?;

        info!(mapping_id = %id, %resource_type, %resource_id, "created entity type mapping");
        Ok(id)
    }

    pub async fn update(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        owner_type: ResourceType,
        id: Uuid,
        input: &EntityTypeMappingInput,
    ) -> Result<()> {
        let mut mapping = self.get_mapping(scope, conn, owner_type, id).await?;
        mapping.api_model_selectors = input.api_model_selectors.clone();
        mapping.entity_type_targets = input.entity_type_targets.clone();
        mapping.base.updated_at = Some(Utc::now());
        mapping.validate_parent()?;

        let updated = if owner_type.is_tenant_ignorable() {
            self.repo.update_global(conn, &mapping).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.update(conn, tenant, &mapping).await
        };
        updated.wrap_err_with(|| format!("while updating entity type mapping with id {id}"))
    }

    pub async fn get(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<EntityTypeMapping> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }

    /// Mappings of an API or event definition, row-locked for a following update.
    pub async fn list_by_owner_resource_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>> {
        if !matches!(resource_type, ResourceType::Api | ResourceType::EventDefinition) {
            return Err(CompassError::InvalidData(format!(
                "unsupported resource type {resource_type} for entity type mappings"
            )));
        }
        let tenant = scope.tenant()?;
        self.repo
            .list_by_resource_id(conn, tenant, resource_type, resource_id)
            .await
    }

    pub async fn list_by_api_definition_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        api_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        validate_page_size(page_size)?;
        let tenant = scope.tenant()?;
        self.repo
            .list_by_api_definition_id_page(conn, tenant, api_id, page_size, cursor)
            .await
    }

    pub async fn list_by_event_definition_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        event_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        validate_page_size(page_size)?;
        let tenant = scope.tenant()?;
        self.repo
            .list_by_event_definition_id_page(conn, tenant, event_id, page_size, cursor)
            .await
    }

    pub async fn delete(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        owner_type: ResourceType,
        id: Uuid,
    ) -> Result<()> {
        let deleted = if owner_type.is_tenant_ignorable() {
            self.repo.delete_global(conn, id).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.delete(conn, tenant, id).await
        };
        deleted.wrap_err_with(|| format!("while deleting entity type mapping with id {id}"))?;
        info!(mapping_id = %id, "deleted entity type mapping");
        Ok(())
    }

    async fn get_mapping(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        owner_type: ResourceType,
        id: Uuid,
    ) -> Result<EntityTypeMapping> {
        if owner_type.is_tenant_ignorable() {
            return self.repo.get_by_id_global(conn, id).await;
        }
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }
}
