use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, WrapErr};
use crate::model::{Spec, SpecInput, SpecReferenceObjectType};
use crate::ports::SpecRepository;
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct SpecService<C: Send> {
    repo: Arc<dyn SpecRepository<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> SpecService<C> {
    pub fn new(repo: Arc<dyn SpecRepository<C>>, uid: Arc<dyn UidService>) -> Self {
        Self { repo, uid }
    }

    /// `resource_type` is the type of the definition's owner; tenant-ignorable
    /// owners store their specs globally.
    pub async fn create_by_reference_object_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        input: &SpecInput,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Uuid> {
        let id = self.uid.generate();
        let spec = input.to_spec(id, object_type, object_id)?;
        let created = if resource_type.is_tenant_ignorable() {
            self.repo.create_global(conn, &spec).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.create(conn, tenant, &spec).await
        };
        created.wrap_err_with(|| format!("while creating spec for {object_type} with id {object_id}"))?;
        debug!(spec_id = %id, %object_id, "created spec");
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_by_reference_object_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
        input: &SpecInput,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let spec = input.to_spec(id, object_type, object_id)?;
        let updated = if resource_type.is_tenant_ignorable() {
            self.repo.update_global(conn, &spec).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.update(conn, tenant, &spec).await
        };
        updated.wrap_err_with(|| format!("while updating spec with id {id}"))
    }

    pub async fn get(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        id: Uuid,
        object_type: SpecReferenceObjectType,
    ) -> Result<Spec> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id, object_type).await
    }

    /// First spec of the object, if it has any.
    pub async fn get_by_reference_object_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Option<Spec>> {
        let specs = self
            .list_by_reference_object_id(scope, conn, resource_type, object_type, object_id)
            .await?;
        Ok(specs.into_iter().next())
    }

    pub async fn list_by_reference_object_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>> {
        if resource_type.is_tenant_ignorable() {
            return self
                .repo
                .list_by_reference_object_id_global(conn, object_type, object_id)
                .await;
        }
        let tenant = scope.tenant()?;
        self.repo
            .list_by_reference_object_id(conn, tenant, object_type, object_id)
            .await
    }

    pub async fn list_by_reference_object_ids(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        object_type: SpecReferenceObjectType,
        object_ids: &[Uuid],
    ) -> Result<Vec<Spec>> {
        if object_ids.is_empty() {
            return Ok(Vec::new());
        }
        let tenant = scope.tenant()?;
        self.repo
            .list_by_reference_object_ids(conn, tenant, object_type, object_ids)
            .await
    }

    pub async fn delete_by_reference_object_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let deleted = if resource_type.is_tenant_ignorable() {
            self.repo
                .delete_by_reference_object_id_global(conn, object_type, object_id)
                .await
        } else {
            let tenant = scope.tenant()?;
            self.repo
                .delete_by_reference_object_id(conn, tenant, object_type, object_id)
                .await
        };
        deleted.wrap_err_with(|| format!("while deleting specs for {object_type} with id {object_id}"))
    }
}
