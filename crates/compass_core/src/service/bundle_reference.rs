use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, WrapErr};
use crate::model::{BundleReference, BundleReferenceInput, BundleReferenceObjectType};
use crate::pagination::validate_page_size;
use crate::ports::BundleReferenceRepository;
use crate::uid::UidService;

/// Bundle references are global; callers have already checked access to the
/// object being linked.
pub struct BundleReferenceService<C: Send> {
    repo: Arc<dyn BundleReferenceRepository<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> BundleReferenceService<C> {
    pub fn new(repo: Arc<dyn BundleReferenceRepository<C>>, uid: Arc<dyn UidService>) -> Self {
        Self { repo, uid }
    }

    pub async fn get_for_bundle(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<BundleReference> {
        self.repo.get_by_id(conn, object_type, object_id, bundle_id).await
    }

    pub async fn get_bundle_ids_for_object(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        self.repo
            .get_bundle_ids_for_object(conn, object_type, object_id)
            .await
    }

    pub async fn list_by_bundle_id(&self, conn: &mut C, bundle_id: Uuid) -> Result<Vec<BundleReference>> {
        self.repo.list_by_bundle_id(conn, bundle_id).await
    }

    pub async fn create_by_reference_object_id(
        &self,
        conn: &mut C,
        input: &BundleReferenceInput,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Uuid,
    ) -> Result<()> {
        let reference =
            input.to_bundle_reference(self.uid.generate(), Some(bundle_id), object_type, Some(object_id));
        self.repo
            .create(conn, &reference)
            .await
            .wrap_err_with(|| format!("while creating reference from bundle {bundle_id} to {object_type} {object_id}"))
    }

    /// Replaces the reference's state. Without `bundle_id` the object must
    /// have exactly one reference.
    pub async fn update_by_reference_object_id(
        &self,
        conn: &mut C,
        input: &BundleReferenceInput,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<()> {
        let existing = self
            .repo
            .get_by_id(conn, object_type, object_id, bundle_id)
            .await
            .wrap_err("while getting bundle reference")?;
        let updated = input.to_bundle_reference(existing.id, existing.bundle_id, object_type, Some(object_id));
        self.repo.update(conn, &updated).await
    }

    pub async fn delete_by_reference_object_id(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Uuid,
    ) -> Result<()> {
        self.repo
            .delete_by_reference_object_id(conn, bundle_id, object_type, object_id)
            .await
    }

    pub async fn delete_all_for_object(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        self.repo.delete_all_for_object(conn, object_type, object_id).await
    }

    /// One page of references per bundle, with the total per bundle.
    pub async fn list_by_bundle_ids(
        &self,
        conn: &mut C,
        object_type: BundleReferenceObjectType,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<BundleReference>, HashMap<Uuid, i64>)> {
        validate_page_size(page_size)?;
        if bundle_ids.is_empty() {
            return Ok((Vec::new(), HashMap::new()));
        }
        self.repo
            .list_by_bundle_ids(conn, object_type, bundle_ids, page_size, cursor)
            .await
    }
}
