use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::bundle_reference::BundleReferenceService;
use super::require_visible_bundles;
use super::spec::SpecService;
use crate::error::{Result, WrapErr};
use crate::model::{
    BundleReferenceInput, BundleReferenceObjectType, EventDefinition, EventDefinitionInput,
    EventDefinitionPage, SpecInput, SpecReferenceObjectType,
};
use crate::pagination::validate_page_size;
use crate::ports::{BundleRepository, EventRepository};
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct EventService<C: Send> {
    repo: Arc<dyn EventRepository<C>>,
    bundles: Arc<dyn BundleRepository<C>>,
    specs: Arc<SpecService<C>>,
    bundle_references: Arc<BundleReferenceService<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> EventService<C> {
    pub fn new(
        repo: Arc<dyn EventRepository<C>>,
        bundles: Arc<dyn BundleRepository<C>>,
        specs: Arc<SpecService<C>>,
        bundle_references: Arc<BundleReferenceService<C>>,
        uid: Arc<dyn UidService>,
    ) -> Self {
        Self {
            repo,
            bundles,
            specs,
            bundle_references,
            uid,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_in_bundle(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        resource_id: Uuid,
        bundle_id: Uuid,
        input: &EventDefinitionInput,
        spec: Option<&SpecInput>,
    ) -> Result<Uuid> {
        let id = self.uid.generate();
        let event = input.to_event_definition(id, resource_type, resource_id, None, 0, Utc::now());

        let created = if resource_type.is_tenant_ignorable() {
            self.repo.create_global(conn, &event).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.create(conn, tenant, &event).await
        };
        created.wrap_err("while creating event definition")?;

        if let Some(spec) = spec {
            self.specs
                .create_by_reference_object_id(scope, conn, resource_type, spec, SpecReferenceObjectType::EventSpec, id)
                .await
                .wrap_err("while processing specs")?;
        }

        self.bundle_references
            .create_by_reference_object_id(
                conn,
                &BundleReferenceInput::default(),
                BundleReferenceObjectType::Event,
                id,
                bundle_id,
            )
            .await
            .wrap_err("while creating bundle reference object")?;

        info!(event_id = %id, %bundle_id, "created event definition");
        Ok(id)
    }

    pub async fn get(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<EventDefinition> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }

    pub async fn list_by_bundle_ids(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<EventDefinitionPage>> {
        validate_page_size(page_size)?;
        let tenant = scope.tenant()?;
        require_visible_bundles(self.bundles.as_ref(), conn, tenant, bundle_ids).await?;

        let (references, counts) = self
            .bundle_references
            .list_by_bundle_ids(conn, BundleReferenceObjectType::Event, bundle_ids, page_size, cursor)
            .await?;

        self.repo
            .list_by_bundle_ids(conn, tenant, bundle_ids, &references, &counts, page_size, cursor)
            .await
    }

    /// Removes the definition with its specs and bundle references.
    pub async fn delete(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
    ) -> Result<()> {
        self.specs
            .delete_by_reference_object_id(scope, conn, resource_type, SpecReferenceObjectType::EventSpec, id)
            .await?;

        let deleted = if resource_type.is_tenant_ignorable() {
            self.repo.delete_global(conn, id).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.delete(conn, tenant, id).await
        };
        deleted.wrap_err_with(|| format!("while deleting event definition with id {id}"))?;

        self.bundle_references
            .delete_all_for_object(conn, BundleReferenceObjectType::Event, id)
            .await?;

        info!(event_id = %id, "deleted event definition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::{app_input, bundle_input, fixture, other_tenant, seed_bundle};
    use crate::transaction::{Transaction, Transactioner};

    #[tokio::test]
    async fn events_of_foreign_bundle_are_not_found() {
        let f = fixture().await;
        let (app_id, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;

        let mut tx = f.store.begin().await.unwrap();
        for name in ["a", "b", "c"] {
            let input = EventDefinitionInput {
                name: name.into(),
                ..Default::default()
            };
            f.services
                .events
                .create_in_bundle(&f.scope, tx.conn(), ResourceType::Application, app_id, bndlid, &input, None)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = f.store.begin().await.unwrap();
        let pages = f
            .services
            .events
            .list_by_bundle_ids(&f.scope, tx.conn(), &[bndlid], 2, "")
            .await
            .unwrap();
        assert_eq!(pages[0].total_count, 3);

        let stranger = other_tenant(&f).await;
        let err = f
            .services
            .events
            .list_by_bundle_ids(&stranger, tx.conn(), &[bndlid], 2, "")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
