use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::api::ApiService;
use super::bundle_reference::BundleReferenceService;
use super::event::EventService;
use crate::error::{Result, WrapErr};
use crate::model::{Bundle, BundleInput, BundleReferenceObjectType};
use crate::ports::BundleRepository;
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct BundleService<C: Send> {
    repo: Arc<dyn BundleRepository<C>>,
    apis: Arc<ApiService<C>>,
    events: Arc<EventService<C>>,
    bundle_references: Arc<BundleReferenceService<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> BundleService<C> {
    pub fn new(
        repo: Arc<dyn BundleRepository<C>>,
        apis: Arc<ApiService<C>>,
        events: Arc<EventService<C>>,
        bundle_references: Arc<BundleReferenceService<C>>,
        uid: Arc<dyn UidService>,
    ) -> Self {
        Self {
            repo,
            apis,
            events,
            bundle_references,
            uid,
        }
    }

    pub async fn create(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        app_id: Uuid,
        input: &BundleInput,
        hash: u64,
    ) -> Result<Uuid> {
        let tenant = scope.tenant()?;
        let id = self.uid.generate();
        let bundle = input.to_bundle(id, app_id, (hash != 0).then(|| hash.to_string()), Utc::now());
        self.repo
            .create(conn, tenant, &bundle)
            .await
            .wrap_err_with(|| format!("while creating bundle for application {app_id}"))?;
        info!(bundle_id = %id, %app_id, "created bundle");
        Ok(id)
    }

    pub async fn get(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<Bundle> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }

    pub async fn exists(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<bool> {
        let tenant = scope.tenant()?;
        self.repo.exists(conn, tenant, id).await
    }

    pub async fn list_by_application_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        app_id: Uuid,
    ) -> Result<Vec<Bundle>> {
        let tenant = scope.tenant()?;
        self.repo.list_by_application_id(conn, tenant, app_id).await
    }

    pub async fn update(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        id: Uuid,
        input: &BundleInput,
    ) -> Result<()> {
        let tenant = scope.tenant()?;
        let mut bundle = self
            .repo
            .get_by_id(conn, tenant, id)
            .await
            .wrap_err_with(|| format!("while getting bundle with id {id}"))?;
        bundle.set_from_update_input(input, Utc::now());
        self.repo
            .update(conn, tenant, &bundle)
            .await
            .wrap_err_with(|| format!("while updating bundle with id {id}"))
    }

    /// Removes the bundle with every API and event definition it references.
    pub async fn delete(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<()> {
        let tenant = scope.tenant()?;

        self.apis
            .delete_all_by_bundle_id(scope, conn, id)
            .await
            .wrap_err_with(|| format!("while deleting api definitions of bundle {id}"))?;

        let event_ids = self
            .bundle_references
            .list_by_bundle_id(conn, id)
            .await?
            .into_iter()
            .filter(|r| r.object_type == BundleReferenceObjectType::Event)
            .filter_map(|r| r.object_id)
            .collect::<Vec<_>>();
        for event_id in event_ids {
            self.events
                .delete(scope, conn, ResourceType::Application, event_id)
                .await
                .wrap_err_with(|| format!("while deleting event definitions of bundle {id}"))?;
        }

        self.repo
            .delete(conn, tenant, id)
            .await
            .wrap_err_with(|| format!("while deleting bundle with id {id}"))?;
        info!(bundle_id = %id, "deleted bundle");
        Ok(())
    }
}
