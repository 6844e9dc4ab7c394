use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::api::ApiService;
use super::bundle::BundleService;
use crate::error::{Result, WrapErr};
use crate::model::{Application, ApplicationInput};
use crate::ports::ApplicationRepository;
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct ApplicationService<C: Send> {
    repo: Arc<dyn ApplicationRepository<C>>,
    bundles: Arc<BundleService<C>>,
    apis: Arc<ApiService<C>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> ApplicationService<C> {
    pub fn new(
        repo: Arc<dyn ApplicationRepository<C>>,
        bundles: Arc<BundleService<C>>,
        apis: Arc<ApiService<C>>,
        uid: Arc<dyn UidService>,
    ) -> Self {
        Self {
            repo,
            bundles,
            apis,
            uid,
        }
    }

    /// Registers the application; the calling tenant and its parents become owners.
    pub async fn create(&self, scope: &RequestScope, conn: &mut C, input: &ApplicationInput) -> Result<Uuid> {
        let tenant = scope.tenant()?;
        let id = self.uid.generate();
        let app = input.to_application(id, Utc::now());
        self.repo
            .create(conn, tenant, &app)
            .await
            .wrap_err("while creating application")?;
        info!(app_id = %id, %tenant, "registered application");
        Ok(id)
    }

    pub async fn get(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<Application> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }

    pub async fn exists(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<bool> {
        let tenant = scope.tenant()?;
        self.repo.exists(conn, tenant, id).await
    }

    pub async fn list(&self, scope: &RequestScope, conn: &mut C) -> Result<Vec<Application>> {
        let tenant = scope.tenant()?;
        self.repo.list(conn, tenant).await
    }

    /// Removes bundles (with their definitions) and remaining API
    /// definitions before the application row.
    pub async fn delete(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<()> {
        let tenant = scope.tenant()?;

        for bundle in self.bundles.list_by_application_id(scope, conn, id).await? {
            self.bundles.delete(scope, conn, bundle.id).await?;
        }
        for api in self.apis.list_by_application_id(scope, conn, id).await? {
            self.apis
                .delete(scope, conn, ResourceType::Application, api.id)
                .await?;
        }

        self.repo
            .delete(conn, tenant, id)
            .await
            .wrap_err_with(|| format!("while deleting application with id {id}"))?;
        info!(app_id = %id, "deleted application");
        Ok(())
    }
}
