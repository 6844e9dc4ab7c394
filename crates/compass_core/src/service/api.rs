use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::bundle_reference::BundleReferenceService;
use super::require_visible_bundles;
use super::spec::SpecService;
use crate::error::{CompassError, Result, WrapErr};
use crate::model::api::extract_target_url;
use crate::model::{
    ApiDefinition, ApiDefinitionInput, ApiDefinitionPage, BundleReferenceInput,
    BundleReferenceObjectType, SpecInput, SpecReferenceObjectType,
};
use crate::pagination::validate_page_size;
use crate::ports::{ApiRepository, BundleRepository, EntityTypeMappingRepository};
use crate::resource::ResourceType;
use crate::tenant::RequestScope;
use crate::uid::UidService;

pub struct ApiService<C: Send> {
    repo: Arc<dyn ApiRepository<C>>,
    bundles: Arc<dyn BundleRepository<C>>,
    specs: Arc<SpecService<C>>,
    bundle_references: Arc<BundleReferenceService<C>>,
    entity_type_mappings: Option<Arc<dyn EntityTypeMappingRepository<C>>>,
    uid: Arc<dyn UidService>,
}

impl<C: Send> ApiService<C> {
    pub fn new(
        repo: Arc<dyn ApiRepository<C>>,
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
            entity_type_mappings: None,
            uid,
        }
    }

    /// Delete also removes the definition's entity type mappings.
    pub fn with_entity_type_mappings(mut self, repo: Arc<dyn EntityTypeMappingRepository<C>>) -> Self {
        self.entity_type_mappings = Some(repo);
        self
    }

    /// Creates a definition with its specs and bundle references.
    ///
    /// With `default_target_url_per_bundle` one reference is written per
    /// bundle, and the one equal to `default_bundle_id` is flagged default.
    /// Without it a single reference to `bundle_id` is written using the
    /// first target URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        resource_id: Uuid,
        bundle_id: Option<Uuid>,
        package_id: Option<String>,
        input: &ApiDefinitionInput,
        specs: &[Option<SpecInput>],
        default_target_url_per_bundle: Option<&HashMap<Uuid, String>>,
        hash: u64,
        default_bundle_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let id = self.uid.generate();
        let mut api = input.to_api_definition(id, resource_type, resource_id, package_id, hash, Utc::now());
        enrich_api_protocol(&mut api, specs);

        let created = if resource_type.is_tenant_ignorable() {
            self.repo.create_global(conn, &api).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.create(conn, tenant, &api).await
        };
        created.wrap_err("while creating api")?;

        self.process_specs(scope, conn, resource_type, id, specs)
            .await
            .wrap_err("while processing specs")?;

        self.create_bundle_references(conn, &api, bundle_id, default_target_url_per_bundle, default_bundle_id)
            .await
            .wrap_err("while creating bundle reference object")?;

        info!(api_id = %id, %resource_type, %resource_id, "created api definition");
        Ok(id)
    }

    /// Single-bundle create used by the request-level API.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_in_bundle(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        resource_id: Uuid,
        bundle_id: Uuid,
        input: &ApiDefinitionInput,
        spec: Option<&SpecInput>,
    ) -> Result<Uuid> {
        let specs = [spec.cloned()];
        self.create(
            scope,
            conn,
            resource_type,
            resource_id,
            Some(bundle_id),
            None,
            input,
            &specs,
            None,
            0,
            None,
        )
        .await
    }

    pub async fn update(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
        input: &ApiDefinitionInput,
        spec: Option<&SpecInput>,
    ) -> Result<()> {
        self.update_in_many_bundles(scope, conn, resource_type, id, input, spec, None, None, &[], 0, None)
            .await
    }

    /// Full replace of the definition followed by reference reconciliation:
    /// update existing references, create new ones, delete removed ones, then
    /// create or update the spec.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_in_many_bundles(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
        input: &ApiDefinitionInput,
        spec: Option<&SpecInput>,
        default_target_url_per_bundle_for_update: Option<&HashMap<Uuid, String>>,
        default_target_url_per_bundle_to_be_created: Option<&HashMap<Uuid, String>>,
        bundle_ids_to_be_deleted: &[Uuid],
        hash: u64,
        default_bundle_id: Option<Uuid>,
    ) -> Result<()> {
        let existing = self.get_api(scope, conn, resource_type, id).await?;
        let (_, resource_id) = existing.owner().ok_or_else(|| {
            CompassError::internal(format!("api definition {id} has no owning resource"))
        })?;

        let mut api = input.to_api_definition(
            id,
            resource_type,
            resource_id,
            existing.package_id.clone(),
            hash,
            existing.base.created_at.unwrap_or_else(Utc::now),
        );
        api.base.updated_at = Some(Utc::now());

        let updated = if resource_type.is_tenant_ignorable() {
            self.repo.update_global(conn, &api).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.update(conn, tenant, &api).await
        };
        updated.wrap_err_with(|| format!("while updating api with id {id}"))?;

        self.update_references(conn, &api, default_target_url_per_bundle_for_update)
            .await
            .wrap_err_with(|| format!("while updating bundle references for api with id {id}"))?;

        if default_target_url_per_bundle_to_be_created.is_some() {
            self.create_bundle_references(conn, &api, None, default_target_url_per_bundle_to_be_created, default_bundle_id)
                .await
                .wrap_err_with(|| format!("while creating bundle references for api with id {id}"))?;
        }

        for bundle_id in bundle_ids_to_be_deleted {
            self.bundle_references
                .delete_by_reference_object_id(conn, BundleReferenceObjectType::Api, id, *bundle_id)
                .await
                .wrap_err_with(|| format!("while deleting reference for api with id {id} and bundle {bundle_id}"))?;
        }

        if let Some(spec) = spec {
            self.handle_spec(scope, conn, resource_type, id, spec).await?;
        }

        info!(api_id = %id, "updated api definition");
        Ok(())
    }

    pub async fn get(&self, scope: &RequestScope, conn: &mut C, id: Uuid) -> Result<ApiDefinition> {
        let tenant = scope.tenant()?;
        self.repo.get_by_id(conn, tenant, id).await
    }

    pub async fn get_for_bundle(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        id: Uuid,
        bundle_id: Uuid,
    ) -> Result<ApiDefinition> {
        let tenant = scope.tenant()?;
        self.repo.get_for_bundle(conn, tenant, id, bundle_id).await
    }

    pub async fn list_by_application_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        app_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        let tenant = scope.tenant()?;
        self.repo.list_by_application_id(conn, tenant, app_id).await
    }

    pub async fn list_by_application_template_version_id(
        &self,
        conn: &mut C,
        app_template_version_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        self.repo
            .list_by_application_template_version_id(conn, app_template_version_id)
            .await
    }

    /// One page of definitions per bundle, in `bundle_ids` order. Every
    /// bundle must be visible to the tenant, otherwise `NotFound`.
    pub async fn list_by_bundle_ids(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<ApiDefinitionPage>> {
        validate_page_size(page_size)?;
        let tenant = scope.tenant()?;
        require_visible_bundles(self.bundles.as_ref(), conn, tenant, bundle_ids).await?;

        let (references, counts) = self
            .bundle_references
            .list_by_bundle_ids(conn, BundleReferenceObjectType::Api, bundle_ids, page_size, cursor)
            .await?;

        self.repo
            .list_by_bundle_ids(conn, tenant, bundle_ids, &references, &counts, page_size, cursor)
            .await
    }

    /// Removes the definition together with its entity type mappings, specs
    /// and bundle references.
    pub async fn delete(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
    ) -> Result<()> {
        self.delete_dependents(scope, conn, resource_type, id).await?;

        let deleted = if resource_type.is_tenant_ignorable() {
            self.repo.delete_global(conn, id).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.delete(conn, tenant, id).await
        };
        deleted.wrap_err_with(|| format!("while deleting api definition with id {id}"))?;

        self.bundle_references
            .delete_all_for_object(conn, BundleReferenceObjectType::Api, id)
            .await
            .wrap_err_with(|| format!("while deleting bundle references for api with id {id}"))?;

        info!(api_id = %id, "deleted api definition");
        Ok(())
    }

    /// Deletes every definition referenced by the bundle, with dependents.
    pub async fn delete_all_by_bundle_id(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        bundle_id: Uuid,
    ) -> Result<()> {
        let tenant = scope.tenant()?;
        let api_ids = self
            .bundle_references
            .list_by_bundle_id(conn, bundle_id)
            .await?
            .into_iter()
            .filter(|r| r.object_type == BundleReferenceObjectType::Api)
            .filter_map(|r| r.object_id)
            .collect::<Vec<_>>();

        for api_id in &api_ids {
            self.delete_dependents(scope, conn, ResourceType::Application, *api_id)
                .await?;
        }

        // References are still in place: the repository selects by them.
        self.repo
            .delete_all_by_bundle_id(conn, tenant, bundle_id)
            .await
            .wrap_err_with(|| format!("while deleting api definitions for bundle {bundle_id}"))?;

        for api_id in &api_ids {
            self.bundle_references
                .delete_all_for_object(conn, BundleReferenceObjectType::Api, *api_id)
                .await?;
        }

        info!(%bundle_id, count = api_ids.len(), "deleted api definitions of bundle");
        Ok(())
    }

    async fn get_api(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
    ) -> Result<ApiDefinition> {
        let api = if resource_type.is_tenant_ignorable() {
            self.repo.get_by_id_global(conn, id).await
        } else {
            let tenant = scope.tenant()?;
            self.repo.get_by_id(conn, tenant, id).await
        };
        api.wrap_err_with(|| format!("while getting api definition with id {id}"))
    }

    async fn delete_dependents(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
    ) -> Result<()> {
        if let Some(mappings) = &self.entity_type_mappings {
            if resource_type.is_tenant_ignorable() {
                for mapping in mappings.list_by_resource_id_global(conn, ResourceType::Api, id).await? {
                    mappings.delete_global(conn, mapping.id).await?;
                }
            } else {
                let tenant = scope.tenant()?;
                for mapping in mappings.list_by_resource_id(conn, tenant, ResourceType::Api, id).await? {
                    mappings.delete(conn, tenant, mapping.id).await?;
                }
            }
        }

        self.specs
            .delete_by_reference_object_id(scope, conn, resource_type, SpecReferenceObjectType::ApiSpec, id)
            .await
    }

    async fn process_specs(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
        specs: &[Option<SpecInput>],
    ) -> Result<()> {
        for spec in specs.iter().flatten() {
            self.specs
                .create_by_reference_object_id(scope, conn, resource_type, spec, SpecReferenceObjectType::ApiSpec, id)
                .await?;
        }
        Ok(())
    }

    async fn handle_spec(
        &self,
        scope: &RequestScope,
        conn: &mut C,
        resource_type: ResourceType,
        id: Uuid,
        spec: &SpecInput,
    ) -> Result<()> {
        let existing = self
            .specs
            .get_by_reference_object_id(scope, conn, resource_type, SpecReferenceObjectType::ApiSpec, id)
            .await
            .wrap_err_with(|| format!("while getting spec for api with id {id}"))?;

        match existing {
            None => {
                self.specs
                    .create_by_reference_object_id(scope, conn, resource_type, spec, SpecReferenceObjectType::ApiSpec, id)
                    .await
                    .wrap_err_with(|| format!("while creating spec for api with id {id}"))?;
            }
            Some(existing) => {
                self.specs
                    .update_by_reference_object_id(
                        scope,
                        conn,
                        resource_type,
                        existing.id,
                        spec,
                        SpecReferenceObjectType::ApiSpec,
                        id,
                    )
                    .await
                    .wrap_err_with(|| format!("while updating spec for api with id {id}"))?;
            }
        }
        Ok(())
    }

    async fn create_bundle_references(
        &self,
        conn: &mut C,
        api: &ApiDefinition,
        bundle_id: Option<Uuid>,
        default_target_url_per_bundle: Option<&HashMap<Uuid, String>>,
        default_bundle_id: Option<Uuid>,
    ) -> Result<()> {
        match default_target_url_per_bundle {
            Some(per_bundle) => {
                let mut bundle_ids = per_bundle.keys().copied().collect::<Vec<_>>();
                bundle_ids.sort();
                for current in bundle_ids {
                    let input = BundleReferenceInput {
                        api_default_target_url: per_bundle.get(&current).cloned(),
                        is_default_bundle: (default_bundle_id == Some(current)).then_some(true),
                    };
                    self.bundle_references
                        .create_by_reference_object_id(conn, &input, BundleReferenceObjectType::Api, api.id, current)
                        .await?;
                }
            }
            None => {
                if let Some(bundle_id) = bundle_id {
                    let input = BundleReferenceInput {
                        api_default_target_url: extract_target_url(&api.target_urls),
                        is_default_bundle: None,
                    };
                    self.bundle_references
                        .create_by_reference_object_id(conn, &input, BundleReferenceObjectType::Api, api.id, bundle_id)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn update_references(
        &self,
        conn: &mut C,
        api: &ApiDefinition,
        default_target_url_per_bundle: Option<&HashMap<Uuid, String>>,
    ) -> Result<()> {
        match default_target_url_per_bundle {
            None => {
                let input = BundleReferenceInput {
                    api_default_target_url: extract_target_url(&api.target_urls),
                    is_default_bundle: None,
                };
                self.bundle_references
                    .update_by_reference_object_id(conn, &input, BundleReferenceObjectType::Api, api.id, None)
                    .await
            }
            Some(per_bundle) => {
                for (bundle_id, url) in per_bundle {
                    let input = BundleReferenceInput {
                        api_default_target_url: Some(url.clone()),
                        is_default_bundle: None,
                    };
                    self.bundle_references
                        .update_by_reference_object_id(
                            conn,
                            &input,
                            BundleReferenceObjectType::Api,
                            api.id,
                            Some(*bundle_id),
                        )
                        .await?;
                }
                Ok(())
            }
        }
    }
}

/// Derives `api_protocol` from the first spec when the input left it unset.
fn enrich_api_protocol(api: &mut ApiDefinition, specs: &[Option<SpecInput>]) {
    if api.api_protocol.is_some() {
        return;
    }
    if let Some(Some(spec)) = specs.first() {
        api.api_protocol = spec.api_protocol().map(str::to_string);
    }
}
