use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::graphql::convert::api_definition_to_graphql;
use crate::graphql::{ApiDefinition, ApiDefinitionInput, ApiDefinitionPage};
use crate::model::{BundleReferenceObjectType, SpecReferenceObjectType};
use crate::resource::ResourceType;
use crate::service::Services;
use crate::tenant::RequestScope;
use crate::transaction::{Transaction, Transactioner};

pub struct ApiDefinitionResolver<T: Transactioner> {
    transactioner: Arc<T>,
    services: Arc<Services<T::Conn>>,
}

impl<T: Transactioner> ApiDefinitionResolver<T> {
    pub fn new(transactioner: Arc<T>, services: Arc<Services<T::Conn>>) -> Self {
        Self {
            transactioner,
            services,
        }
    }

    /// Creates the definition under the bundle's application and links it to the bundle.
    pub async fn add_api_definition_to_bundle(
        &self,
        scope: &RequestScope,
        bundle_id: Uuid,
        input: &ApiDefinitionInput,
    ) -> Result<ApiDefinition> {
        let mut tx = self.transactioner.begin().await?;

        let bundle = self.services.bundles.get(scope, tx.conn(), bundle_id).await?;
        let app_id = bundle.application_id.ok_or_else(|| {
            CompassError::internal(format!("bundle {bundle_id} has no application"))
        })?;

        let (api_input, spec_input) = input.to_input();
        let id = self
            .services
            .apis
            .create_in_bundle(
                scope,
                tx.conn(),
                ResourceType::Application,
                app_id,
                bundle_id,
                &api_input,
                spec_input.as_ref(),
            )
            .await?;

        let api = self.load(scope, tx.conn(), id, Some(bundle_id)).await?;
        tx.commit().await?;
        Ok(api)
    }

    pub async fn update_api_definition(
        &self,
        scope: &RequestScope,
        id: Uuid,
        input: &ApiDefinitionInput,
    ) -> Result<ApiDefinition> {
        let mut tx = self.transactioner.begin().await?;

        let (api_input, spec_input) = input.to_input();
        self.services
            .apis
            .update(scope, tx.conn(), ResourceType::Application, id, &api_input, spec_input.as_ref())
            .await?;

        let api = self.load(scope, tx.conn(), id, None).await?;
        tx.commit().await?;
        Ok(api)
    }

    /// Deletes the definition and returns it as it was before deletion.
    pub async fn delete_api_definition(&self, scope: &RequestScope, id: Uuid) -> Result<ApiDefinition> {
        let mut tx = self.transactioner.begin().await?;

        let api = self.load(scope, tx.conn(), id, None).await?;
        self.services
            .apis
            .delete(scope, tx.conn(), ResourceType::Application, id)
            .await?;

        tx.commit().await?;
        Ok(api)
    }

    pub async fn api_definition(&self, scope: &RequestScope, id: Uuid) -> Result<ApiDefinition> {
        let mut tx = self.transactioner.begin().await?;
        let api = self.load(scope, tx.conn(), id, None).await?;
        tx.commit().await?;
        Ok(api)
    }

    /// One page of the bundle's definitions with their specs.
    pub async fn apis_for_bundle(
        &self,
        scope: &RequestScope,
        bundle_id: Uuid,
        first: i64,
        after: &str,
    ) -> Result<ApiDefinitionPage> {
        let mut tx = self.transactioner.begin().await?;

        let page = self
            .services
            .apis
            .list_by_bundle_ids(scope, tx.conn(), &[bundle_id], first, after)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CompassError::internal(format!("no page returned for bundle {bundle_id}")))?;

        let api_ids = page.data.iter().map(|api| api.id).collect::<Vec<_>>();
        let specs = self
            .services
            .specs
            .list_by_reference_object_ids(scope, tx.conn(), SpecReferenceObjectType::ApiSpec, &api_ids)
            .await?
            .into_iter()
            .map(|spec| (spec.object_id, spec))
            .collect::<HashMap<_, _>>();
        let references = self
            .services
            .bundle_references
            .list_by_bundle_id(tx.conn(), bundle_id)
            .await?
            .into_iter()
            .filter(|r| r.object_type == BundleReferenceObjectType::Api)
            .filter_map(|r| r.object_id.map(|id| (id, r)))
            .collect::<HashMap<_, _>>();

        tx.commit().await?;

        Ok(ApiDefinitionPage {
            data: page
                .data
                .iter()
                .map(|api| api_definition_to_graphql(api, specs.get(&api.id), references.get(&api.id)))
                .collect(),
            page_info: page.page_info,
            total_count: page.total_count,
        })
    }

    /// Definition with its spec and bundle reference, in wire form.
    ///
    /// Without `bundle_id` the definition must be linked to exactly one bundle.
    async fn load(
        &self,
        scope: &RequestScope,
        conn: &mut T::Conn,
        id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<ApiDefinition> {
        let api = self.services.apis.get(scope, conn, id).await?;
        let spec = self
            .services
            .specs
            .get_by_reference_object_id(scope, conn, ResourceType::Application, SpecReferenceObjectType::ApiSpec, id)
            .await?;
        let reference = match self
            .services
            .bundle_references
            .get_for_bundle(conn, BundleReferenceObjectType::Api, id, bundle_id)
            .await
        {
            Ok(reference) => Some(reference),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        Ok(api_definition_to_graphql(&api, spec.as_ref(), reference.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::ApiSpecInput;
    use crate::memory::testing::{app_input, bundle_input, fixture, other_tenant, seed_bundle};
    use crate::model::{ApiSpecType, BundleReferenceInput, SpecFormat};

    fn foo() -> ApiDefinitionInput {
        ApiDefinitionInput {
            name: "Foo".into(),
            target_url: "https://test-url.com".into(),
            ..Default::default()
        }
    }

    // ── create ───────────────────────────────────────────────

    #[tokio::test]
    async fn add_to_bundle_links_reference_with_target_url() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));

        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &foo()).await.unwrap();
        assert!(created.ready);
        assert_eq!(created.name, "Foo");
        assert_eq!(created.target_url, "https://test-url.com");
        assert_eq!(created.bundle_id, Some(bndlid));

        let mut tx = f.store.begin().await.unwrap();
        let stored = f.services.apis.get(&f.scope, tx.conn(), created.id).await.unwrap();
        assert!(stored.base.ready);
        assert_eq!(stored.target_urls, vec!["https://test-url.com".to_string()]);
        drop(tx);

        let refs = f.store.snapshot().await.bundle_references().to_vec();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].object_id, Some(created.id));
        assert_eq!(refs[0].bundle_id, Some(bndlid));
        assert_eq!(refs[0].api_default_target_url.as_deref(), Some("https://test-url.com"));
    }

    #[tokio::test]
    async fn spec_sets_protocol_and_is_returned() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let input = ApiDefinitionInput {
            spec: Some(ApiSpecInput {
                data: Some("openapi: 3.0.0".into()),
                spec_type: ApiSpecType::OpenApi,
                format: SpecFormat::Yaml,
            }),
            ..foo()
        };

        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &input).await.unwrap();
        let spec = created.spec.unwrap();
        assert_eq!(spec.spec_type, Some(ApiSpecType::OpenApi));

        let mut tx = f.store.begin().await.unwrap();
        let stored = f.services.apis.get(&f.scope, tx.conn(), created.id).await.unwrap();
        assert_eq!(stored.api_protocol.as_deref(), Some("rest"));
    }

    #[tokio::test]
    async fn other_tenant_cannot_add_to_bundle() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));

        let other = other_tenant(&f).await;
        let err = resolver.add_api_definition_to_bundle(&other, bndlid, &foo()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(f.store.snapshot().await.bundle_references().is_empty());
    }

    #[tokio::test]
    async fn failed_update_rolls_back() {
        let f = fixture().await;
        let (app_id, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &foo()).await.unwrap();

        // A second reference makes the single-bundle reference update ambiguous.
        let mut tx = f.store.begin().await.unwrap();
        let second = f
            .services
            .bundles
            .create(&f.scope, tx.conn(), app_id, &bundle_input("second"), 0)
            .await
            .unwrap();
        f.services
            .bundle_references
            .create_by_reference_object_id(
                tx.conn(),
                &BundleReferenceInput::default(),
                BundleReferenceObjectType::Api,
                created.id,
                second,
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = resolver
            .update_api_definition(&f.scope, created.id, &ApiDefinitionInput {
                name: "Bar".into(),
                ..foo()
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);

        let mut tx = f.store.begin().await.unwrap();
        let stored = f.services.apis.get(&f.scope, tx.conn(), created.id).await.unwrap();
        assert_eq!(stored.name, "Foo");
    }

    // ── update / delete ──────────────────────────────────────

    #[tokio::test]
    async fn update_replaces_fields_and_reference_url() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &foo()).await.unwrap();

        let updated = resolver
            .update_api_definition(&f.scope, created.id, &ApiDefinitionInput {
                name: "Bar".into(),
                target_url: "https://other-url.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Bar");
        assert_eq!(updated.target_url, "https://other-url.com");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_from_other_tenant_is_not_found() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &foo()).await.unwrap();

        let other = other_tenant(&f).await;
        let err = resolver
            .update_api_definition(&other, created.id, &foo())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_returns_definition_and_removes_dependents() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let input = ApiDefinitionInput {
            spec: Some(ApiSpecInput {
                data: Some("{}".into()),
                spec_type: ApiSpecType::Odata,
                format: SpecFormat::Json,
            }),
            ..foo()
        };
        let created = resolver.add_api_definition_to_bundle(&f.scope, bndlid, &input).await.unwrap();

        let deleted = resolver.delete_api_definition(&f.scope, created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);

        let state = f.store.snapshot().await;
        assert!(state.specs().is_empty());
        assert!(state.bundle_references().is_empty());
        assert!(resolver.api_definition(&f.scope, created.id).await.unwrap_err().is_not_found());
    }

    // ── listing ──────────────────────────────────────────────

    #[tokio::test]
    async fn apis_for_bundle_pages() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        for name in ["a", "b", "c"] {
            resolver
                .add_api_definition_to_bundle(&f.scope, bndlid, &ApiDefinitionInput {
                    name: name.into(),
                    ..foo()
                })
                .await
                .unwrap();
        }

        let first = resolver.apis_for_bundle(&f.scope, bndlid, 2, "").await.unwrap();
        assert_eq!(first.total_count, 3);
        assert_eq!(first.data.len(), 2);
        assert!(first.page_info.has_next_page);
        assert!(first.data.iter().all(|api| api.target_url == "https://test-url.com"));

        let second = resolver
            .apis_for_bundle(&f.scope, bndlid, 2, &first.page_info.end_cursor)
            .await
            .unwrap();
        assert_eq!(second.data.len(), 1);
        assert!(!second.page_info.has_next_page);
    }

    #[tokio::test]
    async fn apis_for_foreign_or_unknown_bundle_are_not_found() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        for name in ["a", "b", "c"] {
            resolver
                .add_api_definition_to_bundle(&f.scope, bndlid, &ApiDefinitionInput {
                    name: name.into(),
                    ..foo()
                })
                .await
                .unwrap();
        }

        let stranger = other_tenant(&f).await;
        let err = resolver.apis_for_bundle(&stranger, bndlid, 2, "").await.unwrap_err();
        assert!(err.is_not_found());

        let err = resolver.apis_for_bundle(&f.scope, Uuid::new_v4(), 2, "").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn page_size_bounds_are_enforced() {
        let f = fixture().await;
        let (_, bndlid) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let resolver = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));

        for size in [0, 201] {
            let err = resolver.apis_for_bundle(&f.scope, bndlid, size, "").await.unwrap_err();
            assert_eq!(err.http_status(), 400, "page size {size}");
        }
    }
}
