use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::graphql::{Bundle, BundleCreateInput, BundleUpdateInput};
use crate::model::BundleInput;
use crate::service::Services;
use crate::tenant::RequestScope;
use crate::transaction::{Transaction, Transactioner};

pub struct BundleResolver<T: Transactioner> {
    transactioner: Arc<T>,
    services: Arc<Services<T::Conn>>,
}

impl<T: Transactioner> BundleResolver<T> {
    pub fn new(transactioner: Arc<T>, services: Arc<Services<T::Conn>>) -> Self {
        Self {
            transactioner,
            services,
        }
    }

    pub async fn add_bundle(
        &self,
        scope: &RequestScope,
        application_id: Uuid,
        input: &BundleCreateInput,
    ) -> Result<Bundle> {
        let mut tx = self.transactioner.begin().await?;

        let input = BundleInput::from(input);
        let id = self
            .services
            .bundles
            .create(scope, tx.conn(), application_id, &input, 0)
            .await?;
        let bundle = self.services.bundles.get(scope, tx.conn(), id).await?;

        tx.commit().await?;
        Ok(Bundle::from(&bundle))
    }

    pub async fn bundle(&self, scope: &RequestScope, id: Uuid) -> Result<Bundle> {
        let mut tx = self.transactioner.begin().await?;
        let bundle = self.services.bundles.get(scope, tx.conn(), id).await?;
        tx.commit().await?;
        Ok(Bundle::from(&bundle))
    }

    pub async fn bundles_for_application(&self, scope: &RequestScope, application_id: Uuid) -> Result<Vec<Bundle>> {
        let mut tx = self.transactioner.begin().await?;
        let bundles = self
            .services
            .bundles
            .list_by_application_id(scope, tx.conn(), application_id)
            .await?;
        tx.commit().await?;
        Ok(bundles.iter().map(Bundle::from).collect())
    }

    pub async fn update_bundle(&self, scope: &RequestScope, id: Uuid, input: &BundleUpdateInput) -> Result<Bundle> {
        let mut tx = self.transactioner.begin().await?;

        let existing = self.services.bundles.get(scope, tx.conn(), id).await?;
        let input = input.merge_into(&existing);
        self.services.bundles.update(scope, tx.conn(), id, &input).await?;
        let bundle = self.services.bundles.get(scope, tx.conn(), id).await?;

        tx.commit().await?;
        Ok(Bundle::from(&bundle))
    }

    /// Deletes the bundle with its definitions and returns it as it was.
    pub async fn delete_bundle(&self, scope: &RequestScope, id: Uuid) -> Result<Bundle> {
        let mut tx = self.transactioner.begin().await?;

        let bundle = self.services.bundles.get(scope, tx.conn(), id).await?;
        self.services.bundles.delete(scope, tx.conn(), id).await?;

        tx.commit().await?;
        Ok(Bundle::from(&bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::{ApiDefinitionInput, EventDefinitionInput, EventSpecInput};
    use crate::memory::testing::{app_input, bundle_input, fixture, seed_bundle};
    use crate::model::{EventSpecType, SpecFormat};
    use crate::resolver::ApiDefinitionResolver;
    use crate::resource::ResourceType;

    #[tokio::test]
    async fn add_and_update_bundle() {
        let f = fixture().await;
        let (app_id, _) = seed_bundle(&f, app_input("app"), bundle_input("first")).await;
        let resolver = BundleResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));

        let created = resolver
            .add_bundle(&f.scope, app_id, &BundleCreateInput {
                name: "second".into(),
                correlation_ids: vec!["corr".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.application_id, Some(app_id));

        let updated = resolver
            .update_bundle(&f.scope, created.id, &BundleUpdateInput {
                name: "renamed".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.correlation_ids, vec!["corr".to_string()]);
        assert!(updated.updated_at.is_some());

        let all = resolver.bundles_for_application(&f.scope, app_id).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn adding_to_unknown_application_is_unauthorized() {
        let f = fixture().await;
        let resolver = BundleResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));

        let err = resolver
            .add_bundle(&f.scope, Uuid::new_v4(), &BundleCreateInput {
                name: "orphan".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert!(f.store.snapshot().await.bundle_references().is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_to_definitions() {
        let f = fixture().await;
        let (app_id, bundle_id) = seed_bundle(&f, app_input("app"), bundle_input("bndl")).await;
        let apis = ApiDefinitionResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        apis.add_api_definition_to_bundle(&f.scope, bundle_id, &ApiDefinitionInput {
            name: "Foo".into(),
            target_url: "https://test-url.com".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let mut tx = f.store.begin().await.unwrap();
        let (event, spec) = EventDefinitionInput {
            name: "OrderCreated".into(),
            spec: Some(EventSpecInput {
                data: Some("asyncapi: 2.0.0".into()),
                spec_type: EventSpecType::AsyncApiV2,
                format: SpecFormat::Yaml,
            }),
            ..Default::default()
        }
        .to_input();
        f.services
            .events
            .create_in_bundle(&f.scope, tx.conn(), ResourceType::Application, app_id, bundle_id, &event, spec.as_ref())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let resolver = BundleResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let deleted = resolver.delete_bundle(&f.scope, bundle_id).await.unwrap();
        assert_eq!(deleted.id, bundle_id);

        let state = f.store.snapshot().await;
        assert!(state.bundle_references().is_empty());
        assert!(state.specs().is_empty());
        assert!(resolver.bundle(&f.scope, bundle_id).await.unwrap_err().is_not_found());
    }
}
