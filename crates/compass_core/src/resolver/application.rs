use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::graphql::{Application, ApplicationRegisterInput};
use crate::model::ApplicationInput;
use crate::service::Services;
use crate::tenant::RequestScope;
use crate::transaction::{Transaction, Transactioner};

pub struct ApplicationResolver<T: Transactioner> {
    transactioner: Arc<T>,
    services: Arc<Services<T::Conn>>,
}

impl<T: Transactioner> ApplicationResolver<T> {
    pub fn new(transactioner: Arc<T>, services: Arc<Services<T::Conn>>) -> Self {
        Self {
            transactioner,
            services,
        }
    }

    pub async fn register_application(
        &self,
        scope: &RequestScope,
        input: &ApplicationRegisterInput,
    ) -> Result<Application> {
        let mut tx = self.transactioner.begin().await?;

        let input = ApplicationInput::from(input);
        let id = self.services.applications.create(scope, tx.conn(), &input).await?;
        let app = self.services.applications.get(scope, tx.conn(), id).await?;

        tx.commit().await?;
        Ok(Application::from(&app))
    }

    /// `None` when the application does not exist or belongs to another tenant.
    pub async fn application(&self, scope: &RequestScope, id: Uuid) -> Result<Option<Application>> {
        let mut tx = self.transactioner.begin().await?;

        let app = match self.services.applications.get(scope, tx.conn(), id).await {
            Ok(app) => app,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(Some(Application::from(&app)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransactioner;
    use crate::memory::testing::{fixture, other_tenant};

    #[tokio::test]
    async fn register_then_get() {
        let f = fixture().await;
        let resolver = ApplicationResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let input = ApplicationRegisterInput {
            name: "s4".into(),
            base_url: Some("https://s4.example.com".into()),
            ..Default::default()
        };

        let created = resolver.register_application(&f.scope, &input).await.unwrap();
        assert!(created.ready);
        assert_eq!(created.name, "s4");

        let fetched = resolver.application(&f.scope, created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn other_tenant_sees_nothing() {
        let f = fixture().await;
        let resolver: ApplicationResolver<MemoryTransactioner> =
            ApplicationResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let created = resolver
            .register_application(&f.scope, &ApplicationRegisterInput {
                name: "s4".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let scope = other_tenant(&f).await;
        assert_eq!(resolver.application(&scope, created.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_without_tenant_fails() {
        let f = fixture().await;
        let resolver = ApplicationResolver::new(Arc::clone(&f.store), Arc::clone(&f.services));
        let err = resolver
            .register_application(&RequestScope::anonymous(), &ApplicationRegisterInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }
}
