//! Shared fixtures for tests running on the in-memory adapter.

use std::sync::Arc;

use uuid::Uuid;

use super::{repositories, MemoryState, MemoryTransactioner};
use crate::model::{
    ApplicationInput, BundleInput, BusinessTenantMapping, Label, LabelableObject, TenantStatus,
    TenantType,
};
use crate::service::{Repositories, Services};
use crate::tenant::{RequestScope, TenantId};
use crate::transaction::{Transaction, Transactioner};
use crate::uid::RandomUidService;

pub(crate) struct Fixture {
    pub store: Arc<MemoryTransactioner>,
    pub repos: Repositories<MemoryState>,
    pub services: Arc<Services<MemoryState>>,
    pub tenant: TenantId,
    pub scope: RequestScope,
}

pub(crate) async fn fixture() -> Fixture {
    let store = Arc::new(MemoryTransactioner::new());
    let repos = repositories();
    let services = Arc::new(Services::new(&repos, Arc::new(RandomUidService)));
    let tenant = seed_tenant(&store, &repos, None).await;
    Fixture {
        store,
        repos,
        services,
        tenant,
        scope: RequestScope::for_tenant(tenant),
    }
}

pub(crate) async fn seed_tenant(
    store: &MemoryTransactioner,
    repos: &Repositories<MemoryState>,
    parent: Option<TenantId>,
) -> TenantId {
    let id = TenantId(Uuid::new_v4());
    let mut tx = store.begin().await.unwrap();
    repos
        .tenants
        .create(
            tx.conn(),
            &BusinessTenantMapping {
                id,
                external_tenant: format!("ext-{id}"),
                name: "tenant".into(),
                subdomain: Some("sub".into()),
                parent,
                tenant_type: TenantType::Subaccount,
                provider: "test".into(),
                status: TenantStatus::Active,
            },
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();
    id
}

pub(crate) async fn other_tenant(f: &Fixture) -> RequestScope {
    RequestScope::for_tenant(seed_tenant(&f.store, &f.repos, None).await)
}

pub(crate) async fn seed_label(f: &Fixture, tenant: TenantId, key: &str, value: &str) {
    let mut tx = f.store.begin().await.unwrap();
    f.repos
        .labels
        .create(
            tx.conn(),
            &Label {
                id: Uuid::new_v4(),
                tenant_id: tenant,
                key: key.into(),
                value: serde_json::Value::String(value.into()),
                object_type: LabelableObject::Tenant,
                object_id: tenant.as_uuid(),
            },
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

/// Commits an application with one bundle for the fixture tenant.
pub(crate) async fn seed_bundle(f: &Fixture, app: ApplicationInput, bundle: BundleInput) -> (Uuid, Uuid) {
    let mut tx = f.store.begin().await.unwrap();
    let app_id = f.services.applications.create(&f.scope, tx.conn(), &app).await.unwrap();
    let bundle_id = f
        .services
        .bundles
        .create(&f.scope, tx.conn(), app_id, &bundle, 0)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    (app_id, bundle_id)
}

pub(crate) fn app_input(name: &str) -> ApplicationInput {
    ApplicationInput {
        name: name.into(),
        ..Default::default()
    }
}

pub(crate) fn bundle_input(name: &str) -> BundleInput {
    BundleInput {
        name: name.into(),
        ..Default::default()
    }
}
