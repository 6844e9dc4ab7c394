//! Test doubles for the destination service and a memory-backed app state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use compass_core::error::{CompassError, Result};
use compass_core::memory::{repositories, MemoryState, MemoryTransactioner};
use compass_core::model::{
    BusinessTenantMapping, DestinationFromService, Label, LabelableObject, TenantStatus, TenantType,
};
use compass_core::ports::{DestinationClient, DestinationClientFactory};
use compass_core::resolver::Resolvers;
use compass_core::resource::ResourceType;
use compass_core::service::{DestinationService, DestinationSyncConfig, Repositories, Services};
use compass_core::tenant::TenantId;
use compass_core::transaction::{Transaction, Transactioner};
use compass_core::uid::RandomUidService;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Default)]
struct FakeApiState {
    /// subdomain → destination names
    destinations: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    synced: BTreeSet<String>,
}

/// Destination service stand-in keyed by tenant subdomain.
#[derive(Clone, Default)]
pub(crate) struct FakeDestinationApi {
    state: Arc<Mutex<FakeApiState>>,
}

impl FakeDestinationApi {
    pub fn add_destination(&self, subdomain: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .destinations
            .entry(subdomain.into())
            .or_default()
            .push(name.into());
    }

    pub fn fail_subdomain(&self, subdomain: &str) {
        self.state.lock().unwrap().failing.insert(subdomain.into());
    }

    /// Subdomains whose destinations were listed, sorted.
    pub fn synced_subdomains(&self) -> Vec<String> {
        self.state.lock().unwrap().synced.iter().cloned().collect()
    }
}

struct FakeClient {
    subdomain: String,
    api: FakeDestinationApi,
}

#[async_trait]
impl DestinationClient for FakeClient {
    async fn fetch_tenant_destinations_page(&self, _page: u32) -> Result<(Vec<DestinationFromService>, u32)> {
        let mut state = self.api.state.lock().unwrap();
        if state.failing.contains(&self.subdomain) {
            return Err(CompassError::internal("received status code 500 when trying to fetch destinations"));
        }
        state.synced.insert(self.subdomain.clone());
        let destinations = state
            .destinations
            .get(&self.subdomain)
            .into_iter()
            .flatten()
            .map(|name| DestinationFromService {
                name: name.clone(),
                destination_type: "HTTP".into(),
                url: format!("https://{name}.example.com"),
                authentication: "NoAuthentication".into(),
                ..Default::default()
            })
            .collect();
        Ok((destinations, 1))
    }

    async fn fetch_destination_sensitive_data(&self, name: &str) -> Result<Vec<u8>> {
        let state = self.api.state.lock().unwrap();
        let known = state
            .destinations
            .get(&self.subdomain)
            .is_some_and(|names| names.iter().any(|n| n == name));
        if !known {
            return Err(CompassError::not_found(ResourceType::Destination, name));
        }
        let body = serde_json::json!({
            "destinationConfiguration": { "Name": name },
            "authTokens": [{ "type": "Bearer", "value": format!("secret-{name}") }],
        });
        serde_json::to_vec(&body).map_err(|e| CompassError::internal(e.to_string()))
    }
}

#[async_trait]
impl DestinationClientFactory for FakeDestinationApi {
    async fn client_for(&self, _region: &str, subdomain: &str) -> Result<Arc<dyn DestinationClient>> {
        Ok(Arc::new(FakeClient {
            subdomain: subdomain.into(),
            api: self.clone(),
        }))
    }
}

pub(crate) struct TestFixture {
    pub store: Arc<MemoryTransactioner>,
    pub repos: Repositories<MemoryState>,
    pub services: Arc<Services<MemoryState>>,
}

impl TestFixture {
    fn new() -> Self {
        let repos = repositories();
        let services = Arc::new(Services::new(&repos, Arc::new(RandomUidService)));
        Self {
            store: Arc::new(MemoryTransactioner::new()),
            repos,
            services,
        }
    }

    fn destination_service(&self, api: FakeDestinationApi) -> Arc<DestinationService<MemoryTransactioner>> {
        Arc::new(DestinationService::new(
            Arc::clone(&self.store),
            Arc::new(RandomUidService),
            Arc::clone(&self.repos.destinations),
            Arc::clone(&self.repos.bundles),
            Arc::clone(&self.repos.labels),
            Arc::clone(&self.repos.tenants),
            Arc::new(api),
            DestinationSyncConfig::default(),
        ))
    }
}

pub(crate) fn test_destination_service(
    api: FakeDestinationApi,
) -> (Arc<DestinationService<MemoryTransactioner>>, TestFixture) {
    let fixture = TestFixture::new();
    (fixture.destination_service(api), fixture)
}

pub(crate) fn test_state(api: FakeDestinationApi) -> (Arc<AppState<MemoryTransactioner>>, TestFixture) {
    let fixture = TestFixture::new();
    let resolvers = Resolvers::new(Arc::clone(&fixture.store), Arc::clone(&fixture.services));
    let state = AppState::new(resolvers, fixture.destination_service(api));
    (Arc::new(state), fixture)
}

/// Commits a subaccount tenant. With `subscription` it also gets the
/// subdomain and region labels that mark it as subscribed.
pub(crate) async fn seed_tenant(
    fixture: &TestFixture,
    external_tenant: &str,
    subscription: Option<(&str, &str)>,
) -> TenantId {
    let id = TenantId(Uuid::new_v4());
    let mut tx = fixture.store.begin().await.unwrap();
    fixture
        .repos
        .tenants
        .create(
            tx.conn(),
            &BusinessTenantMapping {
                id,
                external_tenant: external_tenant.into(),
                name: external_tenant.into(),
                subdomain: subscription.map(|(subdomain, _)| subdomain.to_string()),
                parent: None,
                tenant_type: TenantType::Subaccount,
                provider: "test".into(),
                status: TenantStatus::Active,
            },
        )
        .await
        .unwrap();

    if let Some((subdomain, region)) = subscription {
        for (key, value) in [("subdomain", subdomain), ("region", region)] {
            fixture
                .repos
                .labels
                .create(
                    tx.conn(),
                    &Label {
                        id: Uuid::new_v4(),
                        tenant_id: id,
                        key: key.into(),
                        value: serde_json::Value::String(value.into()),
                        object_type: LabelableObject::Tenant,
                        object_id: id.as_uuid(),
                    },
                )
                .await
                .unwrap();
        }
    }
    tx.commit().await.unwrap();
    id
}
