use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CompassError, Result, WrapErr};
use crate::model::{DestinationFromService, LabelableObject};
use crate::ports::{
    BundleRepository, DestinationClient, DestinationClientFactory, DestinationRepository,
    LabelRepository, TenantRepository,
};
use crate::tenant::TenantId;
use crate::transaction::{Transaction, Transactioner};
use crate::uid::UidService;

#[derive(Debug, Clone)]
pub struct DestinationSyncConfig {
    pub subdomain_label_key: String,
    pub region_label_key: String,
    /// Concurrent sensitive-data requests per call.
    pub sensitive_concurrency: usize,
}

impl Default for DestinationSyncConfig {
    fn default() -> Self {
        Self {
            subdomain_label_key: "subdomain".into(),
            region_label_key: "region".into(),
            sensitive_concurrency: 10,
        }
    }
}

/// Mirrors a tenant's destinations from the destination service.
///
/// Unlike the CRUD services this one owns its transactions: every database
/// step commits on its own so slow HTTP calls never hold a connection.
pub struct DestinationService<T: Transactioner> {
    transactioner: Arc<T>,
    uid: Arc<dyn UidService>,
    destinations: Arc<dyn DestinationRepository<T::Conn>>,
    bundles: Arc<dyn BundleRepository<T::Conn>>,
    labels: Arc<dyn LabelRepository<T::Conn>>,
    tenants: Arc<dyn TenantRepository<T::Conn>>,
    clients: Arc<dyn DestinationClientFactory>,
    config: DestinationSyncConfig,
}

impl<T: Transactioner> DestinationService<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transactioner: Arc<T>,
        uid: Arc<dyn UidService>,
        destinations: Arc<dyn DestinationRepository<T::Conn>>,
        bundles: Arc<dyn BundleRepository<T::Conn>>,
        labels: Arc<dyn LabelRepository<T::Conn>>,
        tenants: Arc<dyn TenantRepository<T::Conn>>,
        clients: Arc<dyn DestinationClientFactory>,
        config: DestinationSyncConfig,
    ) -> Self {
        Self {
            transactioner,
            uid,
            destinations,
            bundles,
            labels,
            tenants,
            clients,
            config,
        }
    }

    /// Pulls every page of the tenant's destinations, links each to the
    /// bundles of the system it names, and purges rows from older syncs.
    pub async fn sync_tenant_destinations(&self, tenant: TenantId) -> Result<()> {
        let client = self.client_for_tenant(tenant).await?;
        let revision = self.uid.generate();

        let mut page = 1;
        loop {
            let (destinations, page_count) = client
                .fetch_tenant_destinations_page(page)
                .await
                .wrap_err_with(|| format!("while fetching page {page} of destinations for tenant {tenant}"))?;
            debug!(%tenant, page, page_count, count = destinations.len(), "fetched destinations page");

            self.map_destinations_to_tenant(tenant, &destinations, revision).await?;

            if page >= page_count {
                break;
            }
            page += 1;
        }

        if let Err(e) = self.delete_old_destinations(tenant, revision).await {
            error!(%tenant, %revision, error = %e, "failed to delete destinations of older revisions");
        }
        info!(%tenant, %revision, "synced tenant destinations");
        Ok(())
    }

    /// Full destination documents for `names`, keyed by name, under `destinations`.
    pub async fn fetch_destinations_sensitive_data(
        &self,
        tenant: TenantId,
        names: &[String],
    ) -> Result<JsonValue> {
        let client = self.client_for_tenant(tenant).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.sensitive_concurrency.max(1)));

        let mut tasks = JoinSet::new();
        for name in names {
            let client = Arc::clone(&client);
            let semaphore = Arc::clone(&semaphore);
            let name = name.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CompassError::internal(e.to_string()))?;
                let data = client.fetch_destination_sensitive_data(&name).await?;
                let value = serde_json::from_slice::<JsonValue>(&data).map_err(|e| {
                    CompassError::internal(format!("destination {name} returned invalid JSON: {e}"))
                })?;
                Ok::<_, CompassError>((name, value))
            });
        }

        let mut destinations = Map::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, value) = joined
                .map_err(|e| CompassError::internal(format!("sensitive data request failed: {e}")))??;
            destinations.insert(name, value);
        }
        Ok(json!({ "destinations": destinations }))
    }

    /// Internal ID of the tenant known externally as `external_tenant`.
    pub async fn resolve_tenant(&self, external_tenant: &str) -> Result<TenantId> {
        let mut tx = self.transactioner.begin().await?;
        let tenant = self
            .tenants
            .get_by_external_tenant(tx.conn(), external_tenant)
            .await?;
        tx.commit().await?;
        Ok(tenant.id)
    }

    pub async fn is_tenant_subscribed(&self, tenant: TenantId) -> Result<bool> {
        let mut tx = self.transactioner.begin().await?;
        let subscribed = self
            .tenants
            .exists_subscribed(tx.conn(), tenant, &self.config.subdomain_label_key)
            .await?;
        tx.commit().await?;
        Ok(subscribed)
    }

    pub async fn get_subscribed_tenant_ids(&self) -> Result<Vec<TenantId>> {
        let mut tx = self.transactioner.begin().await?;
        let tenants = self
            .tenants
            .list_subscribed(tx.conn(), &self.config.subdomain_label_key)
            .await
            .wrap_err("while listing subscribed tenants")?;
        tx.commit().await?;
        Ok(tenants.into_iter().map(|t| t.id).collect())
    }

    async fn client_for_tenant(&self, tenant: TenantId) -> Result<Arc<dyn DestinationClient>> {
        let subdomain = self.tenant_label(tenant, &self.config.subdomain_label_key).await?;
        let region = self.tenant_label(tenant, &self.config.region_label_key).await?;
        self.clients
            .client_for(&region, &subdomain)
            .await
            .wrap_err_with(|| format!("while creating destination client for tenant {tenant}"))
    }

    async fn tenant_label(&self, tenant: TenantId, key: &str) -> Result<String> {
        let mut tx = self.transactioner.begin().await?;
        let label = self
            .labels
            .get_by_key(tx.conn(), tenant, LabelableObject::Tenant, tenant.as_uuid(), key)
            .await
            .wrap_err_with(|| format!("while getting {key} label of tenant {tenant}"))?;
        tx.commit().await?;
        label
            .value_str()
            .map(str::to_string)
            .ok_or_else(|| CompassError::InvalidData(format!("{key} label of tenant {tenant} is not a string")))
    }

    async fn map_destinations_to_tenant(
        &self,
        tenant: TenantId,
        destinations: &[DestinationFromService],
        revision: Uuid,
    ) -> Result<()> {
        let mut tx = self.transactioner.begin().await?;
        for destination in destinations {
            let input = match destination.to_model() {
                Ok(input) => input,
                Err(e) => {
                    warn!(%tenant, name = %destination.name, error = %e, "skipping invalid destination");
                    continue;
                }
            };
            if !input.has_valid_identifiers() {
                debug!(%tenant, name = %input.name, "destination names no system, skipping");
                continue;
            }

            let bundles = self
                .bundles
                .list_by_destination(tx.conn(), tenant, &input)
                .await
                .wrap_err_with(|| format!("while listing bundles for destination {}", input.name))?;
            if bundles.is_empty() {
                debug!(%tenant, name = %input.name, "no bundles match destination");
                continue;
            }

            for bundle in bundles {
                self.destinations
                    .upsert(tx.conn(), &input, self.uid.generate(), tenant, bundle.id, revision)
                    .await
                    .wrap_err_with(|| {
                        format!("while upserting destination {} for bundle {}", input.name, bundle.id)
                    })?;
            }
        }
        tx.commit().await
    }

    async fn delete_old_destinations(&self, tenant: TenantId, revision: Uuid) -> Result<()> {
        let mut tx = self.transactioner.begin().await?;
        let removed = self.destinations.delete_old(tx.conn(), revision, tenant).await?;
        tx.commit().await?;
        debug!(%tenant, removed, "deleted destinations of older revisions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::memory::testing::{app_input, bundle_input, fixture, seed_bundle, seed_label, seed_tenant, Fixture};
    use crate::memory::MemoryTransactioner;
    use crate::model::{ApplicationInput, BundleInput, DestinationInput};
    use crate::uid::RandomUidService;

    #[derive(Default)]
    struct FakeClient {
        pages: Vec<Vec<DestinationFromService>>,
        sensitive: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl DestinationClient for FakeClient {
        async fn fetch_tenant_destinations_page(&self, page: u32) -> Result<(Vec<DestinationFromService>, u32)> {
            let items = self.pages.get(page as usize - 1).cloned().unwrap_or_default();
            Ok((items, self.pages.len().max(1) as u32))
        }

        async fn fetch_destination_sensitive_data(&self, name: &str) -> Result<Vec<u8>> {
            self.sensitive
                .get(name)
                .cloned()
                .ok_or_else(|| CompassError::internal(format!("unexpected destination {name}")))
        }
    }

    struct FakeFactory {
        client: Arc<FakeClient>,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DestinationClientFactory for FakeFactory {
        async fn client_for(&self, region: &str, subdomain: &str) -> Result<Arc<dyn DestinationClient>> {
            self.calls.lock().unwrap().push((region.into(), subdomain.into()));
            let client: Arc<dyn DestinationClient> = self.client.clone();
            Ok(client)
        }
    }

    fn service(f: &Fixture, client: FakeClient) -> (DestinationService<MemoryTransactioner>, Arc<FakeFactory>) {
        let factory = Arc::new(FakeFactory {
            client: Arc::new(client),
            calls: Mutex::new(Vec::new()),
        });
        let svc = DestinationService::new(
            Arc::clone(&f.store),
            Arc::new(RandomUidService),
            f.repos.destinations.clone(),
            f.repos.bundles.clone(),
            f.repos.labels.clone(),
            f.repos.tenants.clone(),
            factory.clone(),
            DestinationSyncConfig::default(),
        );
        (svc, factory)
    }

    fn destination(name: &str) -> DestinationFromService {
        DestinationFromService {
            name: name.into(),
            destination_type: "HTTP".into(),
            url: "https://s4.example.com".into(),
            authentication: "NoAuthentication".into(),
            x_correlation_id: "corr-1".into(),
            x_system_tenant_id: "sys-1".into(),
            ..Default::default()
        }
    }

    async fn subscribed_fixture() -> (Fixture, Uuid) {
        let f = fixture().await;
        seed_label(&f, f.tenant, "subdomain", "consumer").await;
        seed_label(&f, f.tenant, "region", "cf-eu10").await;
        let (_, bundle_id) = seed_bundle(
            &f,
            ApplicationInput {
                local_tenant_id: Some("sys-1".into()),
                ..app_input("s4")
            },
            BundleInput {
                correlation_ids: Some(json!(["corr-1"])),
                ..bundle_input("bndl")
            },
        )
        .await;
        (f, bundle_id)
    }

    async fn names(store: &MemoryTransactioner) -> Vec<String> {
        let mut names = store
            .snapshot()
            .await
            .destinations()
            .iter()
            .map(|d| d.name.clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    // ── sync ─────────────────────────────────────────────────

    #[tokio::test]
    async fn sync_links_matching_destinations_across_pages() {
        let (f, bundle_id) = subscribed_fixture().await;
        let mut invalid = destination("broken");
        invalid.url = String::new();
        let mut unmatched = destination("elsewhere");
        unmatched.x_system_tenant_id = "sys-2".into();
        let mut anonymous = destination("anonymous");
        anonymous.x_correlation_id = String::new();

        let (svc, factory) = service(&f, FakeClient {
            pages: vec![vec![destination("d1"), invalid], vec![unmatched, anonymous, destination("d2")]],
            ..Default::default()
        });
        svc.sync_tenant_destinations(f.tenant).await.unwrap();

        assert_eq!(names(&f.store).await, vec!["d1", "d2"]);
        let state = f.store.snapshot().await;
        assert!(state.destinations().iter().all(|d| d.bundle_id == Some(bundle_id)));
        assert_eq!(
            factory.calls.lock().unwrap().as_slice(),
            &[("cf-eu10".to_string(), "consumer".to_string())]
        );
    }

    #[tokio::test]
    async fn sync_removes_destinations_of_older_revisions() {
        let (f, bundle_id) = subscribed_fixture().await;
        let mut tx = f.store.begin().await.unwrap();
        let stale = DestinationInput {
            name: "stale".into(),
            destination_type: "HTTP".into(),
            url: "https://old".into(),
            authentication: "NoAuthentication".into(),
            ..Default::default()
        };
        f.repos
            .destinations
            .upsert(tx.conn(), &stale, Uuid::new_v4(), f.tenant, bundle_id, Uuid::new_v4())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let (svc, _) = service(&f, FakeClient {
            pages: vec![vec![destination("d1")]],
            ..Default::default()
        });
        svc.sync_tenant_destinations(f.tenant).await.unwrap();
        assert_eq!(names(&f.store).await, vec!["d1"]);

        // a second run keeps the row but moves it to the new revision
        let first_revision = f.store.snapshot().await.destinations()[0].revision;
        svc.sync_tenant_destinations(f.tenant).await.unwrap();
        let state = f.store.snapshot().await;
        assert_eq!(state.destinations().len(), 1);
        assert_ne!(state.destinations()[0].revision, first_revision);
    }

    #[tokio::test]
    async fn sync_without_region_label_fails() {
        let f = fixture().await;
        seed_label(&f, f.tenant, "subdomain", "consumer").await;
        let (svc, factory) = service(&f, FakeClient::default());

        let err = svc.sync_tenant_destinations(f.tenant).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(factory.calls.lock().unwrap().is_empty());
    }

    // ── sensitive data ───────────────────────────────────────

    #[tokio::test]
    async fn sensitive_data_is_keyed_by_name() {
        let (f, _) = subscribed_fixture().await;
        let (svc, _) = service(&f, FakeClient {
            sensitive: HashMap::from([
                ("a".to_string(), br#"{"destinationConfiguration":{"Name":"a"}}"#.to_vec()),
                ("b".to_string(), br#"{"authTokens":[]}"#.to_vec()),
            ]),
            ..Default::default()
        });

        let result = svc
            .fetch_destinations_sensitive_data(f.tenant, &["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(
            result,
            json!({
                "destinations": {
                    "a": { "destinationConfiguration": { "Name": "a" } },
                    "b": { "authTokens": [] }
                }
            })
        );
    }

    #[tokio::test]
    async fn sensitive_data_fails_on_invalid_json() {
        let (f, _) = subscribed_fixture().await;
        let (svc, _) = service(&f, FakeClient {
            sensitive: HashMap::from([("a".to_string(), b"not json".to_vec())]),
            ..Default::default()
        });

        let err = svc
            .fetch_destinations_sensitive_data(f.tenant, &["a".into()])
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    // ── subscriptions ────────────────────────────────────────

    #[tokio::test]
    async fn only_labelled_tenants_are_subscribed() {
        let (f, _) = subscribed_fixture().await;
        let other = seed_tenant(&f.store, &f.repos, None).await;
        let (svc, _) = service(&f, FakeClient::default());

        assert!(svc.is_tenant_subscribed(f.tenant).await.unwrap());
        assert!(!svc.is_tenant_subscribed(other).await.unwrap());
        assert_eq!(svc.get_subscribed_tenant_ids().await.unwrap(), vec![f.tenant]);
    }

    #[tokio::test]
    async fn external_tenant_resolves_to_internal_id() {
        let f = fixture().await;
        let (svc, _) = service(&f, FakeClient::default());

        let resolved = svc.resolve_tenant(&format!("ext-{}", f.tenant)).await.unwrap();
        assert_eq!(resolved, f.tenant);
        assert!(svc.resolve_tenant("unknown").await.unwrap_err().is_not_found());
    }
}
