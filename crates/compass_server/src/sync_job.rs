//! DestinationSyncJob: background task that periodically re-syncs the
//! destinations of every subscribed tenant.
//!
//! Each round lists the subscribed tenants and syncs up to
//! `parallel_tenants` of them at a time. A failing tenant is logged and
//! skipped; the round carries on with the rest.

use std::sync::Arc;
use std::time::Duration;

use compass_core::service::DestinationService;
use compass_core::tenant::TenantId;
use compass_core::transaction::Transactioner;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one sync round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRound {
    pub synced: usize,
    pub failed: usize,
}

pub struct DestinationSyncJob<T: Transactioner> {
    service: Arc<DestinationService<T>>,
    interval: Duration,
    parallel_tenants: usize,
}

impl<T: Transactioner + 'static> DestinationSyncJob<T> {
    pub fn new(service: Arc<DestinationService<T>>, interval: Duration, parallel_tenants: usize) -> Self {
        Self {
            service,
            interval,
            parallel_tenants: parallel_tenants.max(1),
        }
    }

    /// Run the sync loop. This never returns under normal operation.
    /// Spawn it as a background task via `tokio::spawn`.
    pub async fn run(&self) {
        tracing::info!(
            "DestinationSyncJob started (interval={:?}, parallel_tenants={})",
            self.interval,
            self.parallel_tenants
        );
        loop {
            match self.run_once().await {
                Ok(round) => tracing::info!(
                    synced = round.synced,
                    failed = round.failed,
                    "destination sync round finished"
                ),
                Err(e) => tracing::error!("Failed to list subscribed tenants: {e}"),
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn run_once(&self) -> compass_core::Result<SyncRound> {
        let tenants = self.service.get_subscribed_tenant_ids().await?;
        tracing::debug!("Syncing destinations for {} subscribed tenants", tenants.len());

        let permits = Arc::new(Semaphore::new(self.parallel_tenants));
        let mut tasks: JoinSet<(TenantId, compass_core::Result<()>)> = JoinSet::new();
        for tenant in tenants {
            let permits = Arc::clone(&permits);
            let service = Arc::clone(&self.service);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (tenant, Err(compass_core::CompassError::internal("sync semaphore closed")));
                };
                (tenant, service.sync_tenant_destinations(tenant).await)
            });
        }

        let mut round = SyncRound::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => round.synced += 1,
                Ok((tenant, Err(e))) => {
                    tracing::error!("Failed to sync destinations for tenant {tenant}: {e}");
                    round.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Destination sync task panicked: {e}");
                    round.failed += 1;
                }
            }
        }
        Ok(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_tenant, test_destination_service, FakeDestinationApi};

    #[tokio::test]
    async fn round_syncs_subscribed_tenants_only() {
        let api = FakeDestinationApi::default();
        api.add_destination("sub-a", "dest-a");
        api.add_destination("sub-b", "dest-b");
        let (service, fixture) = test_destination_service(api.clone());

        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;
        seed_tenant(&fixture, "ext-b", Some(("sub-b", "eu10"))).await;
        seed_tenant(&fixture, "ext-c", None).await;

        let job = DestinationSyncJob::new(Arc::clone(&service), Duration::from_secs(60), 1);
        let round = job.run_once().await.unwrap();

        assert_eq!(round, SyncRound { synced: 2, failed: 0 });
        assert_eq!(api.synced_subdomains(), vec!["sub-a".to_string(), "sub-b".to_string()]);
    }

    #[tokio::test]
    async fn failing_tenant_does_not_stop_the_round() {
        let api = FakeDestinationApi::default();
        api.add_destination("sub-a", "dest-a");
        api.fail_subdomain("sub-b");
        let (service, fixture) = test_destination_service(api.clone());

        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;
        seed_tenant(&fixture, "ext-b", Some(("sub-b", "eu10"))).await;

        let round = DestinationSyncJob::new(service, Duration::from_secs(60), 4)
            .run_once()
            .await
            .unwrap();

        assert_eq!(round, SyncRound { synced: 1, failed: 1 });
    }

    #[tokio::test]
    async fn empty_round_when_nobody_is_subscribed() {
        let (service, _) = test_destination_service(FakeDestinationApi::default());
        let round = DestinationSyncJob::new(service, Duration::from_secs(60), 0)
            .run_once()
            .await
            .unwrap();
        assert_eq!(round, SyncRound::default());
    }
}
