//! compass_server: director REST server with the destination fetcher.
//!
//! Configuration comes from `APP_*` environment variables (see `config`);
//! a `.env` file in the working directory is loaded first when present.

use std::sync::Arc;

use anyhow::Context;
use compass_core::resolver::Resolvers;
use compass_core::service::{DestinationService, DestinationSyncConfig, Services};
use compass_core::uid::{RandomUidService, UidService};
use compass_postgres::{mask_database_url, repositories, PgTransactioner};
use compass_server::client::HttpDestinationClientFactory;
use compass_server::config::Config;
use compass_server::middleware::jwt::JwtConfig;
use compass_server::router::build_router;
use compass_server::state::AppState;
use compass_server::sync_job::DestinationSyncJob;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,compass_server=debug,compass_core=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Create PgPool
    tracing::info!("Connecting to {}", mask_database_url(&config.database.url()));
    let pool = config
        .database
        .connect()
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");

    let transactioner = Arc::new(PgTransactioner::new(pool));
    let repos = repositories();
    let uid: Arc<dyn UidService> = Arc::new(RandomUidService);
    let services = Arc::new(Services::new(&repos, Arc::clone(&uid)));

    let clients = HttpDestinationClientFactory::new(config.destinations.clone(), config.instances.clone())
        .context("failed to build destination HTTP client")?;
    let destinations = Arc::new(DestinationService::new(
        Arc::clone(&transactioner),
        uid,
        Arc::clone(&repos.destinations),
        Arc::clone(&repos.bundles),
        Arc::clone(&repos.labels),
        Arc::clone(&repos.tenants),
        Arc::new(clients),
        DestinationSyncConfig {
            subdomain_label_key: config.subdomain_label_key.clone(),
            region_label_key: config.region_label_key.clone(),
            sensitive_concurrency: config.destinations.sensitive_goroutine_limit,
        },
    ));

    // Start destination sync job as background task
    if config.job.enabled {
        let job = DestinationSyncJob::new(
            Arc::clone(&destinations),
            config.job.interval,
            config.job.parallel_tenants,
        );
        tokio::spawn(async move {
            job.run().await;
        });
        tracing::info!("DestinationSyncJob spawned (interval={:?})", config.job.interval);
    } else {
        tracing::info!("DestinationSyncJob disabled");
    }

    let state = Arc::new(AppState::new(Resolvers::new(transactioner, services), destinations));
    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes());
    let app = build_router(state, jwt_config, &config.server.root_api, config.server.timeout);

    // Bind and serve
    let listener = TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.address))?;
    tracing::info!("compass_server listening on {}", config.server.address);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
