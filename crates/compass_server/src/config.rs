//! Server configuration from `APP_*` environment variables.
//!
//! `Config::from_env` reads the process environment (after loading `.env`
//! in `main`); `Config::from_lookup` takes any key lookup so tests can
//! feed a map.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use compass_postgres::DatabaseConfig;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub destinations: DestinationApiConfig,
    /// Destination service instance per region.
    pub instances: HashMap<String, InstanceConfig>,
    pub job: SyncJobConfig,
    pub subdomain_label_key: String,
    pub region_label_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub root_api: String,
    pub timeout: Duration,
}

/// Paging, retry and endpoint settings of the destination service API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationApiConfig {
    pub timeout: Duration,
    pub page_size: u32,
    pub retry_attempts: u32,
    pub retry_interval: Duration,
    pub sensitive_goroutine_limit: usize,
    pub endpoint_get_tenant_destinations: String,
    pub endpoint_find_destination: String,
    pub paging_page_param: String,
    pub paging_size_param: String,
    pub paging_count_param: String,
    pub paging_count_header: String,
    pub oauth_token_path: String,
    pub response_correlation_id_header: String,
}

impl Default for DestinationApiConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            page_size: 100,
            retry_attempts: 3,
            retry_interval: Duration::from_millis(100),
            sensitive_goroutine_limit: 10,
            endpoint_get_tenant_destinations: "/destination-configuration/v1/subaccountDestinations".into(),
            endpoint_find_destination: "/destination-configuration/v1/destinations".into(),
            paging_page_param: "$page".into(),
            paging_size_param: "$pageSize".into(),
            paging_count_param: "$pageCount".into(),
            paging_count_header: "Page-Count".into(),
            oauth_token_path: "/oauth/token".into(),
            response_correlation_id_header: "x-vcap-request-id".into(),
        }
    }
}

/// OAuth client and base URL of one destination service instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub client_id: String,
    pub client_secret: String,
    pub url: String,
    /// Token URL of the provider subaccount; its first host label is
    /// replaced with the tenant subdomain per request.
    pub token_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJobConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub parallel_tenants: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);
        let db_defaults = DatabaseConfig::default();
        let api_defaults = DestinationApiConfig::default();

        let instances = match env.raw("APP_DESTINATION_INSTANCES") {
            Some(raw) => serde_json::from_str::<HashMap<String, InstanceConfig>>(&raw)
                .context("APP_DESTINATION_INSTANCES must be a JSON object of region to instance config")?,
            None => HashMap::new(),
        };

        Ok(Self {
            server: ServerConfig {
                address: env.string("APP_ADDRESS", "127.0.0.1:3000"),
                root_api: env.string("APP_ROOT_API", "/destination-configuration/v1"),
                timeout: env.duration("APP_SERVER_TIMEOUT", Duration::from_secs(110))?,
            },
            database: DatabaseConfig {
                user: env.string("APP_DB_USER", &db_defaults.user),
                password: env.string("APP_DB_PASSWORD", &db_defaults.password),
                host: env.string("APP_DB_HOST", &db_defaults.host),
                port: env.parsed("APP_DB_PORT", db_defaults.port)?,
                name: env.string("APP_DB_NAME", &db_defaults.name),
                ssl_mode: env.string("APP_DB_SSL", &db_defaults.ssl_mode),
                max_open_connections: env.parsed("APP_DB_MAX_OPEN_CONNECTIONS", db_defaults.max_open_connections)?,
                acquire_timeout: env.duration("APP_DB_ACQUIRE_TIMEOUT", db_defaults.acquire_timeout)?,
            },
            jwt_secret: env.raw("APP_JWT_SECRET").ok_or_else(|| anyhow!("APP_JWT_SECRET must be set"))?,
            destinations: DestinationApiConfig {
                timeout: env.duration("APP_DESTINATIONS_TIMEOUT", api_defaults.timeout)?,
                page_size: env.parsed("APP_DESTINATIONS_PAGE_SIZE", api_defaults.page_size)?,
                retry_attempts: env.parsed("APP_DESTINATIONS_RETRY_ATTEMPTS", api_defaults.retry_attempts)?,
                retry_interval: env.duration("APP_DESTINATIONS_RETRY_INTERVAL", api_defaults.retry_interval)?,
                sensitive_goroutine_limit: env.parsed(
                    "APP_DESTINATIONS_SENSITIVE_GOROUTINE_LIMIT",
                    api_defaults.sensitive_goroutine_limit,
                )?,
                endpoint_get_tenant_destinations: env.string(
                    "APP_ENDPOINT_GET_TENANT_DESTINATIONS",
                    &api_defaults.endpoint_get_tenant_destinations,
                ),
                endpoint_find_destination: env
                    .string("APP_ENDPOINT_FIND_DESTINATION", &api_defaults.endpoint_find_destination),
                paging_page_param: env.string("APP_DESTINATIONS_PAGE_PARAM", &api_defaults.paging_page_param),
                paging_size_param: env.string("APP_DESTINATIONS_PAGE_SIZE_PARAM", &api_defaults.paging_size_param),
                paging_count_param: env
                    .string("APP_DESTINATIONS_PAGE_COUNT_PARAM", &api_defaults.paging_count_param),
                paging_count_header: env
                    .string("APP_DESTINATIONS_PAGE_COUNT_HEADER", &api_defaults.paging_count_header),
                oauth_token_path: env.string("APP_DESTINATION_OAUTH_TOKEN_PATH", &api_defaults.oauth_token_path),
                response_correlation_id_header: env.string(
                    "APP_DESTINATIONS_RESPONSE_CORRELATION_ID_HEADER",
                    &api_defaults.response_correlation_id_header,
                ),
            },
            instances,
            job: SyncJobConfig {
                enabled: env.parsed("APP_DESTINATION_FETCHER_JOB_ENABLED", true)?,
                interval: env.duration("APP_DESTINATION_FETCHER_SCHEDULE", Duration::from_secs(600))?,
                parallel_tenants: env.parsed("APP_DESTINATION_FETCHER_PARALLEL_TENANTS", 10)?,
            },
            subdomain_label_key: env.string("APP_SUBDOMAIN_LABEL_KEY", "subdomain"),
            region_label_key: env.string("APP_REGION_LABEL_KEY", "region"),
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Unset and blank values both count as missing.
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow!("invalid value {raw:?} for {key}: {e}")),
            None => Ok(default),
        }
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.raw(key) {
            Some(raw) => parse_duration(&raw).with_context(|| format!("invalid duration for {key}")),
            None => Ok(default),
        }
    }
}

/// Parses durations like `100ms`, `5s`, `10m`, `1h` or `1m30s`.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    if raw.is_empty() {
        bail!("empty duration");
    }

    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            bail!("expected a number in duration {raw:?}");
        }
        let value: u64 = rest[..digits].parse()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            "" => bail!("missing unit in duration {raw:?}"),
            unit => bail!("unknown unit {unit:?} in duration {raw:?}"),
        };
        total += part;
        rest = &rest[unit_len..];
    }
    Ok(total)
}
