//! HTTP client for the destination service.
//!
//! One client per tenant subdomain: it fetches an OAuth2 client-credentials
//! token from the instance's token URL (first host label replaced with the
//! subdomain), caches it until shortly before expiry, and retries requests
//! answered with a 5xx status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use compass_core::error::{CompassError, Result};
use compass_core::model::DestinationFromService;
use compass_core::ports::{DestinationClient, DestinationClientFactory};
use compass_core::resource::ResourceType;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::config::{DestinationApiConfig, InstanceConfig};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    valid_until: Instant,
}

pub struct HttpDestinationClient {
    http: Client,
    api: Arc<DestinationApiConfig>,
    instance: InstanceConfig,
    token: Mutex<Option<CachedToken>>,
}

impl HttpDestinationClient {
    /// `instance.token_url` must already point at the tenant's token endpoint.
    pub fn new(http: Client, api: Arc<DestinationApiConfig>, instance: InstanceConfig) -> Self {
        Self {
            http,
            api,
            instance,
            token: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + self.api.timeout < token.valid_until {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(&self.instance.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.instance.client_id.as_str()),
                ("client_secret", self.instance.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CompassError::internal(format!("token request failed: {e}")))?;
        if response.status() != StatusCode::OK {
            return Err(CompassError::internal(format!(
                "token request failed with {}",
                response.status()
            )));
        }
        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CompassError::internal(format!("failed to decode token: {e}")))?;

        debug!(expires_in = token.expires_in, "fetched destination service token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            valid_until: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    /// Sends the request built by `build`, retrying transport errors and
    /// 5xx answers up to `retry_attempts` times.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.api.retry_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match build().send().await {
                Ok(response) if !response.status().is_server_error() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    last_error = format!("request failed with status code {}, error message: {body}", status.as_u16());
                }
                Err(e) => last_error = format!("failed to execute HTTP request: {e}"),
            }
            if attempt < attempts {
                warn!(attempt, attempts, error = %last_error, "destination service request failed, retrying");
                tokio::time::sleep(self.api.retry_interval).await;
            }
        }
        Err(CompassError::internal(last_error))
    }
}

#[async_trait]
impl DestinationClient for HttpDestinationClient {
    async fn fetch_tenant_destinations_page(&self, page: u32) -> Result<(Vec<DestinationFromService>, u32)> {
        let token = self.token().await?;
        let url = format!("{}{}", self.instance.url, self.api.endpoint_get_tenant_destinations);
        let page_param = page.to_string();
        let size_param = self.api.page_size.to_string();
        let query = [
            (self.api.paging_count_param.as_str(), "true"),
            (self.api.paging_page_param.as_str(), page_param.as_str()),
            (self.api.paging_size_param.as_str(), size_param.as_str()),
        ];

        let started = Instant::now();
        let response = self
            .send_with_retry(|| self.http.get(&url).query(&query).bearer_auth(&token))
            .await?;
        if response.status() != StatusCode::OK {
            return Err(CompassError::internal(format!(
                "received status code {} when trying to fetch destinations",
                response.status().as_u16()
            )));
        }

        let header = &self.api.paging_count_header;
        let page_count = response
            .headers()
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CompassError::internal(format!("missing '{header}' header from destinations response")))?;
        let page_count = page_count
            .parse::<u32>()
            .map_err(|_| CompassError::internal(format!("invalid header '{header}' '{page_count}'")))?;
        let request_id = response
            .headers()
            .get(self.api.response_correlation_id_header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let destinations = response
            .json::<Vec<DestinationFromService>>()
            .await
            .map_err(|e| CompassError::internal(format!("failed to decode response body: {e}")))?;

        let elapsed = started.elapsed();
        if elapsed > self.api.timeout / 2 {
            warn!(page, page_count, ?elapsed, %request_id, "slow destinations page");
        } else {
            debug!(page, page_count, ?elapsed, %request_id, "fetched destinations page");
        }
        Ok((destinations, page_count))
    }

    async fn fetch_destination_sensitive_data(&self, name: &str) -> Result<Vec<u8>> {
        let token = self.token().await?;
        let url = format!("{}{}/{}", self.instance.url, self.api.endpoint_find_destination, name);

        let response = self
            .send_with_retry(|| self.http.get(&url).bearer_auth(&token))
            .await?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CompassError::not_found(ResourceType::Destination, name)),
            status => {
                return Err(CompassError::internal(format!(
                    "received status code {} when trying to get destination info for {name}",
                    status.as_u16()
                )))
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CompassError::internal(format!("failed to read body of response: {e}")))?;
        Ok(body.to_vec())
    }
}

/// Builds clients from the per-region instance configuration.
pub struct HttpDestinationClientFactory {
    http: Client,
    api: Arc<DestinationApiConfig>,
    instances: HashMap<String, InstanceConfig>,
}

impl HttpDestinationClientFactory {
    pub fn new(api: DestinationApiConfig, instances: HashMap<String, InstanceConfig>) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(api.timeout).build()?;
        Ok(Self {
            http,
            api: Arc::new(api),
            instances,
        })
    }
}

#[async_trait]
impl DestinationClientFactory for HttpDestinationClientFactory {
    async fn client_for(&self, region: &str, subdomain: &str) -> Result<Arc<dyn DestinationClient>> {
        let mut instance = self
            .instances
            .get(region)
            .cloned()
            .ok_or_else(|| CompassError::InvalidData(format!("no destination instance configured for region {region}")))?;
        instance.token_url = token_url_for_subdomain(&instance.token_url, subdomain, &self.api.oauth_token_path)?;

        let client: Arc<dyn DestinationClient> =
            Arc::new(HttpDestinationClient::new(self.http.clone(), Arc::clone(&self.api), instance));
        Ok(client)
    }
}

/// Swaps the first host label of `base` for `subdomain` and appends the token path.
pub fn token_url_for_subdomain(base: &str, subdomain: &str, token_path: &str) -> Result<String> {
    let parsed = Url::parse(base).map_err(|e| CompassError::InvalidData(format!("failed to parse auth url '{base}': {e}")))?;
    let host = parsed.host_str().unwrap_or_default();
    let original = match host.split('.').collect::<Vec<_>>().as_slice() {
        [first, _, ..] => first.to_string(),
        _ => {
            return Err(CompassError::InvalidData(format!("auth url '{base}' should have a subdomain")));
        }
    };
    Ok(format!("{}{}", base.replacen(&original, subdomain, 1), token_path))
}
