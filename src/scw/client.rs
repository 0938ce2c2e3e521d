//! Scaleway Client
//!
//! Main client for interacting with Scaleway APIs, combining credentials,
//! locality defaults and HTTP functionality.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::auth::Credentials;
use super::error::{Result, ScwError};
use super::http::{with_query, ScwHttpClient};
use super::locality::{Region, Zone};

/// Page size used when walking paginated list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default delay between two polls of a transient resource
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Main Scaleway client
#[derive(Clone)]
pub struct ScwClient {
    pub credentials: Credentials,
    pub http: ScwHttpClient,
    base_url: String,
    retry_interval: Duration,
}

impl std::fmt::Debug for ScwClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScwClient")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}

impl ScwClient {
    /// Create a new client; the secret key is required
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.require_secret_key()?;
        let base_url = credentials.api_url().trim_end_matches('/').to_string();
        let http = ScwHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            base_url,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        })
    }

    /// Override the polling interval used by waiters
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Copy of this client whose default zone is `zone` (used by sweepers)
    pub fn for_zone(&self, zone: &Zone) -> Self {
        let mut client = self.clone();
        client.credentials.default_zone = Some(zone.clone());
        client.credentials.default_region = Some(zone.region());
        client
    }

    /// Copy of this client whose default region is `region`
    pub fn for_region(&self, region: &Region) -> Self {
        let mut client = self.clone();
        client.credentials.default_region = Some(region.clone());
        client.credentials.default_zone = Some(region.first_zone());
        client
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token(&self) -> Result<&str> {
        self.credentials.require_secret_key()
    }

    pub fn default_zone(&self) -> Option<Zone> {
        self.credentials.zone()
    }

    pub fn default_region(&self) -> Option<Region> {
        self.credentials.region()
    }

    pub fn default_project_id(&self) -> Option<&str> {
        self.credentials.default_project_id.as_deref()
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// `https://api.scaleway.com/{product}/{version}/zones/{zone}/{path}`
    pub fn zoned_url(&self, product: &str, version: &str, zone: &Zone, path: &str) -> String {
        format!(
            "{}/{}/{}/zones/{}/{}",
            self.base_url, product, version, zone, path
        )
    }

    /// `https://api.scaleway.com/{product}/{version}/regions/{region}/{path}`
    pub fn regional_url(
        &self,
        product: &str,
        version: &str,
        region: &Region,
        path: &str,
    ) -> String {
        format!(
            "{}/{}/{}/regions/{}/{}",
            self.base_url, product, version, region, path
        )
    }

    /// `https://api.scaleway.com/{product}/{version}/{path}`
    pub fn global_url(&self, product: &str, version: &str, path: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, product, version, path)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.http.get(url, self.token()?).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.http.post(url, self.token()?, body).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        self.http.patch(url, self.token()?, body).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.http.put(url, self.token()?, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        self.http.delete(url, self.token()?).await
    }

    /// Walk every page of a list endpoint and collect the items found under
    /// `items_key`. Stops when `total_count` items are collected or a page
    /// comes back empty.
    pub async fn list_all<T: DeserializeOwned>(&self, url: &str, items_key: &str) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1u32;

        loop {
            let page_url = with_query(
                url,
                &[
                    ("page", page.to_string()),
                    ("page_size", DEFAULT_PAGE_SIZE.to_string()),
                ],
            );
            let response: Value = self.get(&page_url).await?;

            let items = match response.get(items_key) {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(ScwError::Decode(serde::de::Error::custom(format!(
                        "expected `{}` to be a list, got {}",
                        items_key, other
                    ))))
                }
            };
            let total_count = response
                .get("total_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);

            let page_len = items.len();
            for item in items {
                all_items.push(serde_json::from_value(item)?);
            }

            if page_len == 0 || all_items.len() as u64 >= total_count {
                break;
            }
            page += 1;
        }

        tracing::debug!("listed {} {} from {}", all_items.len(), items_key, url);
        Ok(all_items)
    }
}
