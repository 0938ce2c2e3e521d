//! Scaleway credentials
//!
//! Scaleway authenticates API calls with a secret key sent in the
//! `X-Auth-Token` header. The access key only identifies the key pair.

use std::fmt;

use super::error::ScwError;
use super::locality::{Region, Zone};

pub const ENV_ACCESS_KEY: &str = "SCW_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "SCW_SECRET_KEY";
pub const ENV_DEFAULT_ORGANIZATION_ID: &str = "SCW_DEFAULT_ORGANIZATION_ID";
pub const ENV_DEFAULT_PROJECT_ID: &str = "SCW_DEFAULT_PROJECT_ID";
pub const ENV_DEFAULT_REGION: &str = "SCW_DEFAULT_REGION";
pub const ENV_DEFAULT_ZONE: &str = "SCW_DEFAULT_ZONE";
pub const ENV_API_URL: &str = "SCW_API_URL";

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

/// Everything needed to issue authenticated requests
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub default_organization_id: Option<String>,
    pub default_project_id: Option<String>,
    pub default_region: Option<Region>,
    pub default_zone: Option<Zone>,
    pub api_url: Option<String>,
}

impl Credentials {
    /// Read credentials from `SCW_*` environment variables only
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary variable lookup (env in production,
    /// a map in tests). Invalid zone/region values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let default_zone = non_empty(ENV_DEFAULT_ZONE).and_then(|z| match Zone::parse(&z) {
            Ok(zone) => Some(zone),
            Err(e) => {
                tracing::warn!("ignoring {}: {}", ENV_DEFAULT_ZONE, e);
                None
            }
        });
        let default_region =
            non_empty(ENV_DEFAULT_REGION).and_then(|r| match Region::parse(&r) {
                Ok(region) => Some(region),
                Err(e) => {
                    tracing::warn!("ignoring {}: {}", ENV_DEFAULT_REGION, e);
                    None
                }
            });

        Self {
            access_key: non_empty(ENV_ACCESS_KEY),
            secret_key: non_empty(ENV_SECRET_KEY),
            default_organization_id: non_empty(ENV_DEFAULT_ORGANIZATION_ID),
            default_project_id: non_empty(ENV_DEFAULT_PROJECT_ID),
            default_region,
            default_zone,
            api_url: non_empty(ENV_API_URL),
        }
    }

    /// Fill every unset field from `other`
    pub fn or(self, other: Credentials) -> Self {
        Self {
            access_key: self.access_key.or(other.access_key),
            secret_key: self.secret_key.or(other.secret_key),
            default_organization_id: self
                .default_organization_id
                .or(other.default_organization_id),
            default_project_id: self.default_project_id.or(other.default_project_id),
            default_region: self.default_region.or(other.default_region),
            default_zone: self.default_zone.or(other.default_zone),
            api_url: self.api_url.or(other.api_url),
        }
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Default region, derived from the default zone when unset
    pub fn region(&self) -> Option<Region> {
        self.default_region
            .clone()
            .or_else(|| self.default_zone.as_ref().map(Zone::region))
    }

    /// Default zone, falling back to the first zone of the default region
    pub fn zone(&self) -> Option<Zone> {
        self.default_zone
            .clone()
            .or_else(|| self.default_region.as_ref().map(Region::first_zone))
    }

    pub fn require_secret_key(&self) -> Result<&str, ScwError> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| ScwError::MissingCredentials(format!("{ENV_SECRET_KEY} is not set")))
    }
}

// Security: never print the secret key
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("default_organization_id", &self.default_organization_id)
            .field("default_project_id", &self.default_project_id)
            .field("default_region", &self.default_region)
            .field("default_zone", &self.default_zone)
            .field("api_url", &self.api_url)
            .finish()
    }
}
