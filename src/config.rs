//! Configuration Management
//!
//! Reads the Scaleway CLI configuration file (`~/.config/scw/config.yaml`)
//! and merges it with `SCW_*` environment variables. Precedence is
//! environment, then the active profile, then the root of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::scw::{Credentials, Region, Zone};

pub const ENV_CONFIG_PATH: &str = "SCW_CONFIG_PATH";
pub const ENV_PROFILE: &str = "SCW_PROFILE";

/// One set of settings, either the file root or a named profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Profile {
    /// Fill every unset field from `other`
    fn or(self, other: &Profile) -> Self {
        Self {
            access_key: self.access_key.or_else(|| other.access_key.clone()),
            secret_key: self.secret_key.or_else(|| other.secret_key.clone()),
            default_organization_id: self
                .default_organization_id
                .or_else(|| other.default_organization_id.clone()),
            default_project_id: self
                .default_project_id
                .or_else(|| other.default_project_id.clone()),
            default_region: self.default_region.or_else(|| other.default_region.clone()),
            default_zone: self.default_zone.or_else(|| other.default_zone.clone()),
            api_url: self.api_url.or_else(|| other.api_url.clone()),
        }
    }

    /// Validate and convert into client credentials
    pub fn credentials(&self) -> Result<Credentials> {
        let default_zone = self
            .default_zone
            .as_deref()
            .map(Zone::parse)
            .transpose()
            .context("invalid default_zone in config")?;
        let default_region = self
            .default_region
            .as_deref()
            .map(Region::parse)
            .transpose()
            .context("invalid default_region in config")?;

        if let Some(api_url) = &self.api_url {
            url::Url::parse(api_url).with_context(|| format!("invalid api_url {api_url:?}"))?;
        }

        Ok(Credentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            default_organization_id: self.default_organization_id.clone(),
            default_project_id: self.default_project_id.clone(),
            default_region,
            default_zone,
            api_url: self.api_url.clone(),
        })
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub root: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, Profile>,
}

impl Config {
    /// `$SCW_CONFIG_PATH`, else `<config dir>/scw/config.yaml`
    pub fn path() -> Option<PathBuf> {
        std::env::var_os(ENV_CONFIG_PATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|p| p.join("scw").join("config.yaml")))
    }

    /// Load the configuration file; a missing file is an empty configuration
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Settings of the selected profile layered over the root ones
    ///
    /// The profile is `name` if given, else the file's `active_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let Some(name) = name.or(self.active_profile.as_deref()) else {
            return Ok(self.root.clone());
        };
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone().or(&self.root)),
            // `default` names the root of the file
            None if name == "default" => Ok(self.root.clone()),
            None => Err(anyhow!("profile {name:?} not found in config")),
        }
    }

    /// Credentials for `profile`, with environment variables taking precedence
    pub fn credentials(&self, profile: Option<&str>) -> Result<Credentials> {
        self.credentials_with_env(profile, Credentials::from_env(), std::env::var(ENV_PROFILE).ok())
    }

    fn credentials_with_env(
        &self,
        profile: Option<&str>,
        env: Credentials,
        env_profile: Option<String>,
    ) -> Result<Credentials> {
        let profile = profile.or(env_profile.as_deref().filter(|p| !p.is_empty()));
        let file = self.profile(profile)?.credentials()?;
        let credentials = env.or(file);

        if credentials.secret_key.is_none() {
            bail!(
                "no secret key found: set {} or add secret_key to {}",
                crate::scw::auth::ENV_SECRET_KEY,
                Self::path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the scw config file".to_string())
            );
        }
        Ok(credentials)
    }
}
