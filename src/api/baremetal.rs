//! Elastic Metal (bare-metal) API, `baremetal/v1`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scw::error::{Result, ScwError};
use crate::scw::http::with_query;
use crate::scw::wait::{wait_for, wait_for_deletion, WaitOptions};
use crate::scw::{ScwClient, Zone};

const PRODUCT: &str = "baremetal";
const VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Delivering,
    Ready,
    Stopping,
    Stopped,
    Starting,
    Error,
    Deleting,
    Locked,
    OutOfStock,
    Ordered,
    Resetting,
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    /// Statuses after which the server will not move on its own
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ServerStatus::Ready
                | ServerStatus::Stopped
                | ServerStatus::Error
                | ServerStatus::Locked
                | ServerStatus::Unknown
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        f.write_str(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    ToInstall,
    Installing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl InstallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InstallStatus::Completed | InstallStatus::Error | InstallStatus::Unknown
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInstall {
    pub os_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ssh_key_ids: Vec<String>,
    pub status: InstallStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerIp {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub reverse: String,
    /// `IPv4` or `IPv6`
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ServerStatus,
    pub offer_id: String,
    #[serde(default)]
    pub offer_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ips: Vec<ServerIp>,
    #[serde(default)]
    pub domain: String,
    pub zone: Zone,
    #[serde(default)]
    pub install: Option<ServerInstall>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Os {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub offer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallServerRequest {
    pub os_id: String,
    pub hostname: String,
    pub ssh_key_ids: Vec<String>,
}

/// Elastic Metal API bound to a client
pub struct BaremetalApi<'a> {
    client: &'a ScwClient,
}

impl<'a> BaremetalApi<'a> {
    pub fn new(client: &'a ScwClient) -> Self {
        Self { client }
    }

    fn url(&self, zone: &Zone, path: &str) -> String {
        self.client.zoned_url(PRODUCT, VERSION, zone, path)
    }

    pub async fn create_server(&self, zone: &Zone, req: &CreateServerRequest) -> Result<Server> {
        tracing::info!("creating bare-metal server {} ({})", req.name, zone);
        self.client.post(&self.url(zone, "servers"), req).await
    }

    pub async fn get_server(&self, zone: &Zone, server_id: &str) -> Result<Server> {
        self.client
            .get(&self.url(zone, &format!("servers/{server_id}")))
            .await
    }

    pub async fn list_servers(&self, zone: &Zone) -> Result<Vec<Server>> {
        self.client
            .list_all(&self.url(zone, "servers"), "servers")
            .await
    }

    pub async fn update_server(
        &self,
        zone: &Zone,
        server_id: &str,
        req: &UpdateServerRequest,
    ) -> Result<Server> {
        self.client
            .patch(&self.url(zone, &format!("servers/{server_id}")), req)
            .await
    }

    pub async fn install_server(
        &self,
        zone: &Zone,
        server_id: &str,
        req: &InstallServerRequest,
    ) -> Result<Server> {
        tracing::info!("installing os {} on server {}", req.os_id, server_id);
        self.client
            .post(&self.url(zone, &format!("servers/{server_id}/install")), req)
            .await
    }

    pub async fn delete_server(&self, zone: &Zone, server_id: &str) -> Result<()> {
        tracing::info!("deleting bare-metal server {} ({})", server_id, zone);
        self.client
            .delete(&self.url(zone, &format!("servers/{server_id}")))
            .await
    }

    pub async fn get_offer(&self, zone: &Zone, offer_id: &str) -> Result<Offer> {
        self.client
            .get(&self.url(zone, &format!("offers/{offer_id}")))
            .await
    }

    /// Find an offer by its exact name (`GP-BM1-M`)
    pub async fn get_offer_by_name(&self, zone: &Zone, name: &str) -> Result<Offer> {
        let url = with_query(&self.url(zone, "offers"), &[("name", name.to_string())]);
        let offers: Vec<Offer> = self.client.list_all(&url, "offers").await?;

        offers
            .into_iter()
            .find(|offer| offer.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ScwError::Api {
                status: reqwest::StatusCode::NOT_FOUND,
                message: format!("offer {name} not found in {zone}"),
            })
    }

    pub async fn get_os(&self, zone: &Zone, os_id: &str) -> Result<Os> {
        self.client
            .get(&self.url(zone, &format!("os/{os_id}")))
            .await
    }

    /// Wait for the server to reach a terminal status
    pub async fn wait_for_server(
        &self,
        zone: &Zone,
        server_id: &str,
        options: WaitOptions,
    ) -> Result<Server> {
        wait_for(
            &format!("bare-metal server {server_id}"),
            options,
            || self.get_server(zone, server_id),
            |server| server.status.is_terminal(),
        )
        .await
    }

    /// Wait for the installation to finish; an install error is a failure
    pub async fn wait_for_server_install(
        &self,
        zone: &Zone,
        server_id: &str,
        options: WaitOptions,
    ) -> Result<Server> {
        let server = wait_for(
            &format!("installation of bare-metal server {server_id}"),
            options,
            || self.get_server(zone, server_id),
            |server| {
                server
                    .install
                    .as_ref()
                    .map(|install| install.status.is_terminal())
                    .unwrap_or(true)
            },
        )
        .await?;

        if let Some(install) = &server.install {
            if install.status == InstallStatus::Error {
                return Err(ScwError::FailureState {
                    what: format!("installation of bare-metal server {server_id}"),
                    status: "error".to_string(),
                });
            }
        }
        Ok(server)
    }

    pub async fn wait_for_server_deleted(
        &self,
        zone: &Zone,
        server_id: &str,
        options: WaitOptions,
    ) -> Result<()> {
        wait_for_deletion(
            &format!("deletion of bare-metal server {server_id}"),
            options,
            || self.get_server(zone, server_id),
        )
        .await
    }
}
