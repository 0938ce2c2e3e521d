//! Load Balancer API, `lb/v1` (zoned flavour)

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scw::error::{Result, ScwError};
use crate::scw::wait::{wait_for, wait_for_deletion, WaitOptions};
use crate::scw::{ScwClient, Zone};

const PRODUCT: &str = "lb";
const VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbStatus {
    Ready,
    Pending,
    Stopped,
    Error,
    Locked,
    Migrating,
    ToCreate,
    Creating,
    ToDelete,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl LbStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LbStatus::Ready | LbStatus::Stopped | LbStatus::Error | LbStatus::Locked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Ready,
    Pending,
    Stopped,
    Error,
    Locked,
    Migrating,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InstanceStatus::Ready
                | InstanceStatus::Stopped
                | InstanceStatus::Error
                | InstanceStatus::Locked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateNetworkStatus {
    Ready,
    Pending,
    Error,
    #[serde(other)]
    Unknown,
}

impl PrivateNetworkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PrivateNetworkStatus::Ready | PrivateNetworkStatus::Error)
    }
}

impl fmt::Display for PrivateNetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrivateNetworkStatus::Ready => "ready",
            PrivateNetworkStatus::Pending => "pending",
            PrivateNetworkStatus::Error => "error",
            PrivateNetworkStatus::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SslCompatibilityLevel {
    #[serde(rename = "ssl_compatibility_level_unknown")]
    Unknown,
    #[default]
    #[serde(rename = "ssl_compatibility_level_intermediate")]
    Intermediate,
    #[serde(rename = "ssl_compatibility_level_modern")]
    Modern,
    #[serde(rename = "ssl_compatibility_level_old")]
    Old,
}

impl SslCompatibilityLevel {
    pub const ALL: [SslCompatibilityLevel; 4] = [
        SslCompatibilityLevel::Unknown,
        SslCompatibilityLevel::Intermediate,
        SslCompatibilityLevel::Modern,
        SslCompatibilityLevel::Old,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SslCompatibilityLevel::Unknown => "ssl_compatibility_level_unknown",
            SslCompatibilityLevel::Intermediate => "ssl_compatibility_level_intermediate",
            SslCompatibilityLevel::Modern => "ssl_compatibility_level_modern",
            SslCompatibilityLevel::Old => "ssl_compatibility_level_old",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == s)
    }
}

impl fmt::Display for SslCompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ip {
    pub id: String,
    pub ip_address: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub lb_id: Option<String>,
    #[serde(default)]
    pub reverse: String,
    pub zone: Zone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lb {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: LbStatus,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub ip: Vec<Ip>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(default)]
    pub ssl_compatibility_level: SslCompatibilityLevel,
    pub zone: Zone,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub ip_address: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpConfig {}

/// Attachment of a load balancer to a private network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateNetwork {
    pub private_network_id: String,
    pub status: PrivateNetworkStatus,
    #[serde(default)]
    pub static_config: Option<StaticConfig>,
    #[serde(default)]
    pub dhcp_config: Option<DhcpConfig>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLbRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub ip_id: String,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub lb_type: String,
    pub ssl_compatibility_level: SslCompatibilityLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateLbRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub ssl_compatibility_level: SslCompatibilityLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrateLbRequest {
    #[serde(rename = "type")]
    pub lb_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateIpRequest {
    pub reverse: String,
}

/// Either a fixed list of addresses or DHCP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateNetworkConfig {
    Static(Vec<String>),
    Dhcp,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachPrivateNetworkRequest {
    pub private_network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_config: Option<StaticConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_config: Option<DhcpConfig>,
}

impl AttachPrivateNetworkRequest {
    pub fn new(private_network_id: impl Into<String>, config: PrivateNetworkConfig) -> Self {
        let (static_config, dhcp_config) = match config {
            PrivateNetworkConfig::Static(ip_address) => (Some(StaticConfig { ip_address }), None),
            PrivateNetworkConfig::Dhcp => (None, Some(DhcpConfig {})),
        };
        Self {
            private_network_id: private_network_id.into(),
            static_config,
            dhcp_config,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct DetachPrivateNetworkRequest<'a> {
    private_network_id: &'a str,
}

/// Load Balancer API bound to a client
pub struct LbApi<'a> {
    client: &'a ScwClient,
}

impl<'a> LbApi<'a> {
    pub fn new(client: &'a ScwClient) -> Self {
        Self { client }
    }

    fn url(&self, zone: &Zone, path: &str) -> String {
        self.client.zoned_url(PRODUCT, VERSION, zone, path)
    }

    // =========================================================================
    // Load balancers
    // =========================================================================

    pub async fn create_lb(&self, zone: &Zone, req: &CreateLbRequest) -> Result<Lb> {
        tracing::info!("creating load balancer {} ({})", req.name, zone);
        self.client.post(&self.url(zone, "lbs"), req).await
    }

    pub async fn get_lb(&self, zone: &Zone, lb_id: &str) -> Result<Lb> {
        self.client.get(&self.url(zone, &format!("lbs/{lb_id}"))).await
    }

    pub async fn list_lbs(&self, zone: &Zone) -> Result<Vec<Lb>> {
        self.client.list_all(&self.url(zone, "lbs"), "lbs").await
    }

    pub async fn update_lb(&self, zone: &Zone, lb_id: &str, req: &UpdateLbRequest) -> Result<Lb> {
        self.client
            .put(&self.url(zone, &format!("lbs/{lb_id}")), req)
            .await
    }

    /// Change the commercial type of a load balancer in place
    pub async fn migrate_lb(&self, zone: &Zone, lb_id: &str, lb_type: &str) -> Result<Lb> {
        tracing::info!("migrating load balancer {} to {}", lb_id, lb_type);
        self.client
            .post(
                &self.url(zone, &format!("lbs/{lb_id}/migrate")),
                &MigrateLbRequest {
                    lb_type: lb_type.to_string(),
                },
            )
            .await
    }

    pub async fn delete_lb(&self, zone: &Zone, lb_id: &str, release_ip: bool) -> Result<()> {
        tracing::info!(
            "deleting load balancer {} ({}), release_ip={}",
            lb_id,
            zone,
            release_ip
        );
        self.client
            .delete(&format!(
                "{}?release_ip={}",
                self.url(zone, &format!("lbs/{lb_id}")),
                release_ip
            ))
            .await
    }

    pub async fn wait_for_lb(&self, zone: &Zone, lb_id: &str, options: WaitOptions) -> Result<Lb> {
        wait_for(
            &format!("load balancer {lb_id}"),
            options,
            || self.get_lb(zone, lb_id),
            |lb| lb.status.is_terminal(),
        )
        .await
    }

    /// Wait until every instance backing the load balancer is settled
    pub async fn wait_for_lb_instances(
        &self,
        zone: &Zone,
        lb_id: &str,
        options: WaitOptions,
    ) -> Result<Lb> {
        wait_for(
            &format!("instances of load balancer {lb_id}"),
            options,
            || self.get_lb(zone, lb_id),
            |lb| lb.instances.iter().all(|i| i.status.is_terminal()),
        )
        .await
    }

    pub async fn wait_for_lb_deleted(
        &self,
        zone: &Zone,
        lb_id: &str,
        options: WaitOptions,
    ) -> Result<()> {
        wait_for_deletion(
            &format!("deletion of load balancer {lb_id}"),
            options,
            || self.get_lb(zone, lb_id),
        )
        .await
    }

    // =========================================================================
    // Private networks
    // =========================================================================

    pub async fn list_lb_private_networks(
        &self,
        zone: &Zone,
        lb_id: &str,
    ) -> Result<Vec<PrivateNetwork>> {
        self.client
            .list_all(
                &self.url(zone, &format!("lbs/{lb_id}/private-networks")),
                "private_network",
            )
            .await
    }

    pub async fn attach_private_network(
        &self,
        zone: &Zone,
        lb_id: &str,
        req: &AttachPrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        tracing::info!(
            "attaching private network {} to load balancer {}",
            req.private_network_id,
            lb_id
        );
        self.client
            .post(
                &self.url(zone, &format!("lbs/{lb_id}/attach-private-network")),
                req,
            )
            .await
    }

    pub async fn detach_private_network(
        &self,
        zone: &Zone,
        lb_id: &str,
        private_network_id: &str,
    ) -> Result<()> {
        tracing::info!(
            "detaching private network {} from load balancer {}",
            private_network_id,
            lb_id
        );
        let _: serde_json::Value = self
            .client
            .post(
                &self.url(zone, &format!("lbs/{lb_id}/detach-private-network")),
                &DetachPrivateNetworkRequest { private_network_id },
            )
            .await?;
        Ok(())
    }

    /// Wait until every attachment is ready; an attachment in error fails
    pub async fn wait_for_lb_private_networks(
        &self,
        zone: &Zone,
        lb_id: &str,
        options: WaitOptions,
    ) -> Result<Vec<PrivateNetwork>> {
        let networks = wait_for(
            &format!("private networks of load balancer {lb_id}"),
            options,
            || self.list_lb_private_networks(zone, lb_id),
            |networks| networks.iter().all(|pn| pn.status.is_terminal()),
        )
        .await?;

        if let Some(failed) = networks
            .iter()
            .find(|pn| pn.status == PrivateNetworkStatus::Error)
        {
            return Err(ScwError::FailureState {
                what: format!(
                    "attachment of private network {} to load balancer {}",
                    failed.private_network_id, lb_id
                ),
                status: failed.status.to_string(),
            });
        }
        Ok(networks)
    }

    // =========================================================================
    // Flexible IPs
    // =========================================================================

    pub async fn create_ip(&self, zone: &Zone, req: &CreateIpRequest) -> Result<Ip> {
        tracing::info!("creating load balancer ip ({})", zone);
        self.client.post(&self.url(zone, "ips"), req).await
    }

    pub async fn get_ip(&self, zone: &Zone, ip_id: &str) -> Result<Ip> {
        self.client.get(&self.url(zone, &format!("ips/{ip_id}"))).await
    }

    pub async fn list_ips(&self, zone: &Zone) -> Result<Vec<Ip>> {
        self.client.list_all(&self.url(zone, "ips"), "ips").await
    }

    pub async fn update_ip(&self, zone: &Zone, ip_id: &str, reverse: &str) -> Result<Ip> {
        self.client
            .patch(
                &self.url(zone, &format!("ips/{ip_id}")),
                &UpdateIpRequest {
                    reverse: reverse.to_string(),
                },
            )
            .await
    }

    pub async fn release_ip(&self, zone: &Zone, ip_id: &str) -> Result<()> {
        tracing::info!("releasing load balancer ip {} ({})", ip_id, zone);
        self.client.delete(&self.url(zone, &format!("ips/{ip_id}"))).await
    }
}
