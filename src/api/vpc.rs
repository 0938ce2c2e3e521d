//! VPC API, `vpc/v1` (zoned private networks)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scw::error::Result;
use crate::scw::{ScwClient, Zone};

const PRODUCT: &str = "vpc";
const VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateNetwork {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    pub zone: Zone,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrivateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePrivateNetworkRequest {
    pub name: String,
    pub tags: Vec<String>,
}

pub struct VpcApi<'a> {
    client: &'a ScwClient,
}

impl<'a> VpcApi<'a> {
    pub fn new(client: &'a ScwClient) -> Self {
        Self { client }
    }

    fn url(&self, zone: &Zone, path: &str) -> String {
        self.client.zoned_url(PRODUCT, VERSION, zone, path)
    }

    pub async fn create_private_network(
        &self,
        zone: &Zone,
        req: &CreatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        tracing::info!("creating private network {} ({})", req.name, zone);
        self.client
            .post(&self.url(zone, "private-networks"), req)
            .await
    }

    pub async fn get_private_network(&self, zone: &Zone, id: &str) -> Result<PrivateNetwork> {
        self.client
            .get(&self.url(zone, &format!("private-networks/{id}")))
            .await
    }

    pub async fn list_private_networks(&self, zone: &Zone) -> Result<Vec<PrivateNetwork>> {
        self.client
            .list_all(&self.url(zone, "private-networks"), "private_networks")
            .await
    }

    pub async fn update_private_network(
        &self,
        zone: &Zone,
        id: &str,
        req: &UpdatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        self.client
            .patch(&self.url(zone, &format!("private-networks/{id}")), req)
            .await
    }

    pub async fn delete_private_network(&self, zone: &Zone, id: &str) -> Result<()> {
        tracing::info!("deleting private network {} ({})", id, zone);
        self.client
            .delete(&self.url(zone, &format!("private-networks/{id}")))
            .await
    }
}
