//! Account API, `account/v2alpha1` (SSH keys)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scw::error::Result;
use crate::scw::http::with_query;
use crate::scw::ScwClient;

const PRODUCT: &str = "account";
const VERSION: &str = "v2alpha1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    pub id: String,
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSshKeyRequest {
    pub name: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct UpdateSshKeyRequest<'a> {
    name: &'a str,
}

pub struct AccountApi<'a> {
    client: &'a ScwClient,
}

impl<'a> AccountApi<'a> {
    pub fn new(client: &'a ScwClient) -> Self {
        Self { client }
    }

    fn url(&self, path: &str) -> String {
        self.client.global_url(PRODUCT, VERSION, path)
    }

    pub async fn create_ssh_key(&self, req: &CreateSshKeyRequest) -> Result<SshKey> {
        tracing::info!("creating ssh key {}", req.name);
        self.client.post(&self.url("ssh-keys"), req).await
    }

    pub async fn get_ssh_key(&self, id: &str) -> Result<SshKey> {
        self.client.get(&self.url(&format!("ssh-keys/{id}"))).await
    }

    pub async fn list_ssh_keys(&self, project_id: Option<&str>) -> Result<Vec<SshKey>> {
        let url = with_query(
            &self.url("ssh-keys"),
            &[("project_id", project_id.unwrap_or_default().to_string())],
        );
        self.client.list_all(&url, "ssh_keys").await
    }

    pub async fn update_ssh_key(&self, id: &str, name: &str) -> Result<SshKey> {
        self.client
            .patch(
                &self.url(&format!("ssh-keys/{id}")),
                &UpdateSshKeyRequest { name },
            )
            .await
    }

    pub async fn delete_ssh_key(&self, id: &str) -> Result<()> {
        tracing::info!("deleting ssh key {}", id);
        self.client.delete(&self.url(&format!("ssh-keys/{id}"))).await
    }
}
