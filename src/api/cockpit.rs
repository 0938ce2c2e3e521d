//! Cockpit (observability) API, `cockpit/v1beta1`
//!
//! Tokens are global resources scoped to a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scw::error::Result;
use crate::scw::http::with_query;
use crate::scw::ScwClient;

const PRODUCT: &str = "cockpit";
const VERSION: &str = "v1beta1";

/// Permissions granted to a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenScopes {
    pub query_metrics: bool,
    pub write_metrics: bool,
    pub setup_metrics_rules: bool,
    pub query_logs: bool,
    pub write_logs: bool,
    pub setup_logs_rules: bool,
    pub setup_alerts: bool,
}

impl Default for TokenScopes {
    /// Push-only token: metrics and logs can be written, nothing else
    fn default() -> Self {
        Self {
            query_metrics: false,
            write_metrics: true,
            setup_metrics_rules: false,
            query_logs: false,
            write_logs: true,
            setup_logs_rules: false,
            setup_alerts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Option<TokenScopes>,
    /// Only returned by the create call
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTokenRequest {
    pub project_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<TokenScopes>,
}

pub struct CockpitApi<'a> {
    client: &'a ScwClient,
}

impl<'a> CockpitApi<'a> {
    pub fn new(client: &'a ScwClient) -> Self {
        Self { client }
    }

    fn url(&self, path: &str) -> String {
        self.client.global_url(PRODUCT, VERSION, path)
    }

    pub async fn create_token(&self, req: &CreateTokenRequest) -> Result<Token> {
        tracing::info!("creating cockpit token {} in project {}", req.name, req.project_id);
        self.client.post(&self.url("tokens"), req).await
    }

    pub async fn get_token(&self, token_id: &str) -> Result<Token> {
        self.client.get(&self.url(&format!("tokens/{token_id}"))).await
    }

    pub async fn list_tokens(&self, project_id: &str) -> Result<Vec<Token>> {
        let url = with_query(&self.url("tokens"), &[("project_id", project_id.to_string())]);
        self.client.list_all(&url, "tokens").await
    }

    pub async fn delete_token(&self, token_id: &str) -> Result<()> {
        tracing::info!("deleting cockpit token {}", token_id);
        self.client.delete(&self.url(&format!("tokens/{token_id}"))).await
    }
}
