//! `scaleway_cockpit_token`: push/query token for the observability stack

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::cockpit::{CreateTokenRequest, TokenScopes};
use crate::api::CockpitApi;
use crate::provider::{Resource, ResourceData, Timeouts};
use crate::schema::{Attribute, ResourceSchema, ValueType};
use crate::scw::ScwClient;

use super::{found, project_id_attribute};

pub const TYPE_NAME: &str = "scaleway_cockpit_token";

const SCOPE_DEFAULTS: [(&str, bool, &str); 7] = [
    ("query_metrics", false, "Query metrics"),
    ("write_metrics", true, "Write metrics"),
    ("setup_metrics_rules", false, "Setup metrics rules"),
    ("query_logs", false, "Query logs"),
    ("write_logs", true, "Write logs"),
    ("setup_logs_rules", false, "Setup logs rules"),
    ("setup_alerts", false, "Setup alerts"),
];

pub struct CockpitToken;

#[async_trait]
impl Resource for CockpitToken {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        let scopes = Attribute::block(SCOPE_DEFAULTS.map(|(name, default, description)| {
            (
                name,
                Attribute::optional(ValueType::Bool)
                    .with_default(default)
                    .force_new()
                    .describe(description),
            )
        }))
        .make_optional()
        .make_computed()
        .force_new()
        .items(Some(1), Some(1))
        .describe("Endpoints");

        ResourceSchema::new([
            (
                "name",
                Attribute::required(ValueType::String)
                    .force_new()
                    .describe("The name of the token"),
            ),
            ("scopes", scopes),
            (
                "secret_key",
                Attribute::computed(ValueType::String)
                    .sensitive()
                    .describe("The secret key of the token"),
            ),
            ("project_id", project_id_attribute()),
        ])
        .describe("Cockpit token")
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(5)
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let project_id = super::project_id(d, client)
            .ok_or_else(|| anyhow!("project_id is required to create a cockpit token"))?;

        let token = CockpitApi::new(client)
            .create_token(&CreateTokenRequest {
                project_id,
                name: d.get_string("name"),
                scopes: expand_scopes(&d.get_blocks("scopes")),
            })
            .await?;

        d.set("secret_key", token.secret_key.unwrap_or_default());
        d.set_id(token.id);
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let token = match CockpitApi::new(client).get_token(d.id()).await {
            Ok(token) => token,
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        d.set("name", token.name);
        d.set("scopes", flatten_scopes(token.scopes));
        d.set("project_id", token.project_id);
        Ok(())
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        found(CockpitApi::new(client).delete_token(d.id()).await)?;
        Ok(())
    }
}

/// First `scopes` block, with unset flags taking their schema default
fn expand_scopes(blocks: &[Map<String, Value>]) -> Option<TokenScopes> {
    let block = blocks.first()?;
    let flag = |name: &str| {
        block.get(name).and_then(Value::as_bool).unwrap_or_else(|| {
            SCOPE_DEFAULTS
                .iter()
                .find(|(n, _, _)| *n == name)
                .map(|(_, default, _)| *default)
                .unwrap_or(false)
        })
    };
    Some(TokenScopes {
        query_metrics: flag("query_metrics"),
        write_metrics: flag("write_metrics"),
        setup_metrics_rules: flag("setup_metrics_rules"),
        query_logs: flag("query_logs"),
        write_logs: flag("write_logs"),
        setup_logs_rules: flag("setup_logs_rules"),
        setup_alerts: flag("setup_alerts"),
    })
}

fn flatten_scopes(scopes: Option<TokenScopes>) -> Value {
    match scopes {
        Some(s) => json!([{
            "query_metrics": s.query_metrics,
            "write_metrics": s.write_metrics,
            "setup_metrics_rules": s.setup_metrics_rules,
            "query_logs": s.query_logs,
            "write_logs": s.write_logs,
            "setup_logs_rules": s.setup_logs_rules,
            "setup_alerts": s.setup_alerts,
        }]),
        None => json!([]),
    }
}
