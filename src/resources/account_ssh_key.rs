//! `scaleway_account_ssh_key`: global SSH key usable by servers of a project

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::api::account::{CreateSshKeyRequest, SshKey};
use crate::api::AccountApi;
use crate::provider::{Resource, ResourceData, Timeouts};
use crate::schema::{Attribute, ResourceSchema, ValueType};
use crate::scw::ScwClient;

use super::{found, name_or_random, organization_id_attribute, project_id_attribute};

pub const TYPE_NAME: &str = "scaleway_account_ssh_key";

pub struct AccountSshKey;

#[async_trait]
impl Resource for AccountSshKey {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new([
            (
                "name",
                Attribute::optional_computed(ValueType::String)
                    .describe("The name of the SSH key"),
            ),
            (
                "public_key",
                Attribute::required(ValueType::String)
                    .force_new()
                    .diff_suppress(diff_suppress_public_key)
                    .describe("The public SSH key"),
            ),
            ("project_id", project_id_attribute()),
            ("organization_id", organization_id_attribute()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10)
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let key = AccountApi::new(client)
            .create_ssh_key(&CreateSshKeyRequest {
                name: name_or_random(d, "ssh-key"),
                public_key: d.get_string("public_key").trim().to_string(),
                project_id: super::project_id(d, client),
            })
            .await?;

        d.set_id(key.id);
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        match AccountApi::new(client).get_ssh_key(d.id()).await {
            Ok(key) => {
                flatten(d, key);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                d.clear_id();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        if d.has_change("name") {
            AccountApi::new(client)
                .update_ssh_key(d.id(), &d.get_string("name"))
                .await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        found(AccountApi::new(client).delete_ssh_key(d.id()).await)?;
        Ok(())
    }
}

fn flatten(d: &mut ResourceData, key: SshKey) {
    d.set("name", key.name);
    // the configured key may carry whitespace the API strips
    let same = d
        .get("public_key")
        .map(|current| diff_suppress_public_key(current, &Value::String(key.public_key.clone())))
        .unwrap_or(false);
    if !same {
        d.set("public_key", key.public_key);
    }
    d.set("project_id", key.project_id);
    d.set("organization_id", key.organization_id);
}

fn diff_suppress_public_key(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.trim() == b.trim(),
        _ => false,
    }
}
