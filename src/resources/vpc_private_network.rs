//! `scaleway_vpc_private_network`

use anyhow::Result;
use async_trait::async_trait;

use crate::api::vpc::{CreatePrivateNetworkRequest, PrivateNetwork, UpdatePrivateNetworkRequest};
use crate::api::VpcApi;
use crate::provider::{Resource, ResourceData, Timeouts};
use crate::schema::{Attribute, ResourceSchema, ValueType};
use crate::scw::{ScwClient, ZonedId};

use super::{
    flatten_time, found, name_or_random, organization_id_attribute, project_id_attribute, resolve_zone,
    tags_attribute, zone_attribute, zoned_id,
};

pub const TYPE_NAME: &str = "scaleway_vpc_private_network";

pub struct VpcPrivateNetwork;

#[async_trait]
impl Resource for VpcPrivateNetwork {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new([
            (
                "name",
                Attribute::optional_computed(ValueType::String)
                    .describe("The name of the private network"),
            ),
            ("tags", tags_attribute()),
            ("zone", zone_attribute()),
            ("project_id", project_id_attribute()),
            ("organization_id", organization_id_attribute()),
            (
                "created_at",
                Attribute::computed(ValueType::String)
                    .describe("The date and time of the creation of the private network"),
            ),
            (
                "updated_at",
                Attribute::computed(ValueType::String)
                    .describe("The date and time of the last update of the private network"),
            ),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10)
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let zone = resolve_zone(d, client)?;
        let pn = VpcApi::new(client)
            .create_private_network(
                &zone,
                &CreatePrivateNetworkRequest {
                    name: name_or_random(d, "pn"),
                    project_id: super::project_id(d, client),
                    tags: d.get_string_list("tags"),
                },
            )
            .await?;

        d.set_id(ZonedId::new(zone, &pn.id).to_string());
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        match VpcApi::new(client).get_private_network(&zone, &id).await {
            Ok(pn) => {
                flatten(d, pn);
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
        if d.has_changes(&["name", "tags"]) {
            let ZonedId { zone, id } = zoned_id(d)?;
            VpcApi::new(client)
                .update_private_network(
                    &zone,
                    &id,
                    &UpdatePrivateNetworkRequest {
                        name: d.get_string("name"),
                        tags: d.get_string_list("tags"),
                    },
                )
                .await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        found(VpcApi::new(client).delete_private_network(&zone, &id).await)?;
        Ok(())
    }
}

fn flatten(d: &mut ResourceData, pn: PrivateNetwork) {
    d.set("name", pn.name);
    d.set("tags", pn.tags);
    d.set("zone", pn.zone.to_string());
    d.set("project_id", pn.project_id);
    d.set("organization_id", pn.organization_id);
    d.set("created_at", flatten_time(pn.created_at));
    d.set("updated_at", flatten_time(pn.updated_at));
}
