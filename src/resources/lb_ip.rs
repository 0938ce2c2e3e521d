//! `scaleway_lb_ip`: flexible IP reserved for a load balancer

use anyhow::Result;
use async_trait::async_trait;

use crate::api::lb::{CreateIpRequest, Ip};
use crate::api::LbApi;
use crate::provider::{Resource, ResourceData, StateUpgrader, Timeouts};
use crate::schema::{Attribute, ResourceSchema, ValueType};
use crate::scw::{ScwClient, ZonedId};

use super::lb::lb_upgrade_v1_state;
use super::{
    found, organization_id_attribute, project_id_attribute, region_attribute, resolve_zone,
    zone_attribute, zoned_id,
};

pub const TYPE_NAME: &str = "scaleway_lb_ip";

pub struct LbIp;

#[async_trait]
impl Resource for LbIp {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new([
            (
                "reverse",
                Attribute::optional_computed(ValueType::String)
                    .describe("The reverse domain name for this IP"),
            ),
            (
                "ip_address",
                Attribute::computed(ValueType::String).describe("The load-balancer public IP address"),
            ),
            (
                "lb_id",
                Attribute::computed(ValueType::String)
                    .describe("The ID of the load balancer attached to this IP, if any"),
            ),
            ("zone", zone_attribute()),
            ("region", region_attribute()),
            ("project_id", project_id_attribute()),
            ("organization_id", organization_id_attribute()),
        ])
        .with_version(1)
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10)
    }

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        vec![StateUpgrader {
            version: 0,
            upgrade: lb_upgrade_v1_state,
        }]
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let zone = resolve_zone(d, client)?;
        let ip = LbApi::new(client)
            .create_ip(
                &zone,
                &CreateIpRequest {
                    project_id: super::project_id(d, client),
                    reverse: d.get_str("reverse").map(str::to_string),
                },
            )
            .await?;

        d.set_id(ZonedId::new(zone, &ip.id).to_string());
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        match LbApi::new(client).get_ip(&zone, &id).await {
            Ok(ip) => {
                flatten_ip(d, &ip);
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
        if d.has_change("reverse") {
            let ZonedId { zone, id } = zoned_id(d)?;
            LbApi::new(client)
                .update_ip(&zone, &id, &d.get_string("reverse"))
                .await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        found(LbApi::new(client).release_ip(&zone, &id).await)?;
        Ok(())
    }
}

fn flatten_ip(d: &mut ResourceData, ip: &Ip) {
    d.set("ip_address", ip.ip_address.clone());
    d.set("reverse", ip.reverse.clone());
    d.set(
        "lb_id",
        ip.lb_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| ZonedId::new(ip.zone.clone(), id).to_string())
            .unwrap_or_default(),
    );
    d.set("zone", ip.zone.to_string());
    d.set("region", ip.zone.region().to_string());
    d.set("project_id", ip.project_id.clone());
    d.set("organization_id", ip.organization_id.clone());
}
