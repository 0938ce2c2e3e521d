//! `scaleway_lb`: zoned load balancer with optional private network attachments

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::lb::{
    AttachPrivateNetworkRequest, CreateLbRequest, Lb, PrivateNetwork, PrivateNetworkConfig,
    SslCompatibilityLevel, UpdateLbRequest,
};
use crate::api::LbApi;
use crate::provider::data::string_list;
use crate::provider::{Resource, ResourceData, StateUpgrader, Timeouts};
use crate::schema::{diff_suppress_case_insensitive, Attribute, ResourceSchema, ValueType};
use crate::scw::locality::{expand_id, is_zone, parse_localized_id};
use crate::scw::{Region, ScwClient, Zone, ZonedId};

use super::{
    diff_suppress_localized_id, found, name_or_random, organization_id_attribute, project_id_attribute,
    region_attribute, resolve_zone, tags_attribute, wait_options, zone_attribute, zoned_id,
};

pub const TYPE_NAME: &str = "scaleway_lb";

pub struct LoadBalancer;

#[async_trait]
impl Resource for LoadBalancer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        let private_network = Attribute::block([
            (
                "private_network_id",
                Attribute::required(ValueType::String)
                    .diff_suppress(diff_suppress_localized_id)
                    .describe("The Private Network ID"),
            ),
            (
                "static_config",
                Attribute::optional(ValueType::StringList)
                    .items(Some(1), Some(2))
                    .describe("Define two IP addresses in the subnet of your private network"),
            ),
            (
                "dhcp_config",
                Attribute::optional_computed(ValueType::Bool)
                    .describe("Set to true if you want to let DHCP assign IP addresses"),
            ),
            (
                "status",
                Attribute::computed(ValueType::String)
                    .describe("The status of private network connection"),
            ),
            ("zone", Attribute::computed(ValueType::String)),
        ])
        .make_optional()
        .describe("List of private network to connect with your load balancer");

        ResourceSchema::new([
            (
                "name",
                Attribute::optional_computed(ValueType::String)
                    .describe("Name of the lb"),
            ),
            (
                "description",
                Attribute::optional(ValueType::String)
                    .describe("The description of the lb"),
            ),
            (
                "type",
                Attribute::required(ValueType::String)
                    .diff_suppress(diff_suppress_case_insensitive)
                    .describe("The type of load-balancer you want to create"),
            ),
            (
                "ip_id",
                Attribute::required(ValueType::String)
                    .force_new()
                    .diff_suppress(diff_suppress_localized_id)
                    .describe("The load-balance public IP ID"),
            ),
            (
                "ip_address",
                Attribute::computed(ValueType::String)
                    .describe("The load-balance public IP address"),
            ),
            (
                "release_ip",
                Attribute::optional(ValueType::Bool)
                    .with_default(false)
                    .describe("Release the IPs related to this load-balancer"),
            ),
            ("tags", tags_attribute()),
            (
                "ssl_compatibility_level",
                Attribute::optional(ValueType::String)
                    .with_default(SslCompatibilityLevel::Intermediate.as_str())
                    .describe("Enforces minimal SSL version (in SSL/TLS offloading context)"),
            ),
            ("private_network", private_network),
            ("zone", zone_attribute()),
            ("region", region_attribute()),
            ("project_id", project_id_attribute()),
            ("organization_id", organization_id_attribute()),
        ])
        .with_version(1)
        .describe("Load balancer")
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
        let api = LbApi::new(client);
        let ip_id = d.get_string("ip_id");
        let zone = match (d.get_str("zone"), ZonedId::parse(&ip_id)) {
            (None, Ok(ip)) => ip.zone,
            _ => resolve_zone(d, client)?,
        };

        let lb = api
            .create_lb(
                &zone,
                &CreateLbRequest {
                    project_id: super::project_id(d, client),
                    name: name_or_random(d, "lb"),
                    description: d.get_string("description"),
                    ip_id: expand_id(&ip_id).to_string(),
                    tags: d.get_string_list("tags"),
                    lb_type: d.get_string("type"),
                    ssl_compatibility_level: ssl_level(d)?,
                },
            )
            .await?;
        d.set_id(ZonedId::new(zone.clone(), &lb.id).to_string());

        let options = wait_options(d, client);
        api.wait_for_lb(&zone, &lb.id, options).await?;

        let networks = d.get_blocks("private_network");
        if !networks.is_empty() {
            for block in &networks {
                let (pn_id, config) = expand_private_network(block)?;
                api.attach_private_network(
                    &zone,
                    &lb.id,
                    &AttachPrivateNetworkRequest::new(pn_id, config),
                )
                .await?;
            }
            api.wait_for_lb_private_networks(&zone, &lb.id, options)
                .await?;
        }

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = LbApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;

        let fetched = futures::try_join!(
            api.get_lb(&zone, &id),
            api.list_lb_private_networks(&zone, &id)
        );
        let (lb, networks) = match fetched {
            Ok(pair) => pair,
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        flatten_lb(d, &lb);
        let flattened = flatten_private_networks(&d.get_blocks("private_network"), &networks, &zone);
        d.set("private_network", flattened);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = LbApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;
        let options = wait_options(d, client);

        if d.has_changes(&["name", "description", "tags", "ssl_compatibility_level"]) {
            api.update_lb(
                &zone,
                &id,
                &UpdateLbRequest {
                    name: d.get_string("name"),
                    description: d.get_string("description"),
                    tags: d.get_string_list("tags"),
                    ssl_compatibility_level: ssl_level(d)?,
                },
            )
            .await?;
        }

        if d.has_change("type") {
            api.wait_for_lb(&zone, &id, options).await?;
            api.migrate_lb(&zone, &id, &d.get_string("type")).await?;
            api.wait_for_lb(&zone, &id, options).await?;
        }

        if d.has_change("private_network") {
            let plan = diff_private_networks(
                &d.prior_blocks("private_network"),
                &d.get_blocks("private_network"),
            )?;
            if plan.is_empty() {
                return self.read(d, client).await;
            }

            for pn_id in &plan.detach {
                api.detach_private_network(&zone, &id, pn_id).await?;
            }
            if !plan.detach.is_empty() {
                api.wait_for_lb(&zone, &id, options).await?;
            }
            for (pn_id, config) in plan.attach {
                api.attach_private_network(
                    &zone,
                    &id,
                    &AttachPrivateNetworkRequest::new(pn_id, config),
                )
                .await?;
            }
            api.wait_for_lb_private_networks(&zone, &id, options)
                .await?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = LbApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;
        let options = wait_options(d, client);

        if found(api.wait_for_lb(&zone, &id, options).await)?.is_none() {
            return Ok(());
        }
        if found(api.delete_lb(&zone, &id, d.get_bool("release_ip")).await)?.is_none() {
            return Ok(());
        }
        api.wait_for_lb_deleted(&zone, &id, options).await?;
        Ok(())
    }
}

/// Schema v0 stored regional ids (`fr-par/<uuid>`); v1 stores zoned ones
/// (`fr-par-1/<uuid>`). Ids that are already zoned are kept as they are.
pub fn lb_upgrade_v1_state(mut state: Map<String, Value>) -> Result<Map<String, Value>> {
    let id = state
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("upgrade: id not exist"))?;

    let zoned = lb_upgrade_v1_regional_to_zoned_id(id)?;
    state.insert("id".to_string(), Value::String(zoned));
    Ok(state)
}

pub fn lb_upgrade_v1_regional_to_zoned_id(id: &str) -> Result<String> {
    let (locality, uuid) = parse_localized_id(id)?;
    if is_zone(locality) {
        return Ok(id.to_string());
    }
    let region = Region::parse(locality)?;
    Ok(ZonedId::new(region.first_zone(), uuid).to_string())
}

fn ssl_level(d: &ResourceData) -> Result<SslCompatibilityLevel> {
    match d.get_str("ssl_compatibility_level") {
        None => Ok(SslCompatibilityLevel::default()),
        Some(level) => SslCompatibilityLevel::parse(level)
            .ok_or_else(|| anyhow!("invalid ssl_compatibility_level {level:?}")),
    }
}

fn flatten_lb(d: &mut ResourceData, lb: &Lb) {
    d.set("name", lb.name.clone());
    d.set("description", lb.description.clone());
    d.set("type", lb.lb_type.to_uppercase());
    d.set("tags", lb.tags.clone());
    d.set("ssl_compatibility_level", lb.ssl_compatibility_level.as_str());
    d.set("zone", lb.zone.to_string());
    d.set("region", lb.zone.region().to_string());
    d.set("project_id", lb.project_id.clone());
    d.set("organization_id", lb.organization_id.clone());

    if let Some(ip) = lb.ip.first() {
        d.set("ip_id", ZonedId::new(lb.zone.clone(), &ip.id).to_string());
        d.set("ip_address", ip.ip_address.clone());
    }
}

/// Private network id and attachment mode of one configured block
fn expand_private_network(block: &Map<String, Value>) -> Result<(String, PrivateNetworkConfig)> {
    let pn_id = block
        .get("private_network_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("private_network block without private_network_id"))?;

    let static_config = string_list(block.get("static_config"));
    let config = if static_config.is_empty() {
        PrivateNetworkConfig::Dhcp
    } else {
        PrivateNetworkConfig::Static(static_config)
    };
    Ok((expand_id(pn_id).to_string(), config))
}

#[derive(Debug, Default, PartialEq)]
struct PrivateNetworkPlan {
    detach: Vec<String>,
    attach: Vec<(String, PrivateNetworkConfig)>,
}

impl PrivateNetworkPlan {
    fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }
}

/// Removed or reconfigured attachments are detached, new or reconfigured
/// ones attached. Untouched attachments are left alone.
fn diff_private_networks(
    prior: &[Map<String, Value>],
    planned: &[Map<String, Value>],
) -> Result<PrivateNetworkPlan> {
    let prior: Vec<_> = prior
        .iter()
        .map(expand_private_network)
        .collect::<Result<_>>()?;
    let planned: Vec<_> = planned
        .iter()
        .map(expand_private_network)
        .collect::<Result<_>>()?;

    let prior_by_id: HashMap<&str, &PrivateNetworkConfig> =
        prior.iter().map(|(id, c)| (id.as_str(), c)).collect();
    let planned_by_id: HashMap<&str, &PrivateNetworkConfig> =
        planned.iter().map(|(id, c)| (id.as_str(), c)).collect();

    let mut plan = PrivateNetworkPlan::default();
    for (id, config) in &prior {
        if planned_by_id.get(id.as_str()) != Some(&config) {
            plan.detach.push(id.clone());
        }
    }
    for (id, config) in planned {
        if prior_by_id.get(id.as_str()) != Some(&&config) {
            plan.attach.push((id, config));
        }
    }
    Ok(plan)
}

/// Attachments in configured order, unknown ones appended
fn flatten_private_networks(
    configured: &[Map<String, Value>],
    networks: &[PrivateNetwork],
    zone: &Zone,
) -> Value {
    let position = |pn_id: &str| {
        configured.iter().position(|block| {
            block
                .get("private_network_id")
                .and_then(Value::as_str)
                .map(|id| expand_id(id) == pn_id)
                .unwrap_or(false)
        })
    };

    let mut ordered: Vec<(usize, &PrivateNetwork)> = networks
        .iter()
        .map(|pn| (position(&pn.private_network_id).unwrap_or(usize::MAX), pn))
        .collect();
    ordered.sort_by_key(|(index, _)| *index);

    Value::Array(
        ordered
            .into_iter()
            .map(|(index, pn)| {
                // keep the id the way it was written
                let pn_id = configured
                    .get(index)
                    .and_then(|block| block.get("private_network_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        ZonedId::new(zone.clone(), &pn.private_network_id).to_string()
                    });
                let static_config = pn
                    .static_config
                    .as_ref()
                    .map(|c| c.ip_address.clone())
                    .unwrap_or_default();
                json!({
                    "private_network_id": pn_id,
                    "static_config": static_config,
                    "dhcp_config": pn.dhcp_config.is_some(),
                    "status": pn.status.to_string(),
                    "zone": zone.to_string(),
                })
            })
            .collect(),
    )
}
