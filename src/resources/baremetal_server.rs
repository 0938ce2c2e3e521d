//! `scaleway_baremetal_server`: Elastic Metal server with an installed OS

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::baremetal::{
    CreateServerRequest, InstallServerRequest, Offer, Server, ServerIp, UpdateServerRequest,
};
use crate::api::BaremetalApi;
use crate::provider::{Resource, ResourceData, Timeouts};
use crate::schema::{Attribute, ResourceSchema, ValueType};
use crate::scw::locality::expand_id;
use crate::scw::{ScwClient, Zone, ZonedId};

use super::{
    diff_suppress_localized_id, diff_suppress_localized_id_list, found, is_uuid, name_or_random, organization_id_attribute,
    project_id_attribute, resolve_zone, tags_attribute, wait_options, zone_attribute, zoned_id,
};

pub const TYPE_NAME: &str = "scaleway_baremetal_server";

/// Attributes whose change requires reinstalling the OS
const INSTALL_ATTRIBUTES: [&str; 3] = ["os", "ssh_key_ids", "hostname"];

pub struct BaremetalServer;

#[async_trait]
impl Resource for BaremetalServer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new([
            (
                "name",
                Attribute::optional_computed(ValueType::String)
                    .describe("Name of the server"),
            ),
            (
                "hostname",
                Attribute::optional_computed(ValueType::String)
                    .describe("Hostname of the server"),
            ),
            (
                "offer",
                Attribute::required(ValueType::String)
                    .force_new()
                    .diff_suppress(diff_suppress_localized_id)
                    .describe("ID or name of the server offer"),
            ),
            ("offer_id", Attribute::computed(ValueType::String)),
            ("offer_name", Attribute::computed(ValueType::String)),
            (
                "os",
                Attribute::required(ValueType::String)
                    .diff_suppress(diff_suppress_localized_id)
                    .describe("The base image of the server"),
            ),
            ("os_id", Attribute::computed(ValueType::String)),
            ("os_name", Attribute::computed(ValueType::String)),
            (
                "ssh_key_ids",
                Attribute::required(ValueType::StringList)
                    .diff_suppress(diff_suppress_localized_id_list)
                    .describe("Array of SSH key IDs allowed to SSH to the server"),
            ),
            (
                "description",
                Attribute::optional(ValueType::String)
                    .describe("Some description to associate to the server"),
            ),
            ("tags", tags_attribute()),
            ("zone", zone_attribute()),
            ("project_id", project_id_attribute()),
            ("organization_id", organization_id_attribute()),
            ("domain", Attribute::computed(ValueType::String)),
            (
                "ips",
                Attribute::block([
                    ("id", Attribute::computed(ValueType::String)),
                    ("address", Attribute::computed(ValueType::String)),
                    ("reverse", Attribute::computed(ValueType::String)),
                    ("version", Attribute::computed(ValueType::String)),
                ])
                .make_computed()
                .describe("IP addresses attached to the server"),
            ),
        ])
        .describe("Elastic Metal server")
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(60)
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = BaremetalApi::new(client);
        let zone = resolve_zone(d, client)?;

        let offer = find_offer(&api, &zone, &d.get_string("offer")).await?;
        let name = name_or_random(d, "bm");

        let server = api
            .create_server(
                &zone,
                &CreateServerRequest {
                    offer_id: offer.id,
                    project_id: super::project_id(d, client),
                    name: name.clone(),
                    description: d.get_string("description"),
                    tags: d.get_string_list("tags"),
                },
            )
            .await?;
        d.set_id(ZonedId::new(zone.clone(), &server.id).to_string());

        let options = wait_options(d, client);
        api.wait_for_server(&zone, &server.id, options).await?;

        api.install_server(&zone, &server.id, &install_request(d, &name))
            .await?;
        api.wait_for_server_install(&zone, &server.id, options)
            .await?;

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = BaremetalApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;

        let server = match api.get_server(&zone, &id).await {
            Ok(server) => server,
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // a withdrawn image does not make the server itself gone
        let os_name = match &server.install {
            Some(install) => found(api.get_os(&zone, expand_id(&install.os_id)).await)
                .with_context(|| format!("failed to fetch os {}", install.os_id))?
                .map(|os| os.name)
                .unwrap_or_else(|| {
                    tracing::warn!("os {} of server {} no longer exists", install.os_id, d.id());
                    String::new()
                }),
            None => String::new(),
        };

        flatten_server(d, &server, os_name);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = BaremetalApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;

        if d.has_changes(&["name", "description", "tags"]) {
            let mut req = UpdateServerRequest::default();
            if d.has_change("name") {
                req.name = d.get_str("name").map(str::to_string);
            }
            if d.has_change("description") {
                req.description = Some(d.get_string("description"));
            }
            if d.has_change("tags") {
                req.tags = Some(d.get_string_list("tags"));
            }
            api.update_server(&zone, &id, &req).await?;
        }

        if d.has_changes(&INSTALL_ATTRIBUTES) {
            tracing::info!("reinstalling bare-metal server {}", d.id());
            let options = wait_options(d, client);
            api.wait_for_server(&zone, &id, options).await?;

            let name = d.get_string("name");
            api.install_server(&zone, &id, &install_request(d, &name))
                .await?;
            api.wait_for_server_install(&zone, &id, options).await?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()> {
        let api = BaremetalApi::new(client);
        let ZonedId { zone, id } = zoned_id(d)?;

        if found(api.delete_server(&zone, &id).await)?.is_none() {
            return Ok(());
        }
        api.wait_for_server_deleted(&zone, &id, wait_options(d, client))
            .await?;
        Ok(())
    }
}

/// Resolve an offer given either its UUID (optionally zoned) or its name
async fn find_offer(api: &BaremetalApi<'_>, zone: &Zone, offer: &str) -> Result<Offer> {
    let id = expand_id(offer);
    let found = if is_uuid(id) {
        api.get_offer(zone, id).await
    } else {
        api.get_offer_by_name(zone, offer).await
    };
    found.with_context(|| format!("failed to find offer {offer} in {zone}"))
}

fn install_request(d: &ResourceData, name: &str) -> InstallServerRequest {
    let hostname = d
        .get_str("hostname")
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string());
    InstallServerRequest {
        os_id: expand_id(&d.get_string("os")).to_string(),
        hostname,
        ssh_key_ids: d
            .get_string_list("ssh_key_ids")
            .iter()
            .map(|id| expand_id(id).to_string())
            .collect(),
    }
}

fn flatten_server(d: &mut ResourceData, server: &Server, os_name: String) {
    let zone = &server.zone;
    let zoned = |id: &str| ZonedId::new(zone.clone(), expand_id(id)).to_string();

    d.set("name", server.name.clone());
    d.set("offer_id", zoned(&server.offer_id));
    d.set("offer_name", server.offer_name.clone());
    if d.get_str("offer").is_none() {
        d.set("offer", server.offer_name.clone());
    }
    d.set("description", server.description.clone());
    d.set("tags", server.tags.clone());
    d.set("zone", zone.to_string());
    d.set("project_id", server.project_id.clone());
    d.set("organization_id", server.organization_id.clone());
    d.set("domain", server.domain.clone());
    d.set("ips", flatten_ips(&server.ips));

    if let Some(install) = &server.install {
        d.set("os_id", zoned(&install.os_id));
        d.set("os_name", os_name);
        if d.get_str("os").is_none() {
            d.set("os", install.os_id.clone());
        }
        d.set("hostname", install.hostname.clone());
        // keep the configured spelling (zoned or not) of the same keys
        let remote = Value::from(install.ssh_key_ids.clone());
        let same = d
            .get("ssh_key_ids")
            .is_some_and(|current| diff_suppress_localized_id_list(current, &remote));
        if !same {
            d.set("ssh_key_ids", remote);
        }
    }
}

fn flatten_ips(ips: &[ServerIp]) -> Value {
    Value::Array(
        ips.iter()
            .map(|ip| {
                json!({
                    "id": ip.id,
                    "address": ip.address,
                    "reverse": ip.reverse,
                    "version": ip.version,
                })
            })
            .collect(),
    )
}
