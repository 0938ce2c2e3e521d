//! Resource types served by the provider
//!
//! One module per resource type. Shared attribute builders and locality
//! helpers live here.

pub mod account_ssh_key;
pub mod baremetal_server;
pub mod cockpit_token;
pub mod lb;
pub mod lb_ip;
pub mod vpc_private_network;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::provider::{Resource, ResourceData};
use crate::schema::{Attribute, ValueType};
use crate::scw::locality::expand_id;
use crate::scw::error::Result as ScwResult;
use crate::scw::{ScwClient, WaitOptions, Zone, ZonedId};

pub use account_ssh_key::AccountSshKey;
pub use baremetal_server::BaremetalServer;
pub use cockpit_token::CockpitToken;
pub use lb::LoadBalancer;
pub use lb_ip::LbIp;
pub use vpc_private_network::VpcPrivateNetwork;

/// Every resource type, in registration order
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(AccountSshKey),
        Arc::new(BaremetalServer),
        Arc::new(CockpitToken),
        Arc::new(LoadBalancer),
        Arc::new(LbIp),
        Arc::new(VpcPrivateNetwork),
    ]
}

// =========================================================================
// Common attributes
// =========================================================================

pub(crate) fn zone_attribute() -> Attribute {
    Attribute::optional_computed(ValueType::String)
        .force_new()
        .describe("The zone you want to attach the resource to")
}

pub(crate) fn region_attribute() -> Attribute {
    Attribute::computed(ValueType::String).describe("The region of the resource")
}

pub(crate) fn project_id_attribute() -> Attribute {
    Attribute::optional_computed(ValueType::String)
        .force_new()
        .describe("The project_id you want to attach the resource to")
}

pub(crate) fn organization_id_attribute() -> Attribute {
    Attribute::computed(ValueType::String).describe("The organization_id the resource is associated to")
}

pub(crate) fn tags_attribute() -> Attribute {
    Attribute::optional(ValueType::StringList)
}

// =========================================================================
// Locality helpers
// =========================================================================

/// Zone from the configuration, else the client default
pub(crate) fn resolve_zone(d: &ResourceData, client: &ScwClient) -> Result<Zone> {
    match d.get_str("zone") {
        Some(zone) => Ok(Zone::parse(zone)?),
        None => client
            .default_zone()
            .ok_or_else(|| anyhow!("no zone configured and no default zone set")),
    }
}

/// Zone and vendor id from a `zone/uuid` resource id
pub(crate) fn zoned_id(d: &ResourceData) -> Result<ZonedId> {
    ZonedId::parse(d.id()).with_context(|| format!("invalid resource id {:?}", d.id()))
}

pub(crate) fn project_id(d: &ResourceData, client: &ScwClient) -> Option<String> {
    d.get_str("project_id")
        .or_else(|| client.default_project_id())
        .map(str::to_string)
}

/// Waiter settings for the running operation
pub(crate) fn wait_options(d: &ResourceData, client: &ScwClient) -> WaitOptions {
    WaitOptions::new(d.timeout(), client.retry_interval())
}

/// `tf-<kind>-<random>`, used when the operator gives no name
pub(crate) fn random_name(kind: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("tf-{kind}-{}", &suffix[..12])
}

/// Name from the configuration, else a random one
pub(crate) fn name_or_random(d: &ResourceData, kind: &str) -> String {
    d.get_str("name")
        .map(str::to_string)
        .unwrap_or_else(|| random_name(kind))
}

/// `fr-par-1/<uuid>` and `<uuid>` name the same object
pub(crate) fn diff_suppress_localized_id(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => expand_id(a) == expand_id(b),
        _ => false,
    }
}

/// `None` when the API answers 404 for the object the call is about.
///
/// Only wrap calls whose 404 means the resource itself is gone, never
/// lookups of objects it merely references.
pub(crate) fn found<T>(result: ScwResult<T>) -> ScwResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            tracing::debug!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Lists of localized ids that name the same objects in the same order
pub(crate) fn diff_suppress_localized_id_list(a: &Value, b: &Value) -> bool {
    match (a.as_array(), b.as_array()) {
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(a, b)| a == b || diff_suppress_localized_id(a, b))
        }
        _ => false,
    }
}

pub(crate) fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

pub(crate) fn flatten_time(time: Option<DateTime<Utc>>) -> Value {
    time.map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(Value::Null)
}
