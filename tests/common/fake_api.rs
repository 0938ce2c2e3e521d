//! In-memory Scaleway API served through wiremock
//!
//! Objects move through their transient statuses one observation at a time:
//! a GET returns the current document, then advances it (`creating` becomes
//! `ready`, `installing` becomes `completed`...). Waiters therefore poll at
//! least twice, like against the real API.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use wiremock::{Request, Respond, ResponseTemplate};

pub const SECRET_KEY: &str = "11111111-1111-1111-1111-111111111111";
pub const PROJECT_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const ORGANIZATION_ID: &str = "33333333-3333-3333-3333-333333333333";

pub const OFFER_ID: &str = "964f9b38-577e-470f-a220-7d762f9e8672";
pub const OFFER_NAME: &str = "GP-BM1-M";
pub const OS_FOCAL: &str = "d17d6872-0412-45d9-a198-af82c34d3c5c";
pub const OS_JAMMY: &str = "d859aa89-8b4a-4551-af42-ff7c0c27260a";

#[derive(Debug, Clone)]
struct Failure {
    method: String,
    fragment: String,
    status: u16,
}

#[derive(Default)]
struct State {
    lbs: BTreeMap<String, Value>,
    ips: BTreeMap<String, Value>,
    attachments: BTreeMap<String, Vec<Value>>,
    servers: BTreeMap<String, Value>,
    offers: BTreeMap<String, Value>,
    os: BTreeMap<String, Value>,
    private_networks: BTreeMap<String, Value>,
    tokens: BTreeMap<String, Value>,
    ssh_keys: BTreeMap<String, Value>,
    requests: Vec<String>,
    failures: Vec<Failure>,
    ip_counter: u8,
}

#[derive(Clone, Default)]
pub struct FakeScaleway {
    state: Arc<Mutex<State>>,
}

impl FakeScaleway {
    pub fn new() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.lock();
            state.offers.insert(
                OFFER_ID.to_string(),
                json!({
                    "id": OFFER_ID,
                    "name": OFFER_NAME,
                    "stock": "available",
                    "enable": true,
                    "zone": "fr-par-2"
                }),
            );
            for (id, name, version) in [
                (OS_FOCAL, "Ubuntu", "20.04 LTS (Focal Fossa)"),
                (OS_JAMMY, "Ubuntu", "22.04 LTS (Jammy Jellyfish)"),
            ] {
                state
                    .os
                    .insert(id.to_string(), json!({"id": id, "name": name, "version": version}));
            }
        }
        fake
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer `status` to every request whose method matches and whose path
    /// contains `fragment`
    pub fn fail(&self, method: &str, fragment: &str, status: u16) {
        self.lock().failures.push(Failure {
            method: method.to_string(),
            fragment: fragment.to_string(),
            status,
        });
    }

    /// `METHOD /path` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn count_requests(&self, method: &str, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with(method) && r.contains(fragment))
            .count()
    }

    pub fn lb_count(&self) -> usize {
        self.lock().lbs.len()
    }

    pub fn ip_count(&self) -> usize {
        self.lock().ips.len()
    }

    pub fn server_count(&self) -> usize {
        self.lock().servers.len()
    }

    pub fn private_network_names(&self) -> Vec<String> {
        names(&self.lock().private_networks)
    }

    pub fn token_names(&self) -> Vec<String> {
        names(&self.lock().tokens)
    }

    pub fn ssh_key_names(&self) -> Vec<String> {
        names(&self.lock().ssh_keys)
    }

    /// Seed an object straight into the store; returns its id
    pub fn seed(&self, collection: &str, mut object: Value) -> String {
        let id = new_id();
        object["id"] = json!(id);
        let mut state = self.lock();
        let map = match collection {
            "lbs" => &mut state.lbs,
            "ips" => &mut state.ips,
            "servers" => &mut state.servers,
            "private_networks" => &mut state.private_networks,
            "tokens" => &mut state.tokens,
            "ssh_keys" => &mut state.ssh_keys,
            other => panic!("unknown collection {other}"),
        };
        map.insert(id.clone(), object);
        id
    }
}

fn names(map: &BTreeMap<String, Value>) -> Vec<String> {
    let mut names: Vec<String> = map
        .values()
        .filter_map(|v| v["name"].as_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn no_content() -> ResponseTemplate {
    ResponseTemplate::new(204)
}

fn error(status: u16, kind: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"message": message, "type": kind}))
}

fn not_found(resource: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "message": "resource is not found",
        "type": "not_found",
        "resource": resource
    }))
}

fn page(items: Vec<Value>, key: &str, query: &HashMap<String, String>) -> ResponseTemplate {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let size: usize = query
        .get("page_size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(50);
    let total = items.len();
    let items: Vec<Value> = items
        .into_iter()
        .skip((page.max(1) - 1) * size)
        .take(size)
        .collect();
    ok(json!({ key: items, "total_count": total }))
}

fn in_zone<'a>(map: &'a BTreeMap<String, Value>, zone: &'a str) -> impl Iterator<Item = &'a Value> {
    map.values().filter(move |v| v["zone"] == zone)
}

fn str_field(body: &Value, key: &str) -> String {
    body[key].as_str().unwrap_or_default().to_string()
}

fn project(body: &Value) -> String {
    body["project_id"]
        .as_str()
        .filter(|p| !p.is_empty())
        .unwrap_or(PROJECT_ID)
        .to_string()
}

impl Respond for FakeScaleway {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.as_str().to_string();
        let path = request.url.path().to_string();
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        let mut state = self.lock();
        state.requests.push(format!("{method} {path}"));

        let token = request
            .headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok());
        if token != Some(SECRET_KEY) {
            return error(401, "denied_authentication", "authentication is denied");
        }

        if let Some(failure) = state
            .failures
            .iter()
            .find(|f| f.method == method && path.contains(&f.fragment))
        {
            return error(failure.status, "injected", "injected failure");
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["lb", "v1", "zones", zone, rest @ ..] => lb(&mut state, &method, zone, rest, &body, &query),
            ["baremetal", "v1", "zones", zone, rest @ ..] => {
                baremetal(&mut state, &method, zone, rest, &body, &query)
            }
            ["vpc", "v1", "zones", zone, "private-networks", rest @ ..] => {
                vpc(&mut state, &method, zone, rest, &body, &query)
            }
            ["cockpit", "v1beta1", "tokens", rest @ ..] => cockpit(&mut state, &method, rest, &body, &query),
            ["account", "v2alpha1", "ssh-keys", rest @ ..] => {
                account(&mut state, &method, rest, &body, &query)
            }
            _ => error(404, "not_found", "unknown route"),
        }
    }
}

// =========================================================================
// Load balancers
// =========================================================================

fn advance_lb(lb: &mut Value) {
    if matches!(lb["status"].as_str(), Some("creating" | "pending" | "migrating" | "to_create")) {
        lb["status"] = json!("ready");
    }
    if let Some(instances) = lb["instances"].as_array_mut() {
        for instance in instances {
            instance["status"] = json!("ready");
        }
    }
}

fn lb(
    state: &mut State,
    method: &str,
    zone: &str,
    rest: &[&str],
    body: &Value,
    query: &HashMap<String, String>,
) -> ResponseTemplate {
    match (method, rest) {
        ("GET", ["lbs"]) => {
            let items = in_zone(&state.lbs, zone).cloned().collect();
            page(items, "lbs", query)
        }
        ("POST", ["lbs"]) => {
            let ip_id = str_field(body, "ip_id");
            let Some(ip) = state.ips.get_mut(&ip_id).filter(|ip| ip["zone"] == zone) else {
                return not_found("ip");
            };
            if !ip["lb_id"].is_null() {
                return error(409, "conflict", "ip already attached");
            }
            let id = new_id();
            ip["lb_id"] = json!(id);
            let ip = ip.clone();

            let name = str_field(body, "name");
            let lb = json!({
                "id": id,
                "name": name,
                "description": str_field(body, "description"),
                "status": "creating",
                "instances": [{"id": new_id(), "status": "pending", "ip_address": "10.64.0.1"}],
                "organization_id": ORGANIZATION_ID,
                "project_id": project(body),
                "ip": [ip],
                "tags": body["tags"].clone(),
                "type": str_field(body, "type"),
                "ssl_compatibility_level": body["ssl_compatibility_level"].clone(),
                "zone": zone,
                "created_at": now(),
                "updated_at": now(),
            });
            state.lbs.insert(id, lb.clone());
            ok(lb)
        }
        ("GET", ["lbs", id]) => match state.lbs.get_mut(*id) {
            Some(lb) => {
                let snapshot = lb.clone();
                advance_lb(lb);
                ok(snapshot)
            }
            None => not_found("lb"),
        },
        ("PUT", ["lbs", id]) => match state.lbs.get_mut(*id) {
            Some(lb) => {
                for key in ["name", "description", "tags", "ssl_compatibility_level"] {
                    if !body[key].is_null() {
                        lb[key] = body[key].clone();
                    }
                }
                lb["updated_at"] = json!(now());
                ok(lb.clone())
            }
            None => not_found("lb"),
        },
        ("DELETE", ["lbs", id]) => {
            let Some(lb) = state.lbs.remove(*id) else {
                return not_found("lb");
            };
            state.attachments.remove(*id);
            let release = query.get("release_ip").map(String::as_str) == Some("true");
            if let Some(ip_id) = lb["ip"][0]["id"].as_str() {
                if release {
                    state.ips.remove(ip_id);
                } else if let Some(ip) = state.ips.get_mut(ip_id) {
                    ip["lb_id"] = Value::Null;
                }
            }
            no_content()
        }
        ("POST", ["lbs", id, "migrate"]) => match state.lbs.get_mut(*id) {
            Some(lb) => {
                lb["type"] = body["type"].clone();
                lb["status"] = json!("migrating");
                ok(lb.clone())
            }
            None => not_found("lb"),
        },
        ("GET", ["lbs", id, "private-networks"]) => {
            if !state.lbs.contains_key(*id) {
                return not_found("lb");
            }
            let attachments = state.attachments.entry(id.to_string()).or_default();
            let snapshot = attachments.clone();
            for attachment in attachments.iter_mut() {
                if attachment["status"] == "pending" {
                    attachment["status"] = json!("ready");
                }
            }
            page(snapshot, "private_network", query)
        }
        ("POST", ["lbs", id, "attach-private-network"]) => {
            if !state.lbs.contains_key(*id) {
                return not_found("lb");
            }
            let pn_id = str_field(body, "private_network_id");
            if !state.private_networks.contains_key(&pn_id) {
                return not_found("private_network");
            }
            let mut attachment = json!({
                "private_network_id": pn_id,
                "status": "pending",
                "created_at": now(),
            });
            if !body["static_config"].is_null() {
                attachment["static_config"] = body["static_config"].clone();
            }
            if !body["dhcp_config"].is_null() {
                attachment["dhcp_config"] = body["dhcp_config"].clone();
            }
            let attachments = state.attachments.entry(id.to_string()).or_default();
            if attachments.iter().any(|a| a["private_network_id"] == pn_id) {
                return error(409, "conflict", "private network already attached");
            }
            attachments.push(attachment.clone());
            ok(attachment)
        }
        ("POST", ["lbs", id, "detach-private-network"]) => {
            let pn_id = str_field(body, "private_network_id");
            let attachments = state.attachments.entry(id.to_string()).or_default();
            let before = attachments.len();
            attachments.retain(|a| a["private_network_id"] != pn_id);
            if attachments.len() == before {
                return not_found("private_network");
            }
            no_content()
        }
        ("GET", ["ips"]) => {
            let items = in_zone(&state.ips, zone).cloned().collect();
            page(items, "ips", query)
        }
        ("POST", ["ips"]) => {
            state.ip_counter = state.ip_counter.wrapping_add(1);
            let address = format!("51.159.26.{}", state.ip_counter);
            let reverse = body["reverse"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}.lb.{}.scw.cloud", address.replace('.', "-"), zone));
            let id = new_id();
            let ip = json!({
                "id": id,
                "ip_address": address,
                "organization_id": ORGANIZATION_ID,
                "project_id": project(body),
                "lb_id": null,
                "reverse": reverse,
                "zone": zone,
            });
            state.ips.insert(id, ip.clone());
            ok(ip)
        }
        ("GET", ["ips", id]) => state
            .ips
            .get(*id)
            .cloned()
            .map(ok)
            .unwrap_or_else(|| not_found("ip")),
        ("PATCH", ["ips", id]) => match state.ips.get_mut(*id) {
            Some(ip) => {
                ip["reverse"] = body["reverse"].clone();
                ok(ip.clone())
            }
            None => not_found("ip"),
        },
        ("DELETE", ["ips", id]) => match state.ips.get(*id) {
            Some(ip) if !ip["lb_id"].is_null() => {
                error(412, "precondition_failed", "ip is attached to a load balancer")
            }
            Some(_) => {
                state.ips.remove(*id);
                no_content()
            }
            None => not_found("ip"),
        },
        _ => error(404, "not_found", "unknown lb route"),
    }
}

// =========================================================================
// Elastic Metal
// =========================================================================

fn advance_server(server: &mut Value) {
    if server["status"] == "delivering" {
        server["status"] = json!("ready");
    }
    if server["install"]["status"] == "installing" {
        server["install"]["status"] = json!("completed");
    }
}

fn baremetal(
    state: &mut State,
    method: &str,
    zone: &str,
    rest: &[&str],
    body: &Value,
    query: &HashMap<String, String>,
) -> ResponseTemplate {
    match (method, rest) {
        ("GET", ["servers"]) => {
            let items = in_zone(&state.servers, zone).cloned().collect();
            page(items, "servers", query)
        }
        ("POST", ["servers"]) => {
            let offer_id = str_field(body, "offer_id");
            let Some(offer) = state.offers.get(&offer_id).filter(|o| o["zone"] == zone) else {
                return not_found("offer");
            };
            let id = new_id();
            let server = json!({
                "id": id,
                "organization_id": ORGANIZATION_ID,
                "project_id": project(body),
                "name": str_field(body, "name"),
                "description": str_field(body, "description"),
                "status": "delivering",
                "offer_id": offer_id,
                "offer_name": offer["name"].clone(),
                "tags": body["tags"].clone(),
                "ips": [
                    {"id": new_id(), "address": "51.159.56.10", "reverse": "", "version": "IPv4"},
                    {"id": new_id(), "address": "2001:bc8:1200::1", "reverse": "", "version": "IPv6"}
                ],
                "domain": format!("{id}.{zone}.baremetal.scw.cloud"),
                "zone": zone,
                "install": null,
                "created_at": now(),
                "updated_at": now(),
            });
            state.servers.insert(id, server.clone());
            ok(server)
        }
        ("GET", ["servers", id]) => match state.servers.get_mut(*id) {
            Some(server) => {
                let snapshot = server.clone();
                advance_server(server);
                ok(snapshot)
            }
            None => not_found("server"),
        },
        ("PATCH", ["servers", id]) => match state.servers.get_mut(*id) {
            Some(server) => {
                for key in ["name", "description", "tags"] {
                    if !body[key].is_null() {
                        server[key] = body[key].clone();
                    }
                }
                ok(server.clone())
            }
            None => not_found("server"),
        },
        ("POST", ["servers", id, "install"]) => {
            let os_id = str_field(body, "os_id");
            if !state.os.contains_key(&os_id) {
                return not_found("os");
            }
            match state.servers.get_mut(*id) {
                Some(server) => {
                    server["install"] = json!({
                        "os_id": os_id,
                        "hostname": str_field(body, "hostname"),
                        "ssh_key_ids": body["ssh_key_ids"].clone(),
                        "status": "installing",
                    });
                    ok(server.clone())
                }
                None => not_found("server"),
            }
        }
        ("DELETE", ["servers", id]) => match state.servers.remove(*id) {
            Some(server) => ok(server),
            None => not_found("server"),
        },
        ("GET", ["offers"]) => {
            let name = query.get("name").cloned().unwrap_or_default();
            let items = in_zone(&state.offers, zone)
                .filter(|o| name.is_empty() || o["name"] == name.as_str())
                .cloned()
                .collect();
            page(items, "offers", query)
        }
        ("GET", ["offers", id]) => state
            .offers
            .get(*id)
            .filter(|o| o["zone"] == zone)
            .cloned()
            .map(ok)
            .unwrap_or_else(|| not_found("offer")),
        ("GET", ["os", id]) => state
            .os
            .get(*id)
            .cloned()
            .map(ok)
            .unwrap_or_else(|| not_found("os")),
        _ => error(404, "not_found", "unknown baremetal route"),
    }
}

// =========================================================================
// VPC
// =========================================================================

fn vpc(
    state: &mut State,
    method: &str,
    zone: &str,
    rest: &[&str],
    body: &Value,
    query: &HashMap<String, String>,
) -> ResponseTemplate {
    match (method, rest) {
        ("GET", []) => {
            let items = in_zone(&state.private_networks, zone).cloned().collect();
            page(items, "private_networks", query)
        }
        ("POST", []) => {
            let id = new_id();
            let pn = json!({
                "id": id,
                "name": str_field(body, "name"),
                "organization_id": ORGANIZATION_ID,
                "project_id": project(body),
                "zone": zone,
                "tags": body["tags"].clone(),
                "created_at": now(),
                "updated_at": now(),
            });
            state.private_networks.insert(id, pn.clone());
            ok(pn)
        }
        ("GET", [id]) => state
            .private_networks
            .get(*id)
            .cloned()
            .map(ok)
            .unwrap_or_else(|| not_found("private_network")),
        ("PATCH", [id]) => match state.private_networks.get_mut(*id) {
            Some(pn) => {
                pn["name"] = body["name"].clone();
                pn["tags"] = body["tags"].clone();
                pn["updated_at"] = json!(now());
                ok(pn.clone())
            }
            None => not_found("private_network"),
        },
        ("DELETE", [id]) => {
            let attached = state
                .attachments
                .values()
                .flatten()
                .any(|a| a["private_network_id"] == *id);
            if attached {
                return error(409, "conflict", "private network is still attached");
            }
            match state.private_networks.remove(*id) {
                Some(_) => no_content(),
                None => not_found("private_network"),
            }
        }
        _ => error(404, "not_found", "unknown vpc route"),
    }
}

// =========================================================================
// Cockpit and account (global)
// =========================================================================

fn cockpit(
    state: &mut State,
    method: &str,
    rest: &[&str],
    body: &Value,
    query: &HashMap<String, String>,
) -> ResponseTemplate {
    match (method, rest) {
        ("GET", []) => {
            let project_id = query.get("project_id").cloned().unwrap_or_default();
            let items = state
                .tokens
                .values()
                .filter(|t| t["project_id"] == project_id.as_str())
                .map(without_secret)
                .collect();
            page(items, "tokens", query)
        }
        ("POST", []) => {
            let id = new_id();
            let scopes = if body["scopes"].is_null() {
                json!({
                    "query_metrics": false,
                    "write_metrics": true,
                    "setup_metrics_rules": false,
                    "query_logs": false,
                    "write_logs": true,
                    "setup_logs_rules": false,
                    "setup_alerts": false
                })
            } else {
                body["scopes"].clone()
            };
            let token = json!({
                "id": id,
                "project_id": project(body),
                "name": str_field(body, "name"),
                "scopes": scopes,
                "secret_key": new_id(),
                "created_at": now(),
                "updated_at": now(),
            });
            state.tokens.insert(id, token.clone());
            ok(token)
        }
        ("GET", [id]) => state
            .tokens
            .get(*id)
            .map(without_secret)
            .map(ok)
            .unwrap_or_else(|| not_found("token")),
        ("DELETE", [id]) => match state.tokens.remove(*id) {
            Some(_) => no_content(),
            None => not_found("token"),
        },
        _ => error(404, "not_found", "unknown cockpit route"),
    }
}

fn without_secret(token: &Value) -> Value {
    let mut token = token.clone();
    if let Some(object) = token.as_object_mut() {
        object.remove("secret_key");
    }
    token
}

fn account(
    state: &mut State,
    method: &str,
    rest: &[&str],
    body: &Value,
    query: &HashMap<String, String>,
) -> ResponseTemplate {
    match (method, rest) {
        ("GET", []) => {
            let project_id = query.get("project_id").cloned();
            let items = state
                .ssh_keys
                .values()
                .filter(|k| project_id.as_deref().map_or(true, |p| k["project_id"] == p))
                .cloned()
                .collect();
            page(items, "ssh_keys", query)
        }
        ("POST", []) => {
            let public_key = str_field(body, "public_key");
            if public_key.split_whitespace().count() < 2 {
                return error(400, "invalid_arguments", "invalid public key");
            }
            let id = new_id();
            let key = json!({
                "id": id,
                "name": str_field(body, "name"),
                "public_key": public_key.trim(),
                "fingerprint": format!("256 MD5:{}", &id[..8]),
                "organization_id": ORGANIZATION_ID,
                "project_id": project(body),
                "created_at": now(),
                "updated_at": now(),
            });
            state.ssh_keys.insert(id, key.clone());
            ok(key)
        }
        ("GET", [id]) => state
            .ssh_keys
            .get(*id)
            .cloned()
            .map(ok)
            .unwrap_or_else(|| not_found("ssh_key")),
        ("PATCH", [id]) => match state.ssh_keys.get_mut(*id) {
            Some(key) => {
                key["name"] = body["name"].clone();
                ok(key.clone())
            }
            None => not_found("ssh_key"),
        },
        ("DELETE", [id]) => match state.ssh_keys.remove(*id) {
            Some(_) => no_content(),
            None => not_found("ssh_key"),
        },
        _ => error(404, "not_found", "unknown account route"),
    }
}
