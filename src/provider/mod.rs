//! Provider core
//!
//! The provisioning engine talks to a [`Provider`], which dispatches every
//! call to the [`Resource`] registered under the requested type name. State
//! and configuration documents travel as JSON objects; resources see them
//! through [`ResourceData`].

pub mod data;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::schema::{ResourceSchema, ValidationError};
use crate::scw::{ScwClient, ScwError};

pub use data::ResourceData;

/// Per-operation time budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
    pub default: Duration,
}

impl Timeouts {
    /// Same budget for every operation
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
            default: timeout,
        }
    }

    pub const fn minutes(minutes: u64) -> Self {
        Self::uniform(Duration::from_secs(minutes * 60))
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::minutes(10)
    }
}

/// Migration of a raw state document from `version` to `version + 1`
#[derive(Clone, Copy)]
pub struct StateUpgrader {
    pub version: u32,
    pub upgrade: fn(Map<String, Value>) -> Result<Map<String, Value>>,
}

impl std::fmt::Debug for StateUpgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateUpgrader")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// One manageable resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Name the engine knows this type by, `scaleway_lb`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    async fn create(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()>;

    /// Refresh `d` from the API; clear the id when the resource is gone
    async fn read(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()>;

    async fn update(&self, _d: &mut ResourceData, _client: &ScwClient) -> Result<()> {
        bail!("{} does not support in-place updates", self.type_name())
    }

    async fn delete(&self, d: &mut ResourceData, client: &ScwClient) -> Result<()>;

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        Vec::new()
    }
}

struct Registered {
    resource: Arc<dyn Resource>,
    schema: Arc<ResourceSchema>,
}

/// Registry of resource types bound to an API client
pub struct Provider {
    client: ScwClient,
    resources: BTreeMap<&'static str, Registered>,
}

impl Provider {
    /// Provider serving every built-in resource type
    pub fn new(client: ScwClient) -> Self {
        let mut provider = Self::empty(client);
        for resource in crate::resources::all() {
            provider.register(resource);
        }
        provider
    }

    pub fn empty(client: ScwClient) -> Self {
        Self {
            client,
            resources: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, resource: Arc<dyn Resource>) {
        let schema = Arc::new(resource.schema());
        self.resources
            .insert(resource.type_name(), Registered { resource, schema });
    }

    pub fn client(&self) -> &ScwClient {
        &self.client
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    fn lookup(&self, type_name: &str) -> Result<&Registered> {
        self.resources
            .get(type_name)
            .ok_or_else(|| anyhow!("unknown resource type: {type_name}"))
    }

    pub fn schema(&self, type_name: &str) -> Result<&ResourceSchema> {
        Ok(&self.lookup(type_name)?.schema)
    }

    /// JSON document describing every registered resource
    pub fn schemas(&self) -> Value {
        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|(name, r)| (name.to_string(), r.schema.to_json()))
            .collect();
        json!({ "resource_schemas": resources })
    }

    pub fn validate(&self, type_name: &str, config: &Value) -> Result<()> {
        let registered = self.lookup(type_name)?;
        let config = as_object(config, "configuration")?;
        let diagnostics = registered.schema.validate(config);
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                resource_type: type_name.to_string(),
                diagnostics,
            }
            .into())
        }
    }

    /// Force-new attributes changed between `prior` state and `config`
    pub fn requires_replace(
        &self,
        type_name: &str,
        prior: &Value,
        config: &Value,
    ) -> Result<Vec<String>> {
        let registered = self.lookup(type_name)?;
        Ok(registered.schema.requires_replace(
            as_object(prior, "state")?,
            as_object(config, "configuration")?,
        ))
    }

    pub async fn create(&self, type_name: &str, config: Value) -> Result<Value> {
        self.validate(type_name, &config)?;
        let registered = self.lookup(type_name)?;
        let timeouts = registered.resource.timeouts();
        let mut d = ResourceData::for_create(registered.schema.clone(), into_object(config)?)
            .with_timeout(timeouts.create);

        tracing::info!("creating {}", type_name);
        with_timeout(
            type_name,
            "create",
            timeouts.create,
            registered.resource.create(&mut d, &self.client),
        )
        .await
        .with_context(|| format!("failed to create {type_name}"))?;

        if d.is_gone() {
            bail!("{type_name} disappeared right after creation");
        }
        Ok(Value::Object(d.into_state()))
    }

    /// Refresh a resource; `None` when it no longer exists
    pub async fn read(&self, type_name: &str, state: Value) -> Result<Option<Value>> {
        let registered = self.lookup(type_name)?;
        let timeouts = registered.resource.timeouts();
        let mut d = ResourceData::for_state(registered.schema.clone(), into_object(state)?)
            .with_timeout(timeouts.read);
        if d.is_gone() {
            return Ok(None);
        }

        let result = with_timeout(
            type_name,
            "read",
            timeouts.read,
            registered.resource.read(&mut d, &self.client),
        )
        .await;

        // Only the resource knows which 404 means it is gone; it clears the id
        match result {
            Err(e) => Err(e.context(format!("failed to read {type_name} {}", d.id()))),
            Ok(()) if d.is_gone() => {
                tracing::warn!("{} not found, removing from state", type_name);
                Ok(None)
            }
            Ok(()) => Ok(Some(Value::Object(d.into_state()))),
        }
    }

    pub async fn update(&self, type_name: &str, state: Value, config: Value) -> Result<Value> {
        self.validate(type_name, &config)?;
        let replace = self.requires_replace(type_name, &state, &config)?;
        if !replace.is_empty() {
            bail!(
                "{type_name} must be replaced, changed attributes: {}",
                replace.join(", ")
            );
        }

        let registered = self.lookup(type_name)?;
        let timeouts = registered.resource.timeouts();
        let mut d = ResourceData::for_update(
            registered.schema.clone(),
            into_object(state)?,
            into_object(config)?,
        )
        .with_timeout(timeouts.update);

        let changed = registered
            .schema
            .attributes
            .iter()
            .any(|(name, attr)| attr.is_settable() && d.has_change(name));

        let (op, timeout, fut) = if changed {
            tracing::info!("updating {} {}", type_name, d.id());
            ("update", timeouts.update, registered.resource.update(&mut d, &self.client))
        } else {
            ("read", timeouts.read, registered.resource.read(&mut d, &self.client))
        };
        with_timeout(type_name, op, timeout, fut)
            .await
            .with_context(|| format!("failed to update {type_name}"))?;

        if d.is_gone() {
            bail!("{type_name} no longer exists");
        }
        Ok(Value::Object(d.into_state()))
    }

    /// Delete a resource; one that is already gone counts as deleted
    pub async fn delete(&self, type_name: &str, state: Value) -> Result<()> {
        let registered = self.lookup(type_name)?;
        let timeouts = registered.resource.timeouts();
        let mut d = ResourceData::for_state(registered.schema.clone(), into_object(state)?)
            .with_timeout(timeouts.delete);
        if d.is_gone() {
            return Ok(());
        }

        tracing::info!("deleting {} {}", type_name, d.id());
        with_timeout(
            type_name,
            "delete",
            timeouts.delete,
            registered.resource.delete(&mut d, &self.client),
        )
        .await
        .with_context(|| format!("failed to delete {type_name}"))
    }

    /// Converge a resource on `config`: create it, update it in place, or
    /// replace it when a force-new attribute changed
    pub async fn apply(
        &self,
        type_name: &str,
        config: Value,
        prior: Option<Value>,
    ) -> Result<Value> {
        let Some(prior) = prior else {
            return self.create(type_name, config).await;
        };

        let Some(current) = self.read(type_name, prior).await? else {
            tracing::info!("{} is gone, creating it again", type_name);
            return self.create(type_name, config).await;
        };

        let replace = self.requires_replace(type_name, &current, &config)?;
        if replace.is_empty() {
            return self.update(type_name, current, config).await;
        }

        tracing::info!(
            "replacing {} because of changes to {}",
            type_name,
            replace.join(", ")
        );
        self.validate(type_name, &config)?;
        self.delete(type_name, current).await?;
        self.create(type_name, config).await
    }

    /// Adopt an existing resource by id
    pub async fn import(&self, type_name: &str, id: &str) -> Result<Option<Value>> {
        self.read(type_name, json!({ "id": id })).await
    }

    /// Bring a raw state document written at `from_version` up to date
    pub fn upgrade_state(
        &self,
        type_name: &str,
        from_version: u32,
        raw: Value,
    ) -> Result<Value> {
        let registered = self.lookup(type_name)?;
        upgrade_state(registered.resource.as_ref(), from_version, raw)
    }
}

/// Run the state upgraders of `resource` from `from_version` to its schema
/// version. Needs no API access.
pub fn upgrade_state(resource: &dyn Resource, from_version: u32, raw: Value) -> Result<Value> {
    let type_name = resource.type_name();
    let target = resource.schema().version;
    if from_version > target {
        bail!("{type_name} state version {from_version} is newer than schema version {target}");
    }

    let mut upgraders = resource.state_upgraders();
    upgraders.sort_by_key(|u| u.version);

    let mut state = into_object(raw)?;
    for version in from_version..target {
        let upgrader = upgraders
            .iter()
            .find(|u| u.version == version)
            .ok_or_else(|| anyhow!("no state upgrader for {type_name} version {version}"))?;
        tracing::debug!("upgrading {} state from version {}", type_name, version);
        state = (upgrader.upgrade)(state)
            .with_context(|| format!("failed to upgrade {type_name} state from version {version}"))?;
    }
    Ok(Value::Object(state))
}

async fn with_timeout<F>(type_name: &str, op: &str, timeout: Duration, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ScwError::Timeout {
            what: format!("{type_name} {op}"),
            seconds: timeout.as_secs(),
        }
        .into()),
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| anyhow!("{what} must be a JSON object"))
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("expected a JSON object, got {other}"),
    }
}
