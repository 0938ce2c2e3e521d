//! Shared harness for acceptance-style tests
//!
//! A [`TestEnv`] runs the provider against [`FakeScaleway`]. A [`Stack`]
//! applies successive lists of resource configurations the way an engine
//! would: resources are addressed as `type.name`, strings may reference
//! attributes of resources applied earlier with `${type.name.attr}`, and
//! resources dropped from a step are destroyed after the others converge.

#![allow(dead_code)]

pub mod fake_api;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer};

use scw_provider::provider::Provider;
use scw_provider::scw::{Credentials, ScwClient, Zone};

pub use fake_api::*;

pub struct TestEnv {
    pub server: MockServer,
    pub fake: FakeScaleway,
    pub provider: Provider,
}

impl TestEnv {
    /// Environment whose default zone is `fr-par-1`
    pub async fn start() -> Self {
        Self::start_in("fr-par-1").await
    }

    pub async fn start_in(zone: &str) -> Self {
        Self::start_with(zone, Some(PROJECT_ID)).await
    }

    pub async fn start_with(zone: &str, project_id: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let fake = FakeScaleway::new();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;

        let zone = Zone::parse(zone).unwrap();
        let client = ScwClient::new(Credentials {
            access_key: Some("SCWXXXXXXXXXXXXXXXXX".to_string()),
            secret_key: Some(SECRET_KEY.to_string()),
            default_organization_id: Some(ORGANIZATION_ID.to_string()),
            default_project_id: project_id.map(str::to_string),
            default_region: Some(zone.region()),
            default_zone: Some(zone),
            api_url: Some(server.uri()),
        })
        .unwrap()
        .with_retry_interval(Duration::from_millis(5));

        Self {
            server,
            fake,
            provider: Provider::new(client),
        }
    }

    pub fn client(&self) -> &ScwClient {
        self.provider.client()
    }

    pub fn stack(&self) -> Stack<'_> {
        Stack {
            provider: &self.provider,
            order: Vec::new(),
            states: BTreeMap::new(),
        }
    }
}

/// Resources applied together, keyed by `type.name`
pub struct Stack<'a> {
    provider: &'a Provider,
    order: Vec<String>,
    states: BTreeMap<String, Value>,
}

fn type_of(address: &str) -> &str {
    address.split('.').next().unwrap_or(address)
}

impl Stack<'_> {
    /// Converge on `step`, then refresh every resource
    pub async fn apply(&mut self, step: &[(&str, Value)]) -> Result<()> {
        for (address, config) in step {
            let config = self.interpolate(config)?;
            let prior = self.states.get(*address).cloned();
            let state = self
                .provider
                .apply(type_of(address), config, prior)
                .await?;

            if !self.states.contains_key(*address) {
                self.order.push(address.to_string());
            }
            self.states.insert(address.to_string(), state);
        }

        let dropped: Vec<String> = self
            .order
            .iter()
            .rev()
            .filter(|address| !step.iter().any(|(a, _)| *a == address.as_str()))
            .cloned()
            .collect();
        for address in dropped {
            self.destroy(&address).await?;
        }

        self.refresh().await
    }

    pub async fn refresh(&mut self) -> Result<()> {
        for address in self.order.clone() {
            let state = self.states[&address].clone();
            match self.provider.read(type_of(&address), state).await? {
                Some(state) => {
                    self.states.insert(address, state);
                }
                None => return Err(anyhow!("{address} disappeared")),
            }
        }
        Ok(())
    }

    pub async fn destroy(&mut self, address: &str) -> Result<()> {
        let state = self
            .states
            .remove(address)
            .ok_or_else(|| anyhow!("{address} is not in the stack"))?;
        self.order.retain(|a| a != address);
        self.provider.delete(type_of(address), state.clone()).await?;

        if self.provider.read(type_of(address), state).await?.is_some() {
            return Err(anyhow!("{address} still exists after destroy"));
        }
        Ok(())
    }

    /// Destroy everything, most recent first, checking each is really gone
    pub async fn destroy_all(&mut self) -> Result<()> {
        for address in self.order.clone().into_iter().rev() {
            self.destroy(&address).await?;
        }
        Ok(())
    }

    pub fn state(&self, address: &str) -> &Value {
        &self.states[address]
    }

    /// Flattened attribute: `tags.#`, `private_network.0.static_config.1`
    pub fn attr(&self, address: &str, path: &str) -> Option<String> {
        let mut flat = BTreeMap::new();
        flatten("", self.states.get(address)?, &mut flat);
        flat.remove(path)
    }

    #[track_caller]
    pub fn check(&self, address: &str, path: &str, expected: &str) {
        assert_eq!(
            self.attr(address, path).as_deref(),
            Some(expected),
            "{address}.{path}"
        );
    }

    #[track_caller]
    pub fn check_set(&self, address: &str, path: &str) {
        let value = self.attr(address, path);
        assert!(
            value.as_deref().is_some_and(|v| !v.is_empty()),
            "{address}.{path} should be set, got {value:?}"
        );
    }

    #[track_caller]
    pub fn check_pair(&self, address: &str, path: &str, other: &str, other_path: &str) {
        let value = self.attr(address, path);
        assert!(value.is_some(), "{address}.{path} is not set");
        assert_eq!(value, self.attr(other, other_path), "{address}.{path} vs {other}.{other_path}");
    }

    pub fn id(&self, address: &str) -> String {
        self.attr(address, "id").unwrap_or_default()
    }

    /// Replace every `${type.name.attr}` in the strings of `config`
    fn interpolate(&self, config: &Value) -> Result<Value> {
        Ok(match config {
            Value::String(s) => Value::String(self.interpolate_str(s)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.interpolate(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.interpolate(v)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }

    fn interpolate_str(&self, s: &str) -> Result<String> {
        let mut out = String::new();
        let mut rest = s;
        while let Some(start) = rest.find("${") {
            let end = rest[start..]
                .find('}')
                .map(|e| start + e)
                .ok_or_else(|| anyhow!("unterminated reference in {s:?}"))?;
            let reference = &rest[start + 2..end];

            let mut parts = reference.splitn(3, '.');
            let (Some(kind), Some(name), Some(path)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(anyhow!("invalid reference {reference:?}"));
            };
            let address = format!("{kind}.{name}");
            let value = self
                .attr(&address, path)
                .ok_or_else(|| anyhow!("unknown reference {reference:?}"))?;

            out.push_str(&rest[..start]);
            out.push_str(&value);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}.{k}")
        }
    };
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(_) | Value::Number(_) => {
            out.insert(prefix.to_string(), value.to_string());
        }
        Value::Array(items) => {
            out.insert(key("#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten(&key(&i.to_string()), item, out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&key(k), v, out);
            }
        }
    }
}

/// Number of mutating calls (anything but GET) seen by the fake
pub fn mutations(fake: &FakeScaleway) -> usize {
    fake.requests()
        .iter()
        .filter(|r| !r.starts_with("GET "))
        .count()
}
