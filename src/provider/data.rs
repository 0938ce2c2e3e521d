//! Per-operation view of a resource: prior state and planned values

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::schema::ResourceSchema;

/// State handed to a resource implementation for one CRUD call
///
/// `prior` is what the engine last recorded, `values` is what the resource
/// should look like once the call returns. Implementations read the planned
/// values through the `get_*` accessors and write back what the API reports
/// through [`ResourceData::set`].
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Arc<ResourceSchema>,
    id: String,
    prior: Map<String, Value>,
    values: Map<String, Value>,
    timeout: Duration,
}

impl ResourceData {
    /// Fresh resource about to be created from `config`
    pub fn for_create(schema: Arc<ResourceSchema>, config: Map<String, Value>) -> Self {
        let mut values = config;
        values.remove("id");
        schema.apply_defaults(&mut values);
        Self {
            schema,
            id: String::new(),
            prior: Map::new(),
            values,
            timeout: Duration::ZERO,
        }
    }

    /// Existing resource known by its recorded state
    pub fn for_state(schema: Arc<ResourceSchema>, state: Map<String, Value>) -> Self {
        let id = state
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            schema,
            id,
            prior: state.clone(),
            values: state,
            timeout: Duration::ZERO,
        }
    }

    /// Existing resource moving from `state` to `config`
    ///
    /// Settable attributes take the configured value. Attributes left out of
    /// the configuration fall back to their default, or keep the recorded
    /// value when the API computes them.
    pub fn for_update(
        schema: Arc<ResourceSchema>,
        state: Map<String, Value>,
        config: Map<String, Value>,
    ) -> Self {
        let mut data = Self::for_state(schema, state);
        let mut values = data.prior.clone();

        for (name, attr) in data.schema.attributes.iter().filter(|(_, a)| a.is_settable()) {
            match config.get(name).filter(|v| !v.is_null()) {
                Some(value) => {
                    values.insert(name.clone(), value.clone());
                }
                None if attr.computed => {}
                None => {
                    values.remove(name);
                }
            }
        }
        data.schema.apply_defaults(&mut values);
        data.values = values;
        data
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Time budget of the running operation, used by waiters
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the resource as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Value recorded before this operation
    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior.get(key).filter(|v| !v.is_null())
    }

    /// Non-empty string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get_str(key).unwrap_or_default().to_string()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        string_list(self.get(key))
    }

    /// Items of a nested block list
    pub fn get_blocks(&self, key: &str) -> Vec<Map<String, Value>> {
        blocks(self.get(key))
    }

    pub fn prior_blocks(&self, key: &str) -> Vec<Map<String, Value>> {
        blocks(self.prior(key))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Whether the planned value differs from the recorded one
    pub fn has_change(&self, key: &str) -> bool {
        match self.schema.attribute(key) {
            Some(attr) => !attr.values_equal(self.prior(key), self.get(key)),
            None => self.prior(key) != self.get(key),
        }
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.has_change(key))
    }

    /// Final state document, `id` included
    pub fn into_state(self) -> Map<String, Value> {
        let mut state = self.values;
        state.insert("id".to_string(), Value::String(self.id));
        state
    }
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn blocks(value: Option<&Value>) -> Vec<Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
        .unwrap_or_default()
}
