//! Declarative resource schemas
//!
//! A schema describes the attributes a resource type accepts: their type,
//! whether the operator must, may or cannot set them, defaults, and whether
//! changing them forces the resource to be recreated. The provisioning engine
//! consumes the JSON rendering of these schemas; the provider uses them to
//! validate configurations and compute default values.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Bool,
    Int,
    StringList,
    /// List of nested objects described by [`Attribute::block`]
    Block,
}

/// Values considered equal despite a textual difference
pub type DiffSuppressFn = fn(&Value, &Value) -> bool;

#[derive(Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BTreeMap<String, Attribute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip)]
    pub diff_suppress: Option<DiffSuppressFn>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .field("default", &self.default)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

impl Attribute {
    fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
            block: None,
            min_items: None,
            max_items: None,
            diff_suppress: None,
        }
    }

    pub fn required(value_type: ValueType) -> Self {
        Self {
            required: true,
            ..Self::new(value_type)
        }
    }

    pub fn optional(value_type: ValueType) -> Self {
        Self {
            optional: true,
            ..Self::new(value_type)
        }
    }

    /// Read-only attribute filled from the API
    pub fn computed(value_type: ValueType) -> Self {
        Self {
            computed: true,
            ..Self::new(value_type)
        }
    }

    /// Optional attribute the API fills in when the operator leaves it out
    pub fn optional_computed(value_type: ValueType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(value_type)
        }
    }

    /// Nested block list
    pub fn block(attributes: impl IntoIterator<Item = (&'static str, Attribute)>) -> Self {
        Self {
            block: Some(
                attributes
                    .into_iter()
                    .map(|(name, attr)| (name.to_string(), attr))
                    .collect(),
            ),
            ..Self::new(ValueType::Block)
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn make_optional(mut self) -> Self {
        self.required = false;
        self.optional = true;
        self
    }

    pub fn make_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    /// Whether the operator can set this attribute at all
    pub fn is_settable(&self) -> bool {
        self.required || self.optional
    }

    /// Compare two values of this attribute, honouring the diff suppressor
    pub fn values_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        let a = a.unwrap_or(&Value::Null);
        let b = b.unwrap_or(&Value::Null);
        if a == b {
            return true;
        }
        match self.diff_suppress {
            Some(f) if !a.is_null() && !b.is_null() => f(a, b),
            _ => is_empty_value(a) && is_empty_value(b),
        }
    }
}

/// `null`, `""`, `[]` and `false` are all "unset" for diff purposes
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Case-insensitive comparison of two strings
pub fn diff_suppress_case_insensitive(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// A single validation problem, located by attribute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Error, Debug)]
#[error("invalid configuration for {resource_type}: {}", format_diagnostics(.diagnostics))]
pub struct ValidationError {
    pub resource_type: String,
    pub diagnostics: Vec<Diagnostic>,
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Schema of one resource type
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    pub version: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl ResourceSchema {
    pub fn new(attributes: impl IntoIterator<Item = (&'static str, Attribute)>) -> Self {
        Self {
            version: 0,
            description: String::new(),
            attributes: attributes
                .into_iter()
                .map(|(name, attr)| (name.to_string(), attr))
                .collect(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check a configuration document, reporting every problem found
    pub fn validate(&self, config: &Map<String, Value>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_object(&self.attributes, config, "", &mut diagnostics);
        diagnostics
    }

    /// Fill defaults for optional attributes left out of `config`
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        apply_defaults_object(&self.attributes, config);
    }

    /// Force-new attributes whose configured value differs from `prior`
    pub fn requires_replace(
        &self,
        prior: &Map<String, Value>,
        config: &Map<String, Value>,
    ) -> Vec<String> {
        let mut config = config.clone();
        self.apply_defaults(&mut config);

        self.attributes
            .iter()
            .filter(|(_, attr)| attr.force_new && attr.is_settable())
            .filter(|(name, attr)| {
                let wanted = config.get(name.as_str()).filter(|v| !v.is_null());
                // Optional+computed attributes left out keep their prior value
                match wanted {
                    None if attr.computed => false,
                    wanted => !attr.values_equal(prior.get(name.as_str()), wanted),
                }
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(
    attributes: &BTreeMap<String, Attribute>,
    config: &Map<String, Value>,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, value) in config {
        let path = join_path(prefix, name);
        if value.is_null() {
            continue;
        }
        let Some(attr) = attributes.get(name) else {
            diagnostics.push(Diagnostic {
                path,
                message: "unsupported argument".to_string(),
            });
            continue;
        };
        if !attr.is_settable() {
            diagnostics.push(Diagnostic {
                path,
                message: "value is computed by the API and cannot be set".to_string(),
            });
            continue;
        }
        validate_value(attr, value, &path, diagnostics);
    }

    for (name, attr) in attributes {
        if attr.required && config.get(name).map_or(true, Value::is_null) {
            diagnostics.push(Diagnostic {
                path: join_path(prefix, name),
                message: "missing required argument".to_string(),
            });
        }
    }
}

fn validate_value(attr: &Attribute, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mismatch = |expected: &str| Diagnostic {
        path: path.to_string(),
        message: format!("expected {expected}"),
    };

    match attr.value_type {
        ValueType::String if !value.is_string() => diagnostics.push(mismatch("a string")),
        ValueType::Bool if !value.is_boolean() => diagnostics.push(mismatch("a boolean")),
        ValueType::Int if !(value.is_i64() || value.is_u64()) => {
            diagnostics.push(mismatch("an integer"))
        }
        ValueType::StringList => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => {
                check_item_count(attr, items.len(), path, diagnostics)
            }
            _ => diagnostics.push(mismatch("a list of strings")),
        },
        ValueType::Block => match value.as_array() {
            Some(items) => {
                check_item_count(attr, items.len(), path, diagnostics);
                let nested = attr.block.as_ref();
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{path}.{index}");
                    match (item.as_object(), nested) {
                        (Some(object), Some(nested)) => {
                            validate_object(nested, object, &item_path, diagnostics)
                        }
                        _ => diagnostics.push(Diagnostic {
                            path: item_path,
                            message: "expected a block".to_string(),
                        }),
                    }
                }
            }
            None => diagnostics.push(mismatch("a list of blocks")),
        },
        _ => {}
    }
}

fn check_item_count(attr: &Attribute, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(min) = attr.min_items {
        if len < min {
            diagnostics.push(Diagnostic {
                path: path.to_string(),
                message: format!("at least {min} item(s) required, got {len}"),
            });
        }
    }
    if let Some(max) = attr.max_items {
        if len > max {
            diagnostics.push(Diagnostic {
                path: path.to_string(),
                message: format!("at most {max} item(s) allowed, got {len}"),
            });
        }
    }
}

fn apply_defaults_object(attributes: &BTreeMap<String, Attribute>, config: &mut Map<String, Value>) {
    for (name, attr) in attributes {
        let current = config.get_mut(name.as_str());
        match current {
            Some(Value::Array(items)) if attr.value_type == ValueType::Block => {
                if let Some(nested) = &attr.block {
                    for item in items.iter_mut() {
                        if let Value::Object(object) = item {
                            apply_defaults_object(nested, object);
                        }
                    }
                }
            }
            Some(value) if !value.is_null() => {}
            _ => {
                if let Some(default) = &attr.default {
                    config.insert(name.clone(), default.clone());
                }
            }
        }
    }
}
