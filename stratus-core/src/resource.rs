//! Resource - Representing declared resources and their state

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::provider::{ProviderError, ProviderResult};

/// Address of a resource in a declarative document (`<type>.<label>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceAddress {
    /// Resource type (e.g., "azurerm_managed_disk")
    pub resource_type: String,
    /// Label given to the resource block (e.g., "test")
    pub label: String,
}

impl ResourceAddress {
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.label)
    }
}

/// Error returned when a `<type>.<label>` address cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid resource address '{0}', expected <type>.<label>")]
pub struct ParseAddressError(pub String);

impl FromStr for ResourceAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((resource_type, label))
                if !resource_type.is_empty() && !label.is_empty() && !label.contains('.') =>
            {
                Ok(Self::new(resource_type, label))
            }
            _ => Err(ParseAddressError(s.to_string())),
        }
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Build a `Value::Map` of strings
    pub fn string_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        )
    }

    /// Render a value the way it is substituted into `${...}` interpolations
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Convert to a JSON value (used by state persistence)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let object = keys
                    .into_iter()
                    .map(|k| (k.clone(), map[k].to_json()))
                    .collect();
                serde_json::Value::Object(object)
            }
        }
    }

    /// Convert from a JSON value. `null` has no representation and yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(|f| Value::Int(f as i64))
                }
            }
            serde_json::Value::Array(arr) => {
                Some(Value::List(arr.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(obj) => Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{} = {}", k, map[k]))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Desired state declared in a document
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub address: ResourceAddress,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: ResourceAddress::new(resource_type, label),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    fn type_error(&self, key: &str, expected: &str, got: &Value) -> ProviderError {
        ProviderError::invalid_config(format!(
            "Attribute '{}' must be {}, got {}",
            key,
            expected,
            got.type_name()
        ))
        .for_resource(self.address.clone())
    }

    /// Get a required string attribute
    pub fn required_str(&self, key: &str) -> ProviderResult<String> {
        self.optional_str(key)?.ok_or_else(|| {
            ProviderError::invalid_config(format!("Required attribute '{}' is missing", key))
                .for_resource(self.address.clone())
        })
    }

    /// Get an optional string attribute. Absence is reported as `None`, never as "".
    pub fn optional_str(&self, key: &str) -> ProviderResult<Option<String>> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(key, "a string", other)),
        }
    }

    /// Get an optional boolean attribute
    pub fn optional_bool(&self, key: &str) -> ProviderResult<Option<bool>> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" || s == "false" => Ok(Some(s == "true")),
            Some(other) => Err(self.type_error(key, "a bool", other)),
        }
    }

    /// Get a boolean attribute with a default value
    pub fn bool_or(&self, key: &str, default: bool) -> ProviderResult<bool> {
        Ok(self.optional_bool(key)?.unwrap_or(default))
    }

    /// Get an optional integer attribute. Numeric strings are accepted.
    pub fn optional_int(&self, key: &str) -> ProviderResult<Option<i64>> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.type_error(key, "an integer", &Value::String(s.clone()))),
            Some(other) => Err(self.type_error(key, "an integer", other)),
        }
    }

    /// Get a string-to-string map attribute (e.g. tags). Absent maps are empty.
    pub fn string_map(&self, key: &str) -> ProviderResult<HashMap<String, String>> {
        match self.attributes.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Map(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    Value::Int(_) | Value::Bool(_) => Ok((k.clone(), v.render())),
                    other => Err(self.type_error(&format!("{}.{}", key, k), "a string", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(key, "a map", other)),
        }
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub address: ResourceAddress,
    /// Remote identifier (e.g., an ARM resource ID)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(address: ResourceAddress) -> Self {
        Self {
            address,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(address: ResourceAddress, attributes: HashMap<String, Value>) -> Self {
        Self {
            address,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Look up an attribute using flat-map keys.
    ///
    /// `id` is the identifier, `tags.%` is the number of entries of the `tags` map,
    /// and `tags.environment` is a single entry.
    pub fn flat_attribute(&self, key: &str) -> Option<String> {
        if key == "id" {
            return self.identifier.clone();
        }
        if let Some(value) = self.attributes.get(key) {
            return Some(value.render());
        }
        let (head, tail) = key.split_once('.')?;
        match self.attributes.get(head)? {
            Value::Map(map) if tail == "%" => Some(map.len().to_string()),
            Value::Map(map) => map.get(tail).map(Value::render),
            Value::List(items) if tail == "#" => Some(items.len().to_string()),
            Value::List(items) => tail
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(Value::render),
            _ => None,
        }
    }
}

/// Known states keyed by address
pub type StateMap = BTreeMap<ResourceAddress, State>;

/// Set of attribute writes produced by a read.
///
/// `None` entries clear the attribute so a value that disappeared remotely
/// does not linger in state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePatch {
    entries: Vec<(String, Option<Value>)>,
}

impl AttributePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.entries.push((key.into(), Some(value)));
        self
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(key, Value::String(value.into()))
    }

    pub fn set_optional(&mut self, key: impl Into<String>, value: Option<Value>) -> &mut Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn clear(&mut self, key: impl Into<String>) -> &mut Self {
        self.set_optional(key, None)
    }

    /// Most recent write for a key: `Some(None)` when cleared
    pub fn get(&self, key: &str) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply(&self, attributes: &mut HashMap<String, Value>) {
        for (key, value) in &self.entries {
            match value {
                Some(v) => {
                    attributes.insert(key.clone(), v.clone());
                }
                None => {
                    attributes.remove(key);
                }
            }
        }
    }
}
