//! Config - Declarative documents and `${type.label.field}` interpolation
//!
//! The configuration language itself lives outside this crate; documents are
//! consumed in their JSON form:
//!
//! ```json
//! {
//!   "provider": { "azurerm": { "subscription_id": "..." } },
//!   "resource": {
//!     "azurerm_resource_group": { "test": { "name": "acctestrg", "location": "West US" } },
//!     "azurerm_managed_disk": {
//!       "test": { "resource_group_name": "${azurerm_resource_group.test.name}" }
//!     }
//!   }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::differ::{create_plan, destroy_plan};
use crate::plan::Plan;
use crate::resource::{Resource, ResourceAddress, StateMap, Value};
use crate::schema::{ResourceSchema, TypeError};

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_.%#-]+)\}")
        .expect("reference pattern is valid")
});

/// Document error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid block '{path}': {message}")]
    InvalidBlock { path: String, message: String },

    #[error("Reference to undeclared resource {reference} in {address}")]
    UndefinedReference {
        address: ResourceAddress,
        reference: String,
    },

    #[error("Cannot resolve {reference} in {address}: value is not known")]
    UnresolvedReference {
        address: ResourceAddress,
        reference: String,
    },

    #[error("Unknown resource type '{resource_type}' for {address}")]
    UnknownResourceType {
        address: ResourceAddress,
        resource_type: String,
    },

    #[error("{address}: {error}")]
    Validation {
        address: ResourceAddress,
        error: TypeError,
    },
}

/// Provider block of a document
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    /// Raw settings, deserialized by the provider that owns them
    pub settings: serde_json::Value,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    provider: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    resource: serde_json::Map<String, serde_json::Value>,
}

/// Parsed declarative document
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub providers: Vec<ProviderConfig>,
    /// Resources in declaration order
    pub resources: Vec<Resource>,
}

impl Document {
    /// Parse the JSON form of a document
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_json::from_str(input)?;

        let providers = raw
            .provider
            .into_iter()
            .map(|(name, settings)| ProviderConfig { name, settings })
            .collect();

        let mut resources = Vec::new();
        for (resource_type, blocks) in raw.resource {
            let blocks = blocks.as_object().ok_or_else(|| ConfigError::InvalidBlock {
                path: format!("resource.{}", resource_type),
                message: "expected an object of labelled resources".to_string(),
            })?;

            for (label, body) in blocks {
                let path = format!("resource.{}.{}", resource_type, label);
                let fields = body.as_object().ok_or_else(|| ConfigError::InvalidBlock {
                    path: path.clone(),
                    message: "expected an object of attributes".to_string(),
                })?;

                let mut resource = Resource::new(resource_type.clone(), label.clone());
                for (key, value) in fields {
                    // null means "not set"
                    if let Some(value) = Value::from_json(value) {
                        resource.attributes.insert(key.clone(), value);
                    }
                }
                resources.push(resource);
            }
        }

        let document = Self {
            providers,
            resources,
        };
        document.check_references()?;
        Ok(document)
    }

    /// Settings of the named provider block, if declared
    pub fn provider_config(&self, name: &str) -> Option<&serde_json::Value> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.settings)
    }

    pub fn resource(&self, address: &ResourceAddress) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.address == address)
    }

    fn check_references(&self) -> Result<(), ConfigError> {
        let declared: HashSet<&ResourceAddress> =
            self.resources.iter().map(|r| &r.address).collect();

        for resource in &self.resources {
            for (reference, _) in resource_references(resource) {
                if !declared.contains(&reference) {
                    return Err(ConfigError::UndefinedReference {
                        address: resource.address.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resources sorted so that referenced resources come first.
    ///
    /// Cycles are broken at the first revisit, keeping declaration order.
    pub fn sorted_resources(&self) -> Vec<Resource> {
        let by_address: HashMap<&ResourceAddress, &Resource> =
            self.resources.iter().map(|r| (&r.address, r)).collect();

        let mut sorted = Vec::new();
        let mut visited: HashSet<ResourceAddress> = HashSet::new();
        let mut visiting: HashSet<ResourceAddress> = HashSet::new();

        fn visit(
            resource: &Resource,
            by_address: &HashMap<&ResourceAddress, &Resource>,
            visited: &mut HashSet<ResourceAddress>,
            visiting: &mut HashSet<ResourceAddress>,
            sorted: &mut Vec<Resource>,
        ) {
            if visited.contains(&resource.address) || visiting.contains(&resource.address) {
                return;
            }
            visiting.insert(resource.address.clone());

            for (dependency, _) in resource_references(resource) {
                if let Some(dep) = by_address.get(&dependency) {
                    visit(dep, by_address, visited, visiting, sorted);
                }
            }

            visiting.remove(&resource.address);
            visited.insert(resource.address.clone());
            sorted.push(resource.clone());
        }

        for resource in &self.resources {
            visit(
                resource,
                &by_address,
                &mut visited,
                &mut visiting,
                &mut sorted,
            );
        }

        sorted
    }

    /// Plan converging `states` towards this document.
    ///
    /// References to resources that already exist are substituted first so
    /// they diff as plain values.
    pub fn plan(&self, states: &StateMap, schemas: &HashMap<String, ResourceSchema>) -> Plan {
        let desired: Vec<Resource> = self
            .sorted_resources()
            .iter()
            .map(|r| resolve_known(r, states))
            .collect();
        create_plan(&desired, states, schemas)
    }

    /// Plan deleting every resource in `states`, dependents first
    pub fn destroy_plan(&self, states: &StateMap) -> Plan {
        destroy_plan(&self.sorted_resources(), states)
    }

    /// Check every resource against its type's schema.
    ///
    /// Attributes that still hold references are only known after apply and
    /// are not type checked.
    pub fn validate(&self, schemas: &HashMap<String, ResourceSchema>) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for resource in &self.resources {
            let Some(schema) = schemas.get(&resource.address.resource_type) else {
                errors.push(ConfigError::UnknownResourceType {
                    address: resource.address.clone(),
                    resource_type: resource.address.resource_type.clone(),
                });
                continue;
            };

            let known: HashMap<String, Value> = resource
                .attributes
                .iter()
                .filter(|(_, v)| !has_unresolved_reference(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if let Err(type_errors) = schema.validate(&known) {
                for error in type_errors {
                    // Required attributes filled by a reference are present
                    if let TypeError::MissingRequired { name } = &error
                        && resource.attributes.contains_key(name)
                    {
                        continue;
                    }
                    errors.push(ConfigError::Validation {
                        address: resource.address.clone(),
                        error,
                    });
                }
            }
        }

        errors
    }
}

/// Every `${type.label.field}` reference in a resource, in attribute-name order
pub fn resource_references(resource: &Resource) -> Vec<(ResourceAddress, String)> {
    let mut keys: Vec<&String> = resource.attributes.keys().collect();
    keys.sort();

    let mut references = Vec::new();
    for key in keys {
        collect_references(&resource.attributes[key], &mut references);
    }
    references
}

fn collect_references(value: &Value, references: &mut Vec<(ResourceAddress, String)>) {
    match value {
        Value::String(s) => {
            for caps in REFERENCE.captures_iter(s) {
                references.push((ResourceAddress::new(&caps[1], &caps[2]), caps[3].to_string()));
            }
        }
        Value::List(items) => {
            for item in items {
                collect_references(item, references);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_references(v, references);
            }
        }
        Value::Int(_) | Value::Bool(_) => {}
    }
}

/// Whether a value still contains a `${...}` reference
pub fn has_unresolved_reference(value: &Value) -> bool {
    match value {
        Value::String(s) => REFERENCE.is_match(s),
        Value::List(items) => items.iter().any(has_unresolved_reference),
        Value::Map(map) => map.values().any(has_unresolved_reference),
        Value::Int(_) | Value::Bool(_) => false,
    }
}

/// Substitute references with values from known states.
///
/// Fails on the first reference whose value is not known yet.
pub fn resolve_references(resource: &Resource, states: &StateMap) -> Result<Resource, ConfigError> {
    let mut resolved = resource.clone();
    for value in resolved.attributes.values_mut() {
        *value = resolve_value(value, states, true).map_err(|reference| {
            ConfigError::UnresolvedReference {
                address: resource.address.clone(),
                reference,
            }
        })?;
    }
    Ok(resolved)
}

/// Substitute the references whose values are known, leaving the others in place
pub fn resolve_known(resource: &Resource, states: &StateMap) -> Resource {
    let mut resolved = resource.clone();
    for value in resolved.attributes.values_mut() {
        if let Ok(v) = resolve_value(value, states, false) {
            *value = v;
        }
    }
    resolved
}

fn lookup(states: &StateMap, caps: &regex::Captures<'_>) -> Option<Value> {
    let state = states.get(&ResourceAddress::new(&caps[1], &caps[2]))?;
    if !state.exists {
        return None;
    }
    match state.attributes.get(&caps[3]) {
        Some(value) => Some(value.clone()),
        None => state.flat_attribute(&caps[3]).map(Value::String),
    }
}

/// Err carries the first unknown reference when `strict`
fn resolve_value(value: &Value, states: &StateMap, strict: bool) -> Result<Value, String> {
    match value {
        Value::String(s) => {
            // A string that is exactly one reference takes the referenced value's type
            if let Some(caps) = REFERENCE.captures(s)
                && caps.get(0).is_some_and(|m| m.as_str() == s.as_str())
            {
                return match lookup(states, &caps) {
                    Some(v) => Ok(v),
                    None if strict => Err(s.clone()),
                    None => Ok(value.clone()),
                };
            }

            let mut unknown = None;
            let replaced = REFERENCE.replace_all(s, |caps: &regex::Captures<'_>| {
                match lookup(states, caps) {
                    Some(v) => v.render(),
                    None => {
                        unknown.get_or_insert_with(|| caps[0].to_string());
                        caps[0].to_string()
                    }
                }
            });
            match unknown {
                Some(reference) if strict => Err(reference),
                _ => Ok(Value::String(replaced.into_owned())),
            }
        }
        Value::List(items) => items
            .iter()
            .map(|item| resolve_value(item, states, strict))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| resolve_value(v, states, strict).map(|v| (k.clone(), v)))
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Value::Map),
        Value::Int(_) | Value::Bool(_) => Ok(value.clone()),
    }
}
