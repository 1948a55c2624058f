//! State file structures for persisting infrastructure state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratus_core::resource::{ResourceAddress, State, StateMap, Value};

use crate::backend::{BackendError, BackendResult};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    /// Identifies one history of this state; writes across lineages are refused
    pub lineage: String,
    /// Version of Stratus that last modified this state
    pub stratus_version: String,
    /// Managed resources in address order
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            stratus_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update the Stratus version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.stratus_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, address: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.address() == *address)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.address() == resource.address())
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, address: &ResourceAddress) -> Option<ResourceState> {
        let pos = self.resources.iter().position(|r| r.address() == *address)?;
        Some(self.resources.remove(pos))
    }

    /// States the engine works with
    pub fn to_state_map(&self) -> BackendResult<StateMap> {
        self.resources
            .iter()
            .map(|r| {
                let state = r.to_state()?;
                Ok((state.address.clone(), state))
            })
            .collect()
    }

    /// Replace the resources with the existing states of `states`
    pub fn replace_resources(&mut self, states: &StateMap) {
        self.resources = states
            .values()
            .filter(|s| s.exists)
            .map(ResourceState::from_state)
            .collect();
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "azurerm_managed_disk")
    pub resource_type: String,
    /// Label of the resource block
    pub label: String,
    /// Remote identifier (ARM resource ID)
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            label: label.into(),
            identifier: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(self.resource_type.clone(), self.label.clone())
    }

    pub fn from_state(state: &State) -> Self {
        Self {
            resource_type: state.address.resource_type.clone(),
            label: state.address.label.clone(),
            identifier: state.identifier.clone(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        }
    }

    /// Persisted resources always exist; `null` attributes are dropped
    pub fn to_state(&self) -> BackendResult<State> {
        if self.identifier.as_deref().is_none_or(str::is_empty) {
            return Err(BackendError::InvalidState(format!(
                "{} has no identifier",
                self.address()
            )));
        }
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect();

        let mut state = State::existing(self.address(), attributes);
        state.identifier = self.identifier.clone();
        Ok(state)
    }
}
