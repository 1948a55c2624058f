//! AzureRM Provider implementation
//!
//! Dispatches each operation to the handler of the resource type and keeps
//! the state bookkeeping (identifiers, user-only attributes) out of the
//! handlers.

use log::debug;
use stratus_core::provider::{ErrorKind, ProviderError, ProviderResult};
use stratus_core::resource::{Resource, ResourceAddress, State};

use crate::client::{ArmClient, InMemoryArm, Timeouts};
use crate::config::{ConfigError, ProviderConfig};
use crate::resource_id::AzureResourceId;
use crate::resources::{ResourceHandler, handler};

/// AzureRM Provider
pub struct AzureRmProvider {
    client: ArmClient,
}

impl AzureRmProvider {
    pub fn new(client: ArmClient) -> Self {
        Self { client }
    }

    /// Provider talking to the management endpoint described by `config`
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.http_client()?))
    }

    /// Provider backed by an in-memory management plane
    pub fn in_memory(arm: &InMemoryArm, timeouts: Timeouts) -> Self {
        Self::new(ArmClient::in_memory(arm, timeouts))
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    fn handler(&self, address: &ResourceAddress) -> ProviderResult<&'static dyn ResourceHandler> {
        handler(&address.resource_type).ok_or_else(|| {
            ProviderError::new(
                ErrorKind::UnknownResourceType,
                format!("Unknown resource type: {}", address.resource_type),
            )
            .for_resource(address.clone())
        })
    }

    fn parse_id(address: &ResourceAddress, identifier: &str) -> ProviderResult<AzureResourceId> {
        identifier.parse().map_err(|e| {
            ProviderError::invalid_identifier(format!("Cannot parse ID {:?}", identifier))
                .with_cause(e)
                .for_resource(address.clone())
        })
    }

    pub async fn read_resource(&self, current: &State) -> ProviderResult<State> {
        let address = &current.address;
        let handler = self.handler(address)?;
        let Some(identifier) = &current.identifier else {
            return Ok(State::not_found(address.clone()));
        };
        let id = Self::parse_id(address, identifier)?;

        match handler
            .read(&self.client, &id)
            .await
            .map_err(|e| e.for_resource(address.clone()))?
        {
            None => {
                debug!("{} ({}) no longer exists", address, identifier);
                Ok(State::not_found(address.clone()))
            }
            Some(patch) => {
                let mut attributes = current.attributes.clone();
                patch.apply(&mut attributes);
                Ok(State::existing(address.clone(), attributes).with_identifier(identifier.clone()))
            }
        }
    }

    pub async fn create_or_update_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let address = &resource.address;
        let handler = self.handler(address)?;

        let schema = handler.schema();
        let mut resource = resource.clone();
        schema.apply_defaults(&mut resource.attributes);
        if let Err(errors) = schema.validate(&resource.attributes) {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(
                ProviderError::invalid_config(messages.join("; ")).for_resource(address.clone()),
            );
        }

        let identifier = handler
            .create_or_update(&self.client, &resource)
            .await
            .map_err(|e| e.for_resource(address.clone()))?;
        let id = Self::parse_id(address, &identifier)?;

        let patch = handler
            .read(&self.client, &id)
            .await
            .map_err(|e| e.for_resource(address.clone()))?
            .ok_or_else(|| {
                ProviderError::invariant(format!(
                    "{} disappeared right after it was created",
                    identifier
                ))
                .for_resource(address.clone())
            })?;

        let mut attributes = resource.attributes;
        patch.apply(&mut attributes);
        Ok(State::existing(address.clone(), attributes).with_identifier(identifier))
    }

    pub async fn delete_resource(&self, current: &State) -> ProviderResult<()> {
        let address = &current.address;
        let handler = self.handler(address)?;
        let identifier = current.identifier.as_deref().ok_or_else(|| {
            ProviderError::new(
                ErrorKind::MissingIdentifier,
                "Cannot delete a resource without an ID",
            )
            .for_resource(address.clone())
        })?;
        let id = Self::parse_id(address, identifier)?;

        handler
            .delete(&self.client, &id)
            .await
            .map_err(|e| e.for_resource(address.clone()))
    }
}
