//! Stratus AzureRM Provider
//!
//! Azure Resource Manager Provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - ARM API traits, the HTTP client and the in-memory management plane
//! - `config` - Provider block settings
//! - `models` - ARM request and response bodies
//! - `provider` - AzureRmProvider implementation
//! - `resource_id` - ARM identifier codec
//! - `resources` - Per resource type handlers
//! - `schemas` - Resource schemas
//! - `utils` - Helper functions for value normalization

pub mod client;
pub mod config;
pub mod models;
pub mod provider;
pub mod resource_id;
pub mod resources;
pub mod schemas;
pub mod utils;

// Re-export main types
pub use client::{ArmClient, CallOptions, InMemoryArm, Timeouts};
pub use config::ProviderConfig;
pub use provider::AzureRmProvider;
pub use resource_id::AzureResourceId;

use stratus_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use stratus_core::resource::{Resource, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzureRmProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let current = current.clone();
        Box::pin(async move { self.read_resource(&current).await })
    }

    fn create_or_update(
        &self,
        resource: &Resource,
        _current: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_or_update_resource(&resource).await })
    }

    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
        let current = current.clone();
        Box::pin(async move { self.delete_resource(&current).await })
    }
}
