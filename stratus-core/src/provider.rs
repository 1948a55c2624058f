//! Provider - Trait abstracting resource operations
//!
//! A Provider maps declared resources of the types it owns onto a remote
//! management API. The orchestrating engine (differ + interpreter) calls
//! these operations; the Provider never decides ordering itself.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceAddress, State};
use crate::schema::ResourceSchema;

/// Category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed remote identifier
    InvalidIdentifier,
    /// Declared attributes are missing, mistyped, or fail validation
    InvalidConfig,
    /// The remote API rejected the call
    Api,
    /// A remote call did not finish within its timeout
    Timeout,
    /// The remote object that was asked for does not exist
    NotFound,
    /// The remote API accepted a write but the resource has no ID
    MissingIdentifier,
    /// The remote API answered successfully but broke an expectation
    Invariant,
    /// No handler is registered for the resource type
    UnknownResourceType,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub address: Option<ResourceAddress>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref address) = self.address {
            write!(f, "[{}] {}", address, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            address: None,
            cause: None,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidIdentifier, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invariant, message)
    }

    pub fn for_resource(mut self, address: ResourceAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "azurerm_managed_disk")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// All operations are async and involve side effects. Each call awaits one
/// remote operation at a time and holds no state across calls.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "azurerm")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Schema of a single resource type
    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.resource_types()
            .into_iter()
            .find(|t| t.name() == resource_type)
            .map(|t| t.schema())
    }

    /// Refresh a resource from the remote system.
    ///
    /// Returns `State::not_found()` when the state has no identifier or the
    /// remote object is gone. Attributes only the user controls are carried
    /// over from `current`.
    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create or update a resource and return its refreshed state
    fn create_or_update(
        &self,
        resource: &Resource,
        current: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource. Success needs no confirmation read.
    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>>;

    /// Adopt an existing remote object: the identifier is taken as-is and a
    /// read hydrates every other attribute.
    fn import(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let seed = State::existing(address.clone(), Default::default()).with_identifier(identifier);
        Box::pin(async move {
            let state = self.read(&seed).await?;
            if !state.exists {
                return Err(ProviderError::new(
                    ErrorKind::NotFound,
                    format!(
                        "Cannot import non-existent remote object {}",
                        seed.identifier.as_deref().unwrap_or_default()
                    ),
                )
                .for_resource(seed.address.clone()));
            }
            Ok(state)
        })
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        (**self).schema(resource_type)
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(current)
    }

    fn create_or_update(
        &self,
        resource: &Resource,
        current: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create_or_update(resource, current)
    }

    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(current)
    }

    fn import(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(address, identifier)
    }
}
