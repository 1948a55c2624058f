//! Resource handlers
//!
//! One handler per ARM resource type. A handler reads typed arguments from the
//! declared resource, issues the remote call through the [`ArmClient`] it is
//! handed, and reports back only the attributes ARM is authoritative for.

mod app_service;
mod managed_disk;
mod resource_group;
mod sql_server;

pub use app_service::{AppService, AppServiceArgs};
pub use managed_disk::{ManagedDisk, ManagedDiskArgs};
pub use resource_group::{ResourceGroup, ResourceGroupArgs};
pub use sql_server::{SqlServer, SqlServerArgs};

use async_trait::async_trait;
use log::debug;
use stratus_core::provider::{ErrorKind, ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{AttributePatch, Resource};

use crate::client::{ApiError, ApiResult, ArmClient};
use crate::resource_id::AzureResourceId;

/// CRUD operations of one resource type
#[async_trait]
pub trait ResourceHandler: ResourceType {
    /// Create or update the remote object and return its ARM ID
    async fn create_or_update(&self, client: &ArmClient, resource: &Resource)
    -> ProviderResult<String>;

    /// Attributes ARM controls, or `None` when the object no longer exists
    async fn read(
        &self,
        client: &ArmClient,
        id: &AzureResourceId,
    ) -> ProviderResult<Option<AttributePatch>>;

    async fn delete(&self, client: &ArmClient, id: &AzureResourceId) -> ProviderResult<()>;
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ResourceGroup),
        Box::new(AppService),
        Box::new(ManagedDisk),
        Box::new(SqlServer),
    ]
}

/// Handler for a resource type name
pub fn handler(resource_type: &str) -> Option<&'static dyn ResourceHandler> {
    match resource_type {
        "azurerm_resource_group" => Some(&ResourceGroup),
        "azurerm_app_service" => Some(&AppService),
        "azurerm_managed_disk" => Some(&ManagedDisk),
        "azurerm_sql_server" => Some(&SqlServer),
        _ => None,
    }
}

/// Wrap a client error, keeping timeouts distinguishable
pub(crate) fn api_error(error: ApiError, message: impl Into<String>) -> ProviderError {
    let kind = match error {
        ApiError::Timeout(_) => ErrorKind::Timeout,
        _ => ErrorKind::Api,
    };
    ProviderError::new(kind, message).with_cause(error)
}

/// Name segment of an identifier, e.g. the site name after `sites`
pub(crate) fn path_name<'a>(id: &'a AzureResourceId, segment: &str) -> ProviderResult<&'a str> {
    id.path_value(segment).ok_or_else(|| {
        ProviderError::invalid_identifier(format!(
            "ID {} was missing the `{}` component",
            id, segment
        ))
    })
}

/// Turn the read issued right after a create into the new object's ID
pub(crate) fn read_back_id(
    result: ApiResult<Option<String>>,
    what: &str,
) -> ProviderResult<String> {
    match result {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(ProviderError::new(
            ErrorKind::MissingIdentifier,
            format!("Cannot read {} ID", what),
        )),
        Err(e) if e.is_not_found() => Err(ProviderError::invariant(format!(
            "{} disappeared right after it was created",
            what
        ))
        .with_cause(e)),
        Err(e) => Err(api_error(e, format!("Error reading {} after creation", what))),
    }
}

/// Not found is the absence signal, not an error
pub(crate) fn found<T>(result: ApiResult<T>, what: &str) -> ProviderResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            debug!("{} was not found", what);
            Ok(None)
        }
        Err(e) => Err(api_error(
            e,
            format!("Error making Read request on AzureRM {}", what),
        )),
    }
}

/// A delete of an object that is already gone succeeds
pub(crate) fn deleted(result: ApiResult<()>, what: &str) -> ProviderResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!("{} was already deleted", what);
            Ok(())
        }
        Err(e) => Err(api_error(e, format!("Error deleting {}", what))),
    }
}
