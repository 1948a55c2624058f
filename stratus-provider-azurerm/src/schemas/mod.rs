//! AzureRM resource schema definitions

pub mod app_service;
pub mod managed_disk;
pub mod resource_group;
pub mod sql_server;
pub mod types;

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::utils::location_normalizer;

/// Returns all AzureRM schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    vec![
        resource_group::resource_group_schema(),
        app_service::app_service_schema(),
        managed_disk::managed_disk_schema(),
        sql_server::sql_server_schema(),
    ]
}

pub(crate) fn name(attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new("name", attr_type)
        .required()
        .force_new()
        .with_description("Name of the resource, unique within its resource group")
}

pub(crate) fn resource_group_name() -> AttributeSchema {
    AttributeSchema::new("resource_group_name", AttributeType::String)
        .required()
        .force_new()
        .with_description("Resource group the resource lives in")
}

pub(crate) fn location() -> AttributeSchema {
    AttributeSchema::new("location", types::location())
        .required()
        .force_new()
        .with_normalizer(location_normalizer)
        .with_description("Azure location, e.g. \"West US\" or \"westus\"")
}

pub(crate) fn tags() -> AttributeSchema {
    AttributeSchema::new("tags", types::tags())
}
