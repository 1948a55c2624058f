//! Managed disk schema definition

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, normalize};

use super::types;

/// Returns the schema for managed disks
pub fn managed_disk_schema() -> ResourceSchema {
    ResourceSchema::new("azurerm_managed_disk")
        .with_description("A block storage volume managed by Azure")
        .attribute(super::name(AttributeType::String))
        .attribute(super::resource_group_name())
        .attribute(super::location())
        .attribute(
            AttributeSchema::new("storage_account_type", types::storage_account_type())
                .required()
                .with_normalizer(normalize::case_insensitive)
                .with_description("Standard_LRS or Premium_LRS, compared without regard to case"),
        )
        .attribute(
            AttributeSchema::new("create_option", types::create_option())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("source_uri", AttributeType::String)
                .force_new()
                .computed()
                .with_description("URI of the VHD blob to import (create_option = Import)"),
        )
        .attribute(
            AttributeSchema::new("source_resource_id", AttributeType::String)
                .force_new()
                .with_description("ID of the managed disk to copy (create_option = Copy)"),
        )
        .attribute(AttributeSchema::new("os_type", types::os_type()))
        .attribute(
            AttributeSchema::new("disk_size_gb", types::disk_size_gb())
                .computed()
                .with_description("Size of the disk; copies default to their source size"),
        )
        .attribute(super::tags())
}
