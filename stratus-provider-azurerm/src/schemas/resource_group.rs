//! Resource group schema definition

use stratus_core::schema::{AttributeType, ResourceSchema};

pub fn resource_group_schema() -> ResourceSchema {
    ResourceSchema::new("azurerm_resource_group")
        .with_description("A container that holds related resources for an Azure solution")
        .attribute(super::name(AttributeType::String))
        .attribute(super::location())
        .attribute(super::tags())
}
