//! SQL server schema definition

use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;

pub fn sql_server_schema() -> ResourceSchema {
    ResourceSchema::new("azurerm_sql_server")
        .with_description("An Azure SQL logical server")
        .attribute(super::name(types::sql_server_name()))
        .attribute(super::resource_group_name())
        .attribute(super::location())
        .attribute(
            AttributeSchema::new("version", types::sql_server_version())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("administrator_login", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("administrator_login_password", AttributeType::String)
                .required()
                .sensitive()
                .with_description("Write-only: never returned by reads"),
        )
        .attribute(
            AttributeSchema::new("fully_qualified_domain_name", AttributeType::String)
                .computed_only(),
        )
        .attribute(super::tags())
}
