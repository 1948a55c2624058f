//! App Service schema definition

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Returns the schema for App Services (web apps)
pub fn app_service_schema() -> ResourceSchema {
    ResourceSchema::new("azurerm_app_service")
        .with_description("A web app hosted on an App Service plan")
        .attribute(super::name(AttributeType::String))
        .attribute(super::resource_group_name())
        .attribute(super::location())
        .attribute(
            AttributeSchema::new("skip_dns_registration", AttributeType::Bool)
                .with_default(Value::Bool(true))
                .with_description("Do not register the default hostname in DNS"),
        )
        .attribute(
            AttributeSchema::new("skip_custom_domain_verification", AttributeType::Bool)
                .with_default(Value::Bool(true))
                .with_description("Skip verification of custom (non *.azurewebsites.net) domains"),
        )
        .attribute(
            AttributeSchema::new("force_dns_registration", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("Register the hostname in DNS even if it is already registered"),
        )
        .attribute(
            AttributeSchema::new("ttl_in_seconds", AttributeType::String)
                .with_default(Value::String(String::new()))
                .with_description("Time to live in seconds for the default domain name"),
        )
        .attribute(
            AttributeSchema::new("app_service_plan_id", AttributeType::String)
                .computed()
                .with_description("ID of the App Service plan (server farm) hosting the app"),
        )
        .attribute(
            AttributeSchema::new("always_on", AttributeType::Bool)
                .computed()
                .with_description("Keep the app loaded even when idle"),
        )
        .attribute(
            AttributeSchema::new("default_site_hostname", AttributeType::String).computed_only(),
        )
        .attribute(super::tags())
}
