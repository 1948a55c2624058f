//! azurerm_app_service

use async_trait::async_trait;
use log::{debug, info};
use stratus_core::provider::{ProviderResult, ResourceType};
use stratus_core::resource::{AttributePatch, Resource, Value};
use stratus_core::schema::ResourceSchema;

use super::{ResourceHandler, api_error, deleted, found, path_name, read_back_id};
use crate::client::{ArmClient, SiteCreateFlags};
use crate::models::{Site, SiteConfig, SiteProperties, Tags};
use crate::resource_id::AzureResourceId;
use crate::schemas::app_service::app_service_schema;
use crate::utils::{flatten_tags, normalize_location};

pub struct AppService;

impl ResourceType for AppService {
    fn name(&self) -> &'static str {
        "azurerm_app_service"
    }

    fn schema(&self) -> ResourceSchema {
        app_service_schema()
    }
}

/// Typed arguments of an App Service
#[derive(Debug, Clone, PartialEq)]
pub struct AppServiceArgs {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub app_service_plan_id: Option<String>,
    pub always_on: Option<bool>,
    pub flags: SiteCreateFlags,
    pub tags: Tags,
}

impl AppServiceArgs {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        Ok(Self {
            name: resource.required_str("name")?,
            resource_group: resource.required_str("resource_group_name")?,
            location: resource.required_str("location")?,
            app_service_plan_id: resource.optional_str("app_service_plan_id")?,
            always_on: resource.optional_bool("always_on")?,
            flags: SiteCreateFlags {
                skip_dns_registration: resource.bool_or("skip_dns_registration", true)?,
                skip_custom_domain_verification: resource
                    .bool_or("skip_custom_domain_verification", true)?,
                force_dns_registration: resource.bool_or("force_dns_registration", false)?,
                ttl_in_seconds: resource
                    .optional_str("ttl_in_seconds")?
                    .unwrap_or_default(),
            },
            tags: resource.string_map("tags")?,
        })
    }

    /// Request body. Unset optional arguments are left out entirely.
    pub fn to_site(&self) -> Site {
        Site {
            location: self.location.clone(),
            tags: Some(self.tags.clone()),
            properties: SiteProperties {
                server_farm_id: self.app_service_plan_id.clone(),
                site_config: Some(SiteConfig {
                    always_on: self.always_on,
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceHandler for AppService {
    async fn create_or_update(
        &self,
        client: &ArmClient,
        resource: &Resource,
    ) -> ProviderResult<String> {
        info!("preparing arguments for Azure ARM Web App creation.");
        let args = AppServiceArgs::from_resource(resource)?;
        let what = format!(
            "App Service {} (resource group {})",
            args.name, args.resource_group
        );

        let options = client.timeouts.create();
        client
            .call(
                options,
                client.sites.create_or_update(
                    &args.resource_group,
                    &args.name,
                    &args.to_site(),
                    &args.flags,
                    &options,
                ),
            )
            .await
            .map_err(|e| api_error(e, format!("Error creating {}", what)))?;

        let read = client
            .call(
                client.timeouts.read(),
                client.sites.get(&args.resource_group, &args.name),
            )
            .await;
        read_back_id(read.map(|site| site.id), &what)
    }

    async fn read(
        &self,
        client: &ArmClient,
        id: &AzureResourceId,
    ) -> ProviderResult<Option<AttributePatch>> {
        let name = path_name(id, "sites")?;
        let resource_group = &id.resource_group;
        debug!("Reading App Service {} (resource group {})", name, resource_group);

        let result = client
            .call(client.timeouts.read(), client.sites.get(resource_group, name))
            .await;
        let Some(site) = found(
            result,
            &format!("App Service {} (resource group {})", name, resource_group),
        )? else {
            return Ok(None);
        };

        let mut patch = AttributePatch::new();
        patch
            .set_str("name", site.name.as_deref().unwrap_or(name))
            .set_str("resource_group_name", resource_group.as_str())
            .set_str("location", normalize_location(&site.location))
            .set_optional(
                "app_service_plan_id",
                site.properties.server_farm_id.map(Value::String),
            )
            .set_optional(
                "always_on",
                site.properties
                    .site_config
                    .and_then(|c| c.always_on)
                    .map(Value::Bool),
            )
            .set_optional(
                "default_site_hostname",
                site.properties.default_host_name.map(Value::String),
            )
            .set("tags", flatten_tags(site.tags.as_ref()));
        Ok(Some(patch))
    }

    async fn delete(&self, client: &ArmClient, id: &AzureResourceId) -> ProviderResult<()> {
        let name = path_name(id, "sites")?;
        let resource_group = &id.resource_group;
        debug!("Deleting App Service {}: {}", resource_group, name);

        let options = client.timeouts.delete();
        let result = client
            .call(
                options,
                client
                    .sites
                    .delete(resource_group, name, &client.site_delete_flags, &options),
            )
            .await;
        deleted(
            result,
            &format!("App Service {} (resource group {})", name, resource_group),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource() -> Resource {
        Resource::new("azurerm_app_service", "test")
            .with_attribute("name", Value::String("acctestAS-1".into()))
            .with_attribute("resource_group_name", Value::String("acctestRG-1".into()))
            .with_attribute("location", Value::String("West US".into()))
    }

    #[test]
    fn unset_always_on_is_not_sent() {
        let args = AppServiceArgs::from_resource(&resource()).unwrap();
        assert_eq!(args.always_on, None);
        assert_eq!(args.app_service_plan_id, None);

        let body = serde_json::to_value(args.to_site()).unwrap();
        assert_eq!(
            body,
            json!({"location": "West US", "tags": {}, "properties": {"siteConfig": {}}})
        );
    }

    #[test]
    fn explicit_always_on_is_sent() {
        let args = AppServiceArgs::from_resource(
            &resource().with_attribute("always_on", Value::Bool(false)),
        )
        .unwrap();
        let body = serde_json::to_value(args.to_site()).unwrap();
        assert_eq!(body["properties"]["siteConfig"], json!({"alwaysOn": false}));
    }

    #[test]
    fn flags_use_defaults_when_unset() {
        let args = AppServiceArgs::from_resource(
            &resource().with_attribute("force_dns_registration", Value::Bool(true)),
        )
        .unwrap();
        assert_eq!(
            args.flags,
            SiteCreateFlags {
                skip_dns_registration: true,
                skip_custom_domain_verification: true,
                force_dns_registration: true,
                ttl_in_seconds: String::new(),
            }
        );
    }

    #[test]
    fn missing_resource_group_is_a_config_error() {
        let mut resource = resource();
        resource.attributes.remove("resource_group_name");
        let err = AppServiceArgs::from_resource(&resource).unwrap_err();
        assert_eq!(err.kind, stratus_core::provider::ErrorKind::InvalidConfig);
    }
}
