//! azurerm_sql_server

use async_trait::async_trait;
use log::{debug, info};
use stratus_core::provider::{ProviderResult, ResourceType};
use stratus_core::resource::{AttributePatch, Resource, Value};
use stratus_core::schema::ResourceSchema;

use super::{ResourceHandler, api_error, deleted, found, path_name, read_back_id};
use crate::client::ArmClient;
use crate::models::{self, SqlServerProperties, Tags};
use crate::resource_id::AzureResourceId;
use crate::schemas::sql_server::sql_server_schema;
use crate::utils::{flatten_tags, normalize_location};

pub struct SqlServer;

impl ResourceType for SqlServer {
    fn name(&self) -> &'static str {
        "azurerm_sql_server"
    }

    fn schema(&self) -> ResourceSchema {
        sql_server_schema()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlServerArgs {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub version: String,
    pub administrator_login: String,
    pub administrator_login_password: String,
    pub tags: Tags,
}

impl SqlServerArgs {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        Ok(Self {
            name: resource.required_str("name")?,
            resource_group: resource.required_str("resource_group_name")?,
            location: resource.required_str("location")?,
            version: resource.required_str("version")?,
            administrator_login: resource.required_str("administrator_login")?,
            administrator_login_password: resource.required_str("administrator_login_password")?,
            tags: resource.string_map("tags")?,
        })
    }

    pub fn to_server(&self) -> models::SqlServer {
        models::SqlServer {
            location: self.location.clone(),
            tags: Some(self.tags.clone()),
            properties: SqlServerProperties {
                version: Some(self.version.clone()),
                administrator_login: Some(self.administrator_login.clone()),
                administrator_login_password: Some(self.administrator_login_password.clone()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceHandler for SqlServer {
    async fn create_or_update(
        &self,
        client: &ArmClient,
        resource: &Resource,
    ) -> ProviderResult<String> {
        info!("preparing arguments for Azure ARM SQL Server creation.");
        let args = SqlServerArgs::from_resource(resource)?;
        let what = format!(
            "SQL Server {} (resource group {})",
            args.name, args.resource_group
        );

        let options = client.timeouts.create();
        client
            .call(
                options,
                client.sql_servers.create_or_update(
                    &args.resource_group,
                    &args.name,
                    &args.to_server(),
                    &options,
                ),
            )
            .await
            .map_err(|e| api_error(e, format!("Error creating {}", what)))?;

        let read = client
            .call(
                client.timeouts.read(),
                client.sql_servers.get(&args.resource_group, &args.name),
            )
            .await;
        read_back_id(read.map(|server| server.id), &what)
    }

    async fn read(
        &self,
        client: &ArmClient,
        id: &AzureResourceId,
    ) -> ProviderResult<Option<AttributePatch>> {
        let name = path_name(id, "servers")?;
        let resource_group = &id.resource_group;
        debug!("Reading SQL Server {} (resource group {})", name, resource_group);

        let result = client
            .call(
                client.timeouts.read(),
                client.sql_servers.get(resource_group, name),
            )
            .await;
        let Some(server) = found(
            result,
            &format!("SQL Server {} (resource group {})", name, resource_group),
        )? else {
            return Ok(None);
        };

        // administrator_login_password is write-only and stays as declared
        let properties = server.properties;
        let mut patch = AttributePatch::new();
        patch
            .set_str("name", server.name.as_deref().unwrap_or(name))
            .set_str("resource_group_name", resource_group.as_str())
            .set_str("location", normalize_location(&server.location))
            .set_optional("version", properties.version.map(Value::String))
            .set_optional(
                "administrator_login",
                properties.administrator_login.map(Value::String),
            )
            .set_optional(
                "fully_qualified_domain_name",
                properties.fully_qualified_domain_name.map(Value::String),
            )
            .set("tags", flatten_tags(server.tags.as_ref()));
        Ok(Some(patch))
    }

    async fn delete(&self, client: &ArmClient, id: &AzureResourceId) -> ProviderResult<()> {
        let name = path_name(id, "servers")?;
        let resource_group = &id.resource_group;
        debug!("Deleting SQL Server {}: {}", resource_group, name);

        let options = client.timeouts.delete();
        let result = client
            .call(options, client.sql_servers.delete(resource_group, name, &options))
            .await;
        deleted(
            result,
            &format!("SQL Server {} (resource group {})", name, resource_group),
        )
    }
}
