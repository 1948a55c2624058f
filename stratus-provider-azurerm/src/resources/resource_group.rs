//! azurerm_resource_group

use async_trait::async_trait;
use log::{debug, info};
use stratus_core::provider::{ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{AttributePatch, Resource};
use stratus_core::schema::ResourceSchema;

use super::{ResourceHandler, api_error, deleted, found, read_back_id};
use crate::client::ArmClient;
use crate::models::{self, Tags};
use crate::resource_id::AzureResourceId;
use crate::schemas::resource_group::resource_group_schema;
use crate::utils::{flatten_tags, normalize_location};

pub struct ResourceGroup;

impl ResourceType for ResourceGroup {
    fn name(&self) -> &'static str {
        "azurerm_resource_group"
    }

    fn schema(&self) -> ResourceSchema {
        resource_group_schema()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGroupArgs {
    pub name: String,
    pub location: String,
    pub tags: Tags,
}

impl ResourceGroupArgs {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        Ok(Self {
            name: resource.required_str("name")?,
            location: resource.required_str("location")?,
            tags: resource.string_map("tags")?,
        })
    }

    pub fn to_group(&self) -> models::ResourceGroup {
        models::ResourceGroup {
            location: self.location.clone(),
            tags: Some(self.tags.clone()),
            ..Default::default()
        }
    }
}

/// Resource group identifiers end at the group
fn group_name(id: &AzureResourceId) -> ProviderResult<&str> {
    if id.provider.is_some() || !id.path.is_empty() {
        return Err(ProviderError::invalid_identifier(format!(
            "ID {} is not a resource group ID",
            id
        )));
    }
    Ok(&id.resource_group)
}

#[async_trait]
impl ResourceHandler for ResourceGroup {
    async fn create_or_update(
        &self,
        client: &ArmClient,
        resource: &Resource,
    ) -> ProviderResult<String> {
        info!("preparing arguments for Azure ARM Resource Group creation.");
        let args = ResourceGroupArgs::from_resource(resource)?;
        let what = format!("Resource Group {}", args.name);

        let options = client.timeouts.create();
        client
            .call(
                options,
                client
                    .resource_groups
                    .create_or_update(&args.name, &args.to_group(), &options),
            )
            .await
            .map_err(|e| api_error(e, format!("Error creating {}", what)))?;

        let read = client
            .call(client.timeouts.read(), client.resource_groups.get(&args.name))
            .await;
        read_back_id(read.map(|group| group.id), &what)
    }

    async fn read(
        &self,
        client: &ArmClient,
        id: &AzureResourceId,
    ) -> ProviderResult<Option<AttributePatch>> {
        let name = group_name(id)?;
        debug!("Reading Resource Group {}", name);

        let result = client
            .call(client.timeouts.read(), client.resource_groups.get(name))
            .await;
        let Some(group) = found(result, &format!("Resource Group {}", name))? else {
            return Ok(None);
        };

        let mut patch = AttributePatch::new();
        patch
            .set_str("name", group.name.as_deref().unwrap_or(name))
            .set_str("location", normalize_location(&group.location))
            .set("tags", flatten_tags(group.tags.as_ref()));
        Ok(Some(patch))
    }

    async fn delete(&self, client: &ArmClient, id: &AzureResourceId) -> ProviderResult<()> {
        let name = group_name(id)?;
        debug!("Deleting Resource Group {}", name);

        let options = client.timeouts.delete();
        let result = client
            .call(options, client.resource_groups.delete(name, &options))
            .await;
        deleted(result, &format!("Resource Group {}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_group_ids_are_accepted() {
        let group = AzureResourceId::resource_group("0000", "acctestRG");
        assert_eq!(group_name(&group).unwrap(), "acctestRG");

        let disk = AzureResourceId::new("0000", "acctestRG", "Microsoft.Compute", "disks", "d");
        assert!(group_name(&disk).is_err());
    }
}
