//! azurerm_managed_disk

use async_trait::async_trait;
use log::{debug, info};
use stratus_core::provider::{ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{AttributePatch, Resource, Value};
use stratus_core::schema::ResourceSchema;

use super::{ResourceHandler, api_error, deleted, found, path_name, read_back_id};
use crate::client::ArmClient;
use crate::models::{CreationData, Disk, DiskProperties, DiskSku, Tags};
use crate::resource_id::AzureResourceId;
use crate::schemas::managed_disk::managed_disk_schema;
use crate::utils::{flatten_tags, normalize_location};

pub struct ManagedDisk;

impl ResourceType for ManagedDisk {
    fn name(&self) -> &'static str {
        "azurerm_managed_disk"
    }

    fn schema(&self) -> ResourceSchema {
        managed_disk_schema()
    }
}

/// Typed arguments of a managed disk
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedDiskArgs {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub storage_account_type: String,
    pub create_option: String,
    pub source_uri: Option<String>,
    pub source_resource_id: Option<String>,
    pub os_type: Option<String>,
    pub disk_size_gb: Option<i64>,
    pub tags: Tags,
}

impl ManagedDiskArgs {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        let args = Self {
            name: resource.required_str("name")?,
            resource_group: resource.required_str("resource_group_name")?,
            location: resource.required_str("location")?,
            storage_account_type: resource.required_str("storage_account_type")?,
            create_option: resource.required_str("create_option")?,
            source_uri: resource.optional_str("source_uri")?,
            source_resource_id: resource.optional_str("source_resource_id")?,
            os_type: resource.optional_str("os_type")?,
            disk_size_gb: resource.optional_int("disk_size_gb")?,
            tags: resource.string_map("tags")?,
        };

        let missing = match args.create_option.as_str() {
            "Import" if args.source_uri.is_none() => Some("source_uri"),
            "Copy" if args.source_resource_id.is_none() => Some("source_resource_id"),
            "Empty" if args.disk_size_gb.is_none() => Some("disk_size_gb"),
            _ => None,
        };
        if let Some(missing) = missing {
            return Err(ProviderError::invalid_config(format!(
                "`{}` must be specified when `create_option` is set to `{}`",
                missing, args.create_option
            ))
            .for_resource(resource.address.clone()));
        }
        Ok(args)
    }

    pub fn to_disk(&self) -> Disk {
        Disk {
            location: self.location.clone(),
            tags: Some(self.tags.clone()),
            sku: Some(DiskSku {
                name: self.storage_account_type.clone(),
            }),
            properties: DiskProperties {
                creation_data: Some(CreationData {
                    create_option: self.create_option.clone(),
                    source_uri: self.source_uri.clone(),
                    source_resource_id: self.source_resource_id.clone(),
                }),
                disk_size_gb: self.disk_size_gb,
                os_type: self.os_type.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceHandler for ManagedDisk {
    async fn create_or_update(
        &self,
        client: &ArmClient,
        resource: &Resource,
    ) -> ProviderResult<String> {
        info!("preparing arguments for Azure ARM Managed Disk creation.");
        let args = ManagedDiskArgs::from_resource(resource)?;
        let what = format!(
            "Managed Disk {} (resource group {})",
            args.name, args.resource_group
        );

        let options = client.timeouts.create();
        client
            .call(
                options,
                client.disks.create_or_update(
                    &args.resource_group,
                    &args.name,
                    &args.to_disk(),
                    &options,
                ),
            )
            .await
            .map_err(|e| api_error(e, format!("Error creating {}", what)))?;

        let read = client
            .call(
                client.timeouts.read(),
                client.disks.get(&args.resource_group, &args.name),
            )
            .await;
        read_back_id(read.map(|disk| disk.id), &what)
    }

    async fn read(
        &self,
        client: &ArmClient,
        id: &AzureResourceId,
    ) -> ProviderResult<Option<AttributePatch>> {
        let name = path_name(id, "disks")?;
        let resource_group = &id.resource_group;
        debug!("Reading Managed Disk {} (resource group {})", name, resource_group);

        let result = client
            .call(client.timeouts.read(), client.disks.get(resource_group, name))
            .await;
        let Some(disk) = found(
            result,
            &format!("Managed Disk {} (resource group {})", name, resource_group),
        )? else {
            return Ok(None);
        };

        let creation = disk.properties.creation_data.unwrap_or_default();
        let mut patch = AttributePatch::new();
        patch
            .set_str("name", disk.name.as_deref().unwrap_or(name))
            .set_str("resource_group_name", resource_group.as_str())
            .set_str("location", normalize_location(&disk.location))
            .set_optional(
                "storage_account_type",
                disk.sku.map(|sku| Value::String(sku.name)),
            )
            .set_str("create_option", creation.create_option)
            .set_optional("source_uri", creation.source_uri.map(Value::String))
            .set_optional(
                "source_resource_id",
                creation.source_resource_id.map(Value::String),
            )
            .set_optional("os_type", disk.properties.os_type.map(Value::String))
            .set_optional("disk_size_gb", disk.properties.disk_size_gb.map(Value::Int))
            .set("tags", flatten_tags(disk.tags.as_ref()));
        Ok(Some(patch))
    }

    async fn delete(&self, client: &ArmClient, id: &AzureResourceId) -> ProviderResult<()> {
        let name = path_name(id, "disks")?;
        let resource_group = &id.resource_group;
        debug!("Deleting Managed Disk {}: {}", resource_group, name);

        let options = client.timeouts.delete();
        let result = client
            .call(options, client.disks.delete(resource_group, name, &options))
            .await;
        deleted(
            result,
            &format!("Managed Disk {} (resource group {})", name, resource_group),
        )
    }
}
