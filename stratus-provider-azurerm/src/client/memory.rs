//! In-memory ARM management plane
//!
//! Behaves like the service for the operations handlers use: assigns IDs,
//! fills in server-computed fields, cascades resource group deletion, and
//! rejects requests the service would reject. Requests are recorded, and
//! failures and latency can be injected.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{
    ApiError, ApiResult, CallOptions, DisksApi, ResourceGroupsApi, SiteCreateFlags,
    SiteDeleteFlags, SitesApi, SqlServersApi,
};
use crate::models::{Disk, ResourceGroup, ResourceGroupProperties, Site, SqlServer};
use crate::resource_id::AzureResourceId;

/// HTTP method of a recorded request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

/// A request as the service would have received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// Resource family, named after the ARM type segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    ResourceGroups,
    Sites,
    Disks,
    SqlServers,
}

type Key = (String, String);

fn key(resource_group: &str, name: &str) -> Key {
    (resource_group.to_lowercase(), name.to_lowercase())
}

#[derive(Default)]
struct Inner {
    groups: HashMap<String, ResourceGroup>,
    sites: HashMap<Key, Site>,
    disks: HashMap<Key, Disk>,
    sql_servers: HashMap<Key, SqlServer>,
    requests: Vec<RecordedRequest>,
    failures: HashMap<(Method, Family), VecDeque<ApiError>>,
    latency: Duration,
}

/// Shared in-memory stand-in for the management API
#[derive(Clone)]
pub struct InMemoryArm {
    subscription_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryArm {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `method` call on `family` with `error`
    pub fn fail_next(&self, method: Method, family: Family, error: ApiError) {
        self.lock()
            .failures
            .entry((method, family))
            .or_default()
            .push_back(error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Delete a resource behind the provider's back. Returns whether it existed.
    pub fn remove_out_of_band(&self, id: &str) -> bool {
        let Ok(id) = id.parse::<AzureResourceId>() else {
            return false;
        };
        let mut inner = self.lock();
        match id.path.first() {
            None => {
                let existed = inner.groups.contains_key(&id.resource_group.to_lowercase());
                if existed {
                    cascade_delete(&mut inner, &id.resource_group);
                }
                existed
            }
            Some((kind, name)) => {
                let k = key(&id.resource_group, name);
                match kind.to_lowercase().as_str() {
                    "sites" => inner.sites.remove(&k).is_some(),
                    "disks" => inner.disks.remove(&k).is_some(),
                    "servers" => inner.sql_servers.remove(&k).is_some(),
                    _ => false,
                }
            }
        }
    }

    /// Number of remote objects of every kind
    pub fn resource_count(&self) -> usize {
        let inner = self.lock();
        inner.groups.len() + inner.sites.len() + inner.disks.len() + inner.sql_servers.len()
    }

    /// Record a request, then apply latency and injected failures
    async fn begin<B: Serialize>(
        &self,
        method: Method,
        family: Family,
        path: String,
        query: Vec<(&'static str, String)>,
        body: Option<&B>,
    ) -> ApiResult<()> {
        let latency = {
            let mut inner = self.lock();
            inner.requests.push(RecordedRequest {
                method,
                path,
                query: query
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                body: body.and_then(|b| serde_json::to_value(b).ok()),
            });
            inner.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .lock()
            .failures
            .get_mut(&(method, family))
            .and_then(VecDeque::pop_front);
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn group_path(&self, name: &str) -> String {
        AzureResourceId::resource_group(&self.subscription_id, name).to_string()
    }

    fn resource_id(
        &self,
        resource_group: &str,
        provider: &str,
        kind: &str,
        name: &str,
    ) -> String {
        AzureResourceId::new(&self.subscription_id, resource_group, provider, kind, name)
            .to_string()
    }

    /// Resource group name as stored, or the error the service returns
    fn require_group(inner: &Inner, resource_group: &str) -> ApiResult<String> {
        inner
            .groups
            .get(&resource_group.to_lowercase())
            .and_then(|g| g.name.clone())
            .ok_or_else(|| ApiError::Status {
                status: 404,
                code: "ResourceGroupNotFound".to_string(),
                message: format!("Resource group '{}' could not be found.", resource_group),
            })
    }
}

fn cascade_delete(inner: &mut Inner, resource_group: &str) {
    let group = resource_group.to_lowercase();
    inner.groups.remove(&group);
    inner.sites.retain(|(rg, _), _| *rg != group);
    inner.disks.retain(|(rg, _), _| *rg != group);
    inner.sql_servers.retain(|(rg, _), _| *rg != group);
}

fn bad_request(code: &str, message: impl Into<String>) -> ApiError {
    ApiError::Status {
        status: 400,
        code: code.to_string(),
        message: message.into(),
    }
}

fn no_body() -> Option<&'static ()> {
    None
}

#[async_trait]
impl ResourceGroupsApi for InMemoryArm {
    async fn get(&self, name: &str) -> ApiResult<ResourceGroup> {
        self.begin(Method::Get, Family::ResourceGroups, self.group_path(name), vec![], no_body())
            .await?;
        self.lock()
            .groups
            .get(&name.to_lowercase())
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_or_update(
        &self,
        name: &str,
        group: &ResourceGroup,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        self.begin(
            Method::Put,
            Family::ResourceGroups,
            self.group_path(name),
            vec![],
            Some(group),
        )
        .await?;

        let mut inner = self.lock();
        let existing = inner.groups.get(&name.to_lowercase()).cloned();
        if let Some(existing) = &existing
            && !existing.location.eq_ignore_ascii_case(&group.location)
        {
            return Err(bad_request(
                "InvalidResourceGroupLocation",
                format!(
                    "Invalid resource group location '{}'. The Resource group already exists in location '{}'.",
                    group.location, existing.location
                ),
            ));
        }

        let stored_name = existing
            .and_then(|g| g.name)
            .unwrap_or_else(|| name.to_string());
        let mut stored = group.clone();
        stored.id = Some(self.group_path(&stored_name));
        stored.name = Some(stored_name);
        stored.properties = Some(ResourceGroupProperties {
            provisioning_state: Some("Succeeded".to_string()),
        });
        inner.groups.insert(name.to_lowercase(), stored);
        Ok(())
    }

    async fn delete(&self, name: &str, _options: &CallOptions) -> ApiResult<()> {
        self.begin(
            Method::Delete,
            Family::ResourceGroups,
            self.group_path(name),
            vec![],
            no_body(),
        )
        .await?;

        let mut inner = self.lock();
        if !inner.groups.contains_key(&name.to_lowercase()) {
            return Err(ApiError::NotFound);
        }
        cascade_delete(&mut inner, name);
        Ok(())
    }
}

#[async_trait]
impl SitesApi for InMemoryArm {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Site> {
        let path = self.resource_id(resource_group, "Microsoft.Web", "sites", name);
        self.begin(Method::Get, Family::Sites, path, vec![], no_body())
            .await?;
        self.lock()
            .sites
            .get(&key(resource_group, name))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        site: &Site,
        flags: &SiteCreateFlags,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Web", "sites", name);
        self.begin(Method::Put, Family::Sites, path, flags.query(), Some(site))
            .await?;

        let mut inner = self.lock();
        let group = Self::require_group(&inner, resource_group)?;
        if let Some(plan) = &site.properties.server_farm_id
            && plan.parse::<AzureResourceId>().is_err()
        {
            return Err(bad_request(
                "LinkedInvalidPropertyId",
                format!("Property id '{}' is invalid.", plan),
            ));
        }

        let mut stored = site.clone();
        stored.id = Some(self.resource_id(&group, "Microsoft.Web", "sites", name));
        stored.name = Some(name.to_string());
        stored.properties.default_host_name =
            Some(format!("{}.azurewebsites.net", name.to_lowercase()));
        inner.sites.insert(key(resource_group, name), stored);
        Ok(())
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        flags: &SiteDeleteFlags,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Web", "sites", name);
        self.begin(Method::Delete, Family::Sites, path, flags.query(), no_body())
            .await?;
        self.lock()
            .sites
            .remove(&key(resource_group, name))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl DisksApi for InMemoryArm {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Disk> {
        let path = self.resource_id(resource_group, "Microsoft.Compute", "disks", name);
        self.begin(Method::Get, Family::Disks, path, vec![], no_body())
            .await?;
        self.lock()
            .disks
            .get(&key(resource_group, name))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Compute", "disks", name);
        self.begin(Method::Put, Family::Disks, path, vec![], Some(disk))
            .await?;

        let mut inner = self.lock();
        let group = Self::require_group(&inner, resource_group)?;
        let creation = disk
            .properties
            .creation_data
            .clone()
            .ok_or_else(|| bad_request("InvalidParameter", "creationData is required."))?;

        let mut size = disk.properties.disk_size_gb;
        match creation.create_option.as_str() {
            "Empty" if size.is_none() => {
                return Err(bad_request(
                    "InvalidParameter",
                    "diskSizeGB is required when createOption is Empty.",
                ));
            }
            "Empty" => {}
            "Import" if creation.source_uri.is_none() => {
                return Err(bad_request(
                    "InvalidParameter",
                    "sourceUri is required when createOption is Import.",
                ));
            }
            "Import" => {}
            "Copy" => {
                let source = creation
                    .source_resource_id
                    .as_deref()
                    .and_then(|id| id.parse::<AzureResourceId>().ok())
                    .and_then(|id| {
                        let name = id.path_value("disks")?.to_string();
                        inner.disks.get(&key(&id.resource_group, &name)).cloned()
                    })
                    .ok_or_else(|| ApiError::Status {
                        status: 404,
                        code: "NotFound".to_string(),
                        message: "Source disk of the copy could not be found.".to_string(),
                    })?;
                if size.is_none() {
                    size = source.properties.disk_size_gb;
                }
            }
            other => {
                return Err(bad_request(
                    "InvalidParameter",
                    format!("createOption '{}' is not supported.", other),
                ));
            }
        }

        if let Some(existing) = inner.disks.get(&key(resource_group, name))
            && let (Some(old), Some(new)) = (existing.properties.disk_size_gb, size)
            && new < old
        {
            return Err(bad_request(
                "BadRequest",
                format!("Disk size cannot be reduced from {} GB to {} GB.", old, new),
            ));
        }

        let mut stored = disk.clone();
        stored.id = Some(self.resource_id(&group, "Microsoft.Compute", "disks", name));
        stored.name = Some(name.to_string());
        stored.properties.disk_size_gb = size;
        stored.properties.provisioning_state = Some("Succeeded".to_string());
        inner.disks.insert(key(resource_group, name), stored);
        Ok(())
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Compute", "disks", name);
        self.begin(Method::Delete, Family::Disks, path, vec![], no_body())
            .await?;
        self.lock()
            .disks
            .remove(&key(resource_group, name))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl SqlServersApi for InMemoryArm {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<SqlServer> {
        let path = self.resource_id(resource_group, "Microsoft.Sql", "servers", name);
        self.begin(Method::Get, Family::SqlServers, path, vec![], no_body())
            .await?;
        self.lock()
            .sql_servers
            .get(&key(resource_group, name))
            .cloned()
            .map(|mut server| {
                server.properties.administrator_login_password = None;
                server
            })
            .ok_or(ApiError::NotFound)
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        server: &SqlServer,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Sql", "servers", name);
        self.begin(Method::Put, Family::SqlServers, path, vec![], Some(server))
            .await?;

        let mut inner = self.lock();
        let group = Self::require_group(&inner, resource_group)?;
        if !matches!(server.properties.version.as_deref(), Some("2.0") | Some("12.0")) {
            return Err(bad_request(
                "InvalidParameterValue",
                "Invalid value given for parameter Version.",
            ));
        }

        let mut stored = server.clone();
        stored.id = Some(self.resource_id(&group, "Microsoft.Sql", "servers", name));
        stored.name = Some(name.to_string());
        stored.properties.fully_qualified_domain_name =
            Some(format!("{}.database.windows.net", name));
        stored.properties.state = Some("Ready".to_string());
        inner.sql_servers.insert(key(resource_group, name), stored);
        Ok(())
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        _options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_id(resource_group, "Microsoft.Sql", "servers", name);
        self.begin(Method::Delete, Family::SqlServers, path, vec![], no_body())
            .await?;
        self.lock()
            .sql_servers
            .remove(&key(resource_group, name))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreationData, DiskProperties, DiskSku};

    fn options() -> CallOptions {
        CallOptions::default()
    }

    fn empty_disk(size: i64) -> Disk {
        Disk {
            location: "westus".into(),
            sku: Some(DiskSku {
                name: "Standard_LRS".into(),
            }),
            properties: DiskProperties {
                creation_data: Some(CreationData {
                    create_option: "Empty".into(),
                    ..Default::default()
                }),
                disk_size_gb: Some(size),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn with_group(arm: &InMemoryArm) {
        let group = ResourceGroup {
            location: "westus".into(),
            ..Default::default()
        };
        ResourceGroupsApi::create_or_update(arm, "acctestRG", &group, &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn put_assigns_ids_and_keeps_group_casing() {
        let arm = InMemoryArm::new("0000");
        with_group(&arm).await;
        DisksApi::create_or_update(&arm, "ACCTESTRG", "d1", &empty_disk(1), &options())
            .await
            .unwrap();

        let disk = DisksApi::get(&arm, "acctestrg", "D1").await.unwrap();
        assert_eq!(
            disk.id.as_deref(),
            Some("/subscriptions/0000/resourceGroups/acctestRG/providers/Microsoft.Compute/disks/d1")
        );
    }

    #[tokio::test]
    async fn put_into_missing_group_fails() {
        let arm = InMemoryArm::new("0000");
        let err = DisksApi::create_or_update(&arm, "nope", "d1", &empty_disk(1), &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn group_delete_cascades() {
        let arm = InMemoryArm::new("0000");
        with_group(&arm).await;
        DisksApi::create_or_update(&arm, "acctestRG", "d1", &empty_disk(1), &options())
            .await
            .unwrap();

        ResourceGroupsApi::delete(&arm, "acctestRG", &options())
            .await
            .unwrap();
        assert_eq!(arm.resource_count(), 0);
        assert!(
            DisksApi::get(&arm, "acctestRG", "d1")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn disks_cannot_shrink() {
        let arm = InMemoryArm::new("0000");
        with_group(&arm).await;
        DisksApi::create_or_update(&arm, "acctestRG", "d1", &empty_disk(2), &options())
            .await
            .unwrap();
        assert!(
            DisksApi::create_or_update(&arm, "acctestRG", "d1", &empty_disk(1), &options())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn sql_password_is_never_returned() {
        let arm = InMemoryArm::new("0000");
        with_group(&arm).await;
        let server = SqlServer {
            location: "westus".into(),
            properties: crate::models::SqlServerProperties {
                version: Some("12.0".into()),
                administrator_login: Some("mradministrator".into()),
                administrator_login_password: Some("thisIsDog11".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        SqlServersApi::create_or_update(&arm, "acctestRG", "acctestsql", &server, &options())
            .await
            .unwrap();

        let read = SqlServersApi::get(&arm, "acctestRG", "acctestsql")
            .await
            .unwrap();
        assert_eq!(read.properties.administrator_login_password, None);
        assert_eq!(
            read.properties.fully_qualified_domain_name.as_deref(),
            Some("acctestsql.database.windows.net")
        );
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let arm = InMemoryArm::new("0000");
        let error = ApiError::Status {
            status: 500,
            code: "InternalServerError".into(),
            message: "boom".into(),
        };
        arm.fail_next(Method::Get, Family::ResourceGroups, error.clone());

        assert_eq!(ResourceGroupsApi::get(&arm, "rg").await, Err(error));
        assert_eq!(
            ResourceGroupsApi::get(&arm, "rg").await,
            Err(ApiError::NotFound)
        );
        assert_eq!(arm.requests().len(), 2);
    }
}
