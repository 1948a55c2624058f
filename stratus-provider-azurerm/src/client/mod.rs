//! ARM API client
//!
//! Handlers talk to Azure through the per-family traits below. The
//! [`ArmClient`] context bundles one implementation of each together with the
//! subscription and the timeouts every call runs under; it is immutable and
//! shared between concurrent handler calls.

pub mod http;
pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Disk, ResourceGroup, Site, SqlServer};

pub use http::HttpArmClient;
pub use memory::InMemoryArm;

/// Error returned by the ARM API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("Service returned an error. Status={status} Code={code:?} Message={message:?}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("long-running operation failed: {0}")]
    OperationFailed(String),

    #[error("operation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the error means the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound | ApiError::Status { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Per-call deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Upper bound for the whole call, long-running operation polling included
    pub timeout: Duration,
    /// Delay between polls of a long-running operation
    pub poll_interval: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Timeouts per kind of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub delete: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> CallOptions {
        self.options(self.create)
    }

    pub fn read(&self) -> CallOptions {
        self.options(self.read)
    }

    pub fn delete(&self) -> CallOptions {
        self.options(self.delete)
    }

    fn options(&self, timeout: Duration) -> CallOptions {
        CallOptions {
            timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// Query flags sent when creating or updating an App Service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCreateFlags {
    pub skip_dns_registration: bool,
    pub skip_custom_domain_verification: bool,
    pub force_dns_registration: bool,
    pub ttl_in_seconds: String,
}

impl SiteCreateFlags {
    /// `ttlInSeconds` is only sent when set
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("skipDnsRegistration", self.skip_dns_registration.to_string()),
            (
                "skipCustomDomainVerification",
                self.skip_custom_domain_verification.to_string(),
            ),
            ("forceDnsRegistration", self.force_dns_registration.to_string()),
        ];
        if !self.ttl_in_seconds.is_empty() {
            query.push(("ttlInSeconds", self.ttl_in_seconds.clone()));
        }
        query
    }
}

/// Side effects of deleting an App Service
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct SiteDeleteFlags {
    pub delete_metrics: bool,
    pub delete_empty_server_farm: bool,
    pub skip_dns_registration: bool,
}

impl Default for SiteDeleteFlags {
    fn default() -> Self {
        Self {
            delete_metrics: true,
            delete_empty_server_farm: true,
            skip_dns_registration: true,
        }
    }
}

impl SiteDeleteFlags {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("deleteMetrics", self.delete_metrics.to_string()),
            (
                "deleteEmptyServerFarm",
                self.delete_empty_server_farm.to_string(),
            ),
            ("skipDnsRegistration", self.skip_dns_registration.to_string()),
        ]
    }
}

#[async_trait]
pub trait ResourceGroupsApi: Send + Sync {
    async fn get(&self, name: &str) -> ApiResult<ResourceGroup>;

    async fn create_or_update(
        &self,
        name: &str,
        group: &ResourceGroup,
        options: &CallOptions,
    ) -> ApiResult<()>;

    /// Deletes the group and everything in it
    async fn delete(&self, name: &str, options: &CallOptions) -> ApiResult<()>;
}

#[async_trait]
pub trait SitesApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Site>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        site: &Site,
        flags: &SiteCreateFlags,
        options: &CallOptions,
    ) -> ApiResult<()>;

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        flags: &SiteDeleteFlags,
        options: &CallOptions,
    ) -> ApiResult<()>;
}

#[async_trait]
pub trait DisksApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Disk>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
        options: &CallOptions,
    ) -> ApiResult<()>;

    async fn delete(&self, resource_group: &str, name: &str, options: &CallOptions)
    -> ApiResult<()>;
}

#[async_trait]
pub trait SqlServersApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<SqlServer>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        server: &SqlServer,
        options: &CallOptions,
    ) -> ApiResult<()>;

    async fn delete(&self, resource_group: &str, name: &str, options: &CallOptions)
    -> ApiResult<()>;
}

/// Client context handed to every handler call
#[derive(Clone)]
pub struct ArmClient {
    pub subscription_id: String,
    pub resource_groups: Arc<dyn ResourceGroupsApi>,
    pub sites: Arc<dyn SitesApi>,
    pub disks: Arc<dyn DisksApi>,
    pub sql_servers: Arc<dyn SqlServersApi>,
    pub timeouts: Timeouts,
    pub site_delete_flags: SiteDeleteFlags,
}

impl ArmClient {
    /// Client backed by the real management endpoint
    pub fn http(client: HttpArmClient, timeouts: Timeouts) -> Self {
        let client = Arc::new(client);
        Self {
            subscription_id: client.subscription_id().to_string(),
            resource_groups: client.clone(),
            sites: client.clone(),
            disks: client.clone(),
            sql_servers: client,
            timeouts,
            site_delete_flags: SiteDeleteFlags::default(),
        }
    }

    /// Client backed by an in-memory management plane
    pub fn in_memory(arm: &InMemoryArm, timeouts: Timeouts) -> Self {
        let arm = Arc::new(arm.clone());
        Self {
            subscription_id: arm.subscription_id().to_string(),
            resource_groups: arm.clone(),
            sites: arm.clone(),
            disks: arm.clone(),
            sql_servers: arm,
            timeouts,
            site_delete_flags: SiteDeleteFlags::default(),
        }
    }

    pub fn with_site_delete_flags(mut self, flags: SiteDeleteFlags) -> Self {
        self.site_delete_flags = flags;
        self
    }

    /// Run a remote call under a deadline. Dropping the future cancels the call.
    pub async fn call<T, F>(&self, options: CallOptions, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        match tokio::time::timeout(options.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(options.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(ApiError::NotFound.is_not_found());
        assert!(
            ApiError::Status {
                status: 404,
                code: "ResourceGroupNotFound".into(),
                message: String::new(),
            }
            .is_not_found()
        );
        assert!(!ApiError::Timeout(Duration::from_secs(1)).is_not_found());
    }

    #[test]
    fn delete_flags_default_to_safe_values() {
        let query = SiteDeleteFlags::default().query();
        assert!(query.iter().all(|(_, v)| v == "true"));
    }

    #[test]
    fn empty_ttl_is_not_sent() {
        let mut flags = SiteCreateFlags {
            skip_dns_registration: true,
            skip_custom_domain_verification: true,
            force_dns_registration: false,
            ttl_in_seconds: String::new(),
        };
        assert!(flags.query().iter().all(|(k, _)| *k != "ttlInSeconds"));
        assert_eq!(flags.query().len(), 3);

        flags.ttl_in_seconds = "60".to_string();
        assert!(
            flags
                .query()
                .contains(&("ttlInSeconds", "60".to_string()))
        );
    }

    #[tokio::test]
    async fn call_times_out() {
        let client = ArmClient::in_memory(&InMemoryArm::new("0000"), Timeouts::default());
        let options = CallOptions {
            timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
        };

        let result: ApiResult<()> = client
            .call(options, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(ApiError::Timeout(Duration::from_millis(10))));
    }
}
