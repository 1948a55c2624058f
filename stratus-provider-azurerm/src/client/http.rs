//! ARM client over HTTPS
//!
//! Authenticates with a pre-issued bearer token. Token acquisition and
//! refresh happen outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    ApiError, ApiResult, CallOptions, DisksApi, ResourceGroupsApi, SiteCreateFlags,
    SiteDeleteFlags, SitesApi, SqlServersApi,
};
use crate::models::{Disk, ResourceGroup, Site, SqlServer};
use crate::resource_id::AzureResourceId;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";
const SITES_API_VERSION: &str = "2022-03-01";
const DISKS_API_VERSION: &str = "2023-04-02";
const SQL_API_VERSION: &str = "2021-11-01";

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(serde::Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(serde::Deserialize)]
struct OperationStatus {
    status: String,
    error: Option<ErrorDetail>,
}

/// How the service wants a long-running operation to be followed
enum Poll {
    AsyncOperation(String),
    Location(String),
}

/// ARM client using `reqwest`
pub struct HttpArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    token: String,
}

impl HttpArmClient {
    pub fn new(
        endpoint: impl Into<String>,
        subscription_id: impl Into<String>,
        token: impl Into<String>,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("stratus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            token: token.into(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn resource_path(
        &self,
        resource_group: &str,
        provider: &str,
        kind: &str,
        name: &str,
    ) -> String {
        AzureResourceId::new(&self.subscription_id, resource_group, provider, kind, name)
            .to_string()
    }

    fn group_path(&self, name: &str) -> String {
        AzureResourceId::resource_group(&self.subscription_id, name).to_string()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> ApiResult<T> {
        log::debug!("GET {}", path);
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(&[("api-version", api_version)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn put_json<B: Serialize + Sync>(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&'static str, String)],
        body: &B,
        options: &CallOptions,
    ) -> ApiResult<()> {
        log::debug!("PUT {}", path);
        let response = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.token)
            .query(&[("api-version", api_version)])
            .query(query)
            .json(body)
            .send()
            .await?;

        self.complete(response, options).await
    }

    async fn delete_request(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&'static str, String)],
        options: &CallOptions,
    ) -> ApiResult<()> {
        log::debug!("DELETE {}", path);
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .query(&[("api-version", api_version)])
            .query(query)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        self.complete(response, options).await
    }

    /// Check the initial response and follow the operation to its end
    async fn complete(&self, response: reqwest::Response, options: &CallOptions) -> ApiResult<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        match poll_target(status, response.headers()) {
            Some(target) => self.wait_for_operation(target, options).await,
            None => Ok(()),
        }
    }

    /// Poll a long-running operation until it settles
    async fn wait_for_operation(&self, target: Poll, options: &CallOptions) -> ApiResult<()> {
        let delay = options.poll_interval.max(Duration::from_millis(1));
        let max_attempts = (options.timeout.as_millis() / delay.as_millis()).max(1);

        for _ in 0..max_attempts {
            match &target {
                Poll::AsyncOperation(url) => {
                    let response = self.http.get(url).bearer_auth(&self.token).send().await?;
                    if !response.status().is_success() {
                        return Err(error_from_response(response).await);
                    }
                    let operation: OperationStatus = response
                        .json()
                        .await
                        .map_err(|e| ApiError::Decode(e.to_string()))?;

                    match operation.status.as_str() {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" => {
                            let message = operation
                                .error
                                .map(|e| format!("{}: {}", e.code, e.message))
                                .unwrap_or_else(|| operation.status.clone());
                            return Err(ApiError::OperationFailed(message));
                        }
                        _ => {}
                    }
                }
                Poll::Location(url) => {
                    let response = self.http.get(url).bearer_auth(&self.token).send().await?;
                    match response.status() {
                        StatusCode::ACCEPTED => {}
                        s if s.is_success() => return Ok(()),
                        _ => return Err(error_from_response(response).await),
                    }
                }
            }
            tokio::time::sleep(delay).await;
        }

        Err(ApiError::Timeout(options.timeout))
    }
}

fn poll_target(status: StatusCode, headers: &HeaderMap) -> Option<Poll> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if let Some(url) = header("Azure-AsyncOperation") {
        return Some(Poll::AsyncOperation(url));
    }
    if status == StatusCode::ACCEPTED
        && let Some(url) = header("Location")
    {
        return Some(Poll::Location(url));
    }
    None
}

async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            error: Some(detail),
        }) => ApiError::Status {
            status,
            code: detail.code,
            message: detail.message,
        },
        _ => ApiError::Status {
            status,
            code: String::new(),
            message: text,
        },
    }
}

#[async_trait]
impl ResourceGroupsApi for HttpArmClient {
    async fn get(&self, name: &str) -> ApiResult<ResourceGroup> {
        self.get_json(&self.group_path(name), RESOURCE_GROUPS_API_VERSION)
            .await
    }

    async fn create_or_update(
        &self,
        name: &str,
        group: &ResourceGroup,
        options: &CallOptions,
    ) -> ApiResult<()> {
        self.put_json(
            &self.group_path(name),
            RESOURCE_GROUPS_API_VERSION,
            &[],
            group,
            options,
        )
        .await
    }

    async fn delete(&self, name: &str, options: &CallOptions) -> ApiResult<()> {
        self.delete_request(
            &self.group_path(name),
            RESOURCE_GROUPS_API_VERSION,
            &[],
            options,
        )
        .await
    }
}

#[async_trait]
impl SitesApi for HttpArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Site> {
        let path = self.resource_path(resource_group, "Microsoft.Web", "sites", name);
        self.get_json(&path, SITES_API_VERSION).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        site: &Site,
        flags: &SiteCreateFlags,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Web", "sites", name);
        self.put_json(&path, SITES_API_VERSION, &flags.query(), site, options)
            .await
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        flags: &SiteDeleteFlags,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Web", "sites", name);
        self.delete_request(&path, SITES_API_VERSION, &flags.query(), options)
            .await
    }
}

#[async_trait]
impl DisksApi for HttpArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<Disk> {
        let path = self.resource_path(resource_group, "Microsoft.Compute", "disks", name);
        self.get_json(&path, DISKS_API_VERSION).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Compute", "disks", name);
        self.put_json(&path, DISKS_API_VERSION, &[], disk, options)
            .await
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Compute", "disks", name);
        self.delete_request(&path, DISKS_API_VERSION, &[], options)
            .await
    }
}

#[async_trait]
impl SqlServersApi for HttpArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<SqlServer> {
        let path = self.resource_path(resource_group, "Microsoft.Sql", "servers", name);
        self.get_json(&path, SQL_API_VERSION).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        server: &SqlServer,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Sql", "servers", name);
        self.put_json(&path, SQL_API_VERSION, &[], server, options)
            .await
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
        options: &CallOptions,
    ) -> ApiResult<()> {
        let path = self.resource_path(resource_group, "Microsoft.Sql", "servers", name);
        self.delete_request(&path, SQL_API_VERSION, &[], options)
            .await
    }
}
