//! Provider configuration
//!
//! Deserialized from the `provider.azurerm` block of a document:
//!
//! ```json
//! {
//!   "subscription_id": "00000000-0000-0000-0000-000000000000",
//!   "timeouts": { "create": 1800, "read": 300, "delete": 1800 },
//!   "poll_interval_secs": 10,
//!   "features": { "app_service": { "delete_empty_server_farm": false } }
//! }
//! ```
//!
//! Credentials are usually left out of the document and supplied through
//! `ARM_SUBSCRIPTION_ID`, `ARM_ACCESS_TOKEN` and `ARM_ENDPOINT` instead.

use std::time::Duration;

use serde::Deserialize;

use crate::client::http::DEFAULT_ENDPOINT;
use crate::client::{ApiError, ArmClient, HttpArmClient, SiteDeleteFlags, Timeouts};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid provider block: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("subscription_id is not set (use ARM_SUBSCRIPTION_ID or the provider block)")]
    MissingSubscription,

    #[error("access_token is not set (use ARM_ACCESS_TOKEN or the provider block)")]
    MissingAccessToken,

    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] ApiError),
}

/// Operation timeouts in seconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub create: Option<u64>,
    pub read: Option<u64>,
    pub delete: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// Side effects of deleting an App Service
    pub app_service: SiteDeleteFlags,
}

/// Settings of the `azurerm` provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub subscription_id: Option<String>,
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
    pub timeouts: TimeoutsConfig,
    pub poll_interval_secs: Option<u64>,
    pub features: Features,
}

impl ProviderConfig {
    /// Parse a provider block. A missing block yields the defaults.
    pub fn from_value(block: Option<&serde_json::Value>) -> Result<Self, ConfigError> {
        match block {
            Some(value) => Ok(Self::deserialize(value)?),
            None => Ok(Self::default()),
        }
    }

    /// Fill settings the block left out, e.g. from the environment
    pub fn with_fallbacks(
        mut self,
        subscription_id: Option<String>,
        access_token: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        self.subscription_id = self.subscription_id.or(subscription_id);
        self.access_token = self.access_token.or(access_token);
        self.endpoint = self.endpoint.or(endpoint);
        self
    }

    pub fn timeouts(&self) -> Result<Timeouts, ConfigError> {
        let defaults = Timeouts::default();
        let seconds = |name: &'static str, value: Option<u64>, default: Duration| match value {
            Some(0) => Err(ConfigError::ZeroTimeout(name)),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(default),
        };

        Ok(Timeouts {
            create: seconds("create", self.timeouts.create, defaults.create)?,
            read: seconds("read", self.timeouts.read, defaults.read)?,
            delete: seconds("delete", self.timeouts.delete, defaults.delete)?,
            poll_interval: seconds(
                "poll_interval_secs",
                self.poll_interval_secs,
                defaults.poll_interval,
            )?,
        })
    }

    /// Client against the management endpoint
    pub fn http_client(&self) -> Result<ArmClient, ConfigError> {
        let subscription_id = self
            .subscription_id
            .clone()
            .ok_or(ConfigError::MissingSubscription)?;
        let access_token = self
            .access_token
            .clone()
            .ok_or(ConfigError::MissingAccessToken)?;
        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);

        let http = HttpArmClient::new(endpoint, subscription_id, access_token)?;
        Ok(ArmClient::http(http, self.timeouts()?)
            .with_site_delete_flags(self.features.app_service))
    }
}
