//! Azure Resource Manager identifiers
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}[/providers/{namespace}]/{type}/{name}/...`

use std::fmt;
use std::str::FromStr;

/// Error returned when an ARM identifier cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceIdError {
    #[error("Cannot parse Azure ID: empty identifier")]
    Empty,

    #[error("The number of path segments is not divisible by 2 in {0:?}")]
    UnpairedSegments(String),

    #[error("Key/value cannot be empty strings in {0:?}")]
    EmptySegment(String),

    #[error("No subscription ID found in {0:?}")]
    MissingSubscription(String),

    #[error("No resource group name found in {0:?}")]
    MissingResourceGroup(String),
}

/// Parsed ARM resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// Resource provider namespace (e.g., "Microsoft.Web")
    pub provider: Option<String>,
    /// Remaining (type, name) pairs in path order
    pub path: Vec<(String, String)>,
}

impl AzureResourceId {
    pub fn resource_group(subscription_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: name.into(),
            provider: None,
            path: Vec::new(),
        }
    }

    /// Identifier of a top-level resource inside a resource group
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        provider: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            provider: Some(provider.into()),
            path: vec![(resource_type.into(), name.into())],
        }
    }

    /// Name segment following a type segment, compared case-insensitively
    pub fn path_value(&self, resource_type: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(resource_type))
            .map(|(_, v)| v.as_str())
    }
}

impl FromStr for AzureResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ResourceIdError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(ResourceIdError::UnpairedSegments(s.to_string()));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ResourceIdError::EmptySegment(s.to_string()));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = Vec::new();

        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if subscription_id.is_none() && key.eq_ignore_ascii_case("subscriptions") {
                subscription_id = Some(value.to_string());
            } else if resource_group.is_none() && key.eq_ignore_ascii_case("resourceGroups") {
                resource_group = Some(value.to_string());
            } else if provider.is_none() && path.is_empty() && key.eq_ignore_ascii_case("providers")
            {
                provider = Some(value.to_string());
            } else {
                path.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            subscription_id: subscription_id
                .ok_or_else(|| ResourceIdError::MissingSubscription(s.to_string()))?,
            resource_group: resource_group
                .ok_or_else(|| ResourceIdError::MissingResourceGroup(s.to_string()))?,
            provider,
            path,
        })
    }
}

impl fmt::Display for AzureResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}
