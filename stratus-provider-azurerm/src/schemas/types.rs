//! ARM-specific type definitions

use std::sync::LazyLock;

use regex::Regex;
use stratus_core::resource::Value;
use stratus_core::schema::{AttributeType, types};

use crate::utils::{normalize_location, validate_tags};

static SQL_SERVER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-z]([-0-9a-z]{0,61}[0-9a-z])?$").expect("valid SQL server name pattern")
});

fn variants(values: &[&str]) -> AttributeType {
    AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
}

/// Azure location. Accepts display names ("West US") and short names ("westus").
pub fn location() -> AttributeType {
    AttributeType::Custom {
        name: "Location".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if normalize_location(s).is_empty() => {
                Err("location must not be empty".to_string())
            }
            Value::String(_) => Ok(()),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Resource tags: at most 15 string entries
pub fn tags() -> AttributeType {
    AttributeType::Custom {
        name: "Tags".to_string(),
        base: Box::new(types::string_map()),
        validate: validate_tags,
    }
}

/// Managed disk size in gigabytes
pub fn disk_size_gb() -> AttributeType {
    AttributeType::Custom {
        name: "DiskSizeGB".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| {
            let size = match value {
                Value::Int(n) => Some(*n),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match size {
                Some(n) if (1..=1023).contains(&n) => Ok(()),
                Some(n) => Err(format!(
                    "The `disk_size_gb` can only be between 1 and 1023, got {}",
                    n
                )),
                None => Err("Expected integer".to_string()),
            }
        },
    }
}

/// SQL server name: lowercase letters, digits and hyphens, 1-63 characters
pub fn sql_server_name() -> AttributeType {
    AttributeType::Custom {
        name: "SqlServerName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if SQL_SERVER_NAME.is_match(s) => Ok(()),
            Value::String(s) => Err(format!(
                "Invalid SQL server name '{}': only lowercase letters, digits and hyphens are allowed, \
                 it cannot start or end with a hyphen and must be at most 63 characters",
                s
            )),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Managed disk storage account type
pub fn storage_account_type() -> AttributeType {
    variants(&["Standard_LRS", "Premium_LRS"])
}

/// How a managed disk is populated
/// - Empty: a blank disk of `disk_size_gb`
/// - Import: copied from a VHD blob at `source_uri`
/// - Copy: copied from the managed disk `source_resource_id`
pub fn create_option() -> AttributeType {
    variants(&["Empty", "Import", "Copy"])
}

pub fn os_type() -> AttributeType {
    variants(&["Windows", "Linux"])
}

pub fn sql_server_version() -> AttributeType {
    variants(&["2.0", "12.0"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_location() {
        let t = location();
        assert!(t.validate(&Value::String("West US".to_string())).is_ok());
        assert!(t.validate(&Value::String("westus".to_string())).is_ok());
        assert!(t.validate(&Value::String(" ".to_string())).is_err());
        assert!(t.validate(&Value::Int(1)).is_err());
    }

    #[test]
    fn validate_disk_size() {
        let t = disk_size_gb();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::String("45".to_string())).is_ok());
        assert!(t.validate(&Value::Int(1023)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(1024)).is_err());
        assert!(t.is_int());
    }

    #[test]
    fn validate_sql_server_name() {
        let t = sql_server_name();
        assert!(t.validate(&Value::String("acctestsqlserver1".to_string())).is_ok());
        assert!(t.validate(&Value::String("a".to_string())).is_ok());
        assert!(t.validate(&Value::String("my-server-01".to_string())).is_ok());
        assert!(t.validate(&Value::String("MyServer".to_string())).is_err());
        assert!(t.validate(&Value::String("-server".to_string())).is_err());
        assert!(t.validate(&Value::String("server-".to_string())).is_err());
        assert!(t.validate(&Value::String("a".repeat(64))).is_err());
    }

    #[test]
    fn validate_tags_type() {
        let t = tags();
        assert!(t.validate(&Value::string_map([("environment", "acctest")])).is_ok());
        assert!(t.validate(&Value::String("x".to_string())).is_err());
    }
}
