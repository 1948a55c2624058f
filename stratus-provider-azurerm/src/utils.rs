//! Utility functions for value normalization and conversion

use stratus_core::resource::Value;

use crate::models::Tags;

/// Maximum number of tags ARM accepts on a resource
pub const MAX_TAGS: usize = 15;

/// Normalize location value (e.g., "West US 2" -> "westus2")
pub fn normalize_location(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Value normalizer for `location` attributes
pub fn location_normalizer(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_location(s)),
        other => other.clone(),
    }
}

/// Convert tags returned by ARM to a state value. Missing tags read back as an empty map.
pub fn flatten_tags(tags: Option<&Tags>) -> Value {
    Value::Map(
        tags.into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Check tag count and key/value lengths
pub fn validate_tags(value: &Value) -> Result<(), String> {
    let Value::Map(tags) = value else {
        return Err("Expected map".to_string());
    };
    if tags.len() > MAX_TAGS {
        return Err(format!(
            "a maximum of {} tags can be applied to each ARM resource, got {}",
            MAX_TAGS,
            tags.len()
        ));
    }
    for (key, value) in tags {
        if key.len() > 512 {
            return Err(format!(
                "the maximum length for a tag key is 512 characters: {:?} is {} characters",
                key,
                key.len()
            ));
        }
        if value.render().len() > 256 {
            return Err(format!(
                "the maximum length for a tag value is 256 characters: the value for {:?} is {} characters",
                key,
                value.render().len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West US"), "westus");
        assert_eq!(normalize_location("West US 2"), "westus2");
        assert_eq!(normalize_location("westeurope"), "westeurope");
    }

    #[test]
    fn test_flatten_tags() {
        assert_eq!(flatten_tags(None), Value::Map(HashMap::new()));

        let tags: Tags = [("environment".to_string(), "acctest".to_string())].into();
        assert_eq!(
            flatten_tags(Some(&tags)),
            Value::string_map([("environment", "acctest")])
        );
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_tags(&Value::string_map([("environment", "acctest")])).is_ok());

        let too_many = Value::string_map((0..16).map(|i| (format!("k{}", i), "v".to_string())));
        assert!(validate_tags(&too_many).unwrap_err().contains("maximum of 15"));

        let long_value = Value::string_map([("k", "v".repeat(257))]);
        assert!(validate_tags(&long_value).is_err());
    }
}
