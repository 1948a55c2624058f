//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in a document with the current state
//! refreshed from the Provider and generates the Effects needed to converge.

use std::collections::{HashMap, HashSet};

use crate::config::has_unresolved_reference;
use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceAddress, State, StateMap, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> delete and create
    Replace {
        from: State,
        to: Resource,
        forced_by: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceAddress),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    let mut desired = desired.clone();
    if let Some(schema) = schema {
        schema.apply_defaults(&mut desired.attributes);
    }

    if !current.exists || current.identifier.is_none() {
        return Diff::Create(desired);
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);
    if changed.is_empty() {
        return Diff::NoChange(desired.address);
    }

    let forced_by: Vec<String> = match schema {
        Some(schema) => changed
            .iter()
            .filter(|name| schema.get(name).is_some_and(|a| a.force_new))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    if forced_by.is_empty() {
        Diff::Update {
            from: current.clone(),
            to: desired,
            changed_attributes: changed,
        }
    } else {
        Diff::Replace {
            from: current.clone(),
            to: desired,
            forced_by,
        }
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Map(map) => map.is_empty(),
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

/// Find changed attributes between desired and current state, sorted by name
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        let attr = schema.and_then(|s| s.get(key));

        let same = match current.get(key) {
            // Values that depend on resources not yet created are known after apply
            _ if has_unresolved_reference(desired_value) => false,
            Some(current_value) => match attr {
                Some(attr) => attr.values_equal(desired_value, current_value),
                None => current_value == desired_value,
            },
            None => is_empty_collection(desired_value),
        };

        if !same {
            changed.push(key.clone());
        }
    }

    // Optional attributes dropped from the document must be unset remotely,
    // unless the remote system owns their value.
    if let Some(schema) = schema {
        for (key, current_value) in current {
            if desired.contains_key(key) || is_empty_collection(current_value) {
                continue;
            }
            if let Some(attr) = schema.get(key)
                && attr.is_settable()
                && !attr.computed
            {
                changed.push(key.clone());
            }
        }
    }

    changed.sort();
    changed
}

/// Compute Diff for multiple resources and generate a Plan.
///
/// `desired` must already be in dependency order. States with no matching
/// desired resource carry no references, so they are deleted after every
/// declared change in reverse address order.
pub fn create_plan(
    desired: &[Resource],
    current_states: &StateMap,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();
    let mut declared = HashSet::new();

    for resource in desired {
        declared.insert(resource.address.clone());

        let current = current_states
            .get(&resource.address)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.address.clone()));

        let d = diff(
            resource,
            &current,
            schemas.get(&resource.address.resource_type),
        );

        match d {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                from,
                to,
                forced_by,
            } => plan.add(Effect::Replace {
                from,
                to,
                forced_by,
            }),
            Diff::NoChange(_) => {}
        }
    }

    for (address, state) in current_states.iter().rev() {
        if !declared.contains(address) && state.exists {
            plan.add(Effect::Delete(state.clone()));
        }
    }

    plan
}

/// Plan deleting every known state: declared resources in reverse dependency
/// order, then any orphaned states.
pub fn destroy_plan(desired: &[Resource], current_states: &StateMap) -> Plan {
    let mut plan = Plan::new();
    let mut planned = HashSet::new();

    for resource in desired.iter().rev() {
        if let Some(state) = current_states.get(&resource.address)
            && state.exists
        {
            planned.insert(resource.address.clone());
            plan.add(Effect::Delete(state.clone()));
        }
    }

    for (address, state) in current_states.iter().rev() {
        if !planned.contains(address) && state.exists {
            plan.add(Effect::Delete(state.clone()));
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType, normalize, types};

    fn disk_schema() -> ResourceSchema {
        ResourceSchema::new("disk")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new(
                    "storage_account_type",
                    AttributeType::Enum(vec!["Standard_LRS".into(), "Premium_LRS".into()]),
                )
                .required()
                .with_normalizer(normalize::case_insensitive),
            )
            .attribute(AttributeSchema::new("disk_size_gb", types::positive_int()).computed())
            .attribute(AttributeSchema::new("tags", types::string_map()))
            .attribute(
                AttributeSchema::new("encrypted", AttributeType::Bool)
                    .with_default(Value::Bool(false)),
            )
    }

    fn existing(attrs: Vec<(&str, Value)>) -> State {
        State::existing(
            ResourceAddress::new("disk", "test"),
            attrs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
        .with_identifier("id-1")
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("disk", "test");
        let current = State::not_found(ResourceAddress::new("disk", "test"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("disk", "test")
            .with_attribute("name", Value::String("d".into()))
            .with_attribute("storage_account_type", Value::String("standard_lrs".into()))
            .with_attribute("disk_size_gb", Value::String("1".into()));
        let current = existing(vec![
            ("name", Value::String("d".into())),
            ("storage_account_type", Value::String("Standard_LRS".into())),
            ("disk_size_gb", Value::Int(1)),
            ("encrypted", Value::Bool(false)),
            ("tags", Value::Map(HashMap::new())),
        ]);

        let result = diff(&desired, &current, Some(&disk_schema()));
        assert_eq!(result, Diff::NoChange(ResourceAddress::new("disk", "test")));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("disk", "test")
            .with_attribute("name", Value::String("d".into()))
            .with_attribute("storage_account_type", Value::String("Premium_LRS".into()))
            .with_attribute("tags", Value::string_map([("environment", "acctest")]));
        let current = existing(vec![
            ("name", Value::String("d".into())),
            ("storage_account_type", Value::String("Standard_LRS".into())),
            ("disk_size_gb", Value::Int(1)),
            ("encrypted", Value::Bool(false)),
            (
                "tags",
                Value::string_map([("environment", "acctest"), ("cost-center", "ops")]),
            ),
        ]);

        match diff(&desired, &current, Some(&disk_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(
                    changed_attributes,
                    vec!["storage_account_type".to_string(), "tags".to_string()]
                );
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_on_force_new_change() {
        let desired = Resource::new("disk", "test")
            .with_attribute("name", Value::String("renamed".into()))
            .with_attribute("storage_account_type", Value::String("Standard_LRS".into()));
        let current = existing(vec![
            ("name", Value::String("d".into())),
            ("storage_account_type", Value::String("Standard_LRS".into())),
            ("encrypted", Value::Bool(false)),
        ]);

        match diff(&desired, &current, Some(&disk_schema())) {
            Diff::Replace { forced_by, .. } => assert_eq!(forced_by, vec!["name".to_string()]),
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn removed_tags_are_a_change() {
        let desired = Resource::new("disk", "test")
            .with_attribute("name", Value::String("d".into()))
            .with_attribute("storage_account_type", Value::String("Standard_LRS".into()));
        let current = existing(vec![
            ("name", Value::String("d".into())),
            ("storage_account_type", Value::String("Standard_LRS".into())),
            ("encrypted", Value::Bool(false)),
            ("tags", Value::string_map([("environment", "acctest")])),
            // computed attribute not declared: not a change
            ("disk_size_gb", Value::Int(10)),
        ]);

        match diff(&desired, &current, Some(&disk_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["tags".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn unresolved_reference_is_always_a_change() {
        let desired = Resource::new("disk", "test")
            .with_attribute("name", Value::String("d".into()))
            .with_attribute(
                "storage_account_type",
                Value::String("${disk.source.storage_account_type}".into()),
            );
        let current = existing(vec![
            ("name", Value::String("d".into())),
            ("storage_account_type", Value::String("Standard_LRS".into())),
            ("encrypted", Value::Bool(false)),
        ]);

        assert!(diff(&desired, &current, Some(&disk_schema())).is_change());
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("disk", "new-disk"),
            Resource::new("disk", "existing").with_attribute("encrypted", Value::Bool(true)),
        ];

        let mut current_states = StateMap::new();
        let mut attrs = HashMap::new();
        attrs.insert("encrypted".to_string(), Value::Bool(false));
        current_states.insert(
            ResourceAddress::new("disk", "existing"),
            State::existing(ResourceAddress::new("disk", "existing"), attrs).with_identifier("x"),
        );
        current_states.insert(
            ResourceAddress::new("disk", "orphan"),
            State::existing(ResourceAddress::new("disk", "orphan"), HashMap::new())
                .with_identifier("y"),
        );

        let plan = create_plan(&resources, &current_states, &HashMap::new());

        assert_eq!(plan.effects().len(), 3);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
        assert!(matches!(plan.effects()[2], Effect::Delete(_)));
    }

    #[test]
    fn orphans_are_deleted_last_in_reverse_address_order() {
        let resources = vec![Resource::new("disk", "kept")];
        let mut states = StateMap::new();
        for label in ["a-orphan", "kept", "z-orphan"] {
            let address = ResourceAddress::new("disk", label);
            states.insert(
                address.clone(),
                State::existing(address, HashMap::new()).with_identifier(label),
            );
        }

        let plan = create_plan(&resources, &states, &HashMap::new());
        let order: Vec<String> = plan.effects().iter().map(|e| e.address().to_string()).collect();
        assert_eq!(order, vec!["disk.z-orphan".to_string(), "disk.a-orphan".to_string()]);
    }

    #[test]
    fn destroy_plan_reverses_declaration_order() {
        let resources = vec![
            Resource::new("azurerm_resource_group", "test"),
            Resource::new("azurerm_managed_disk", "test"),
        ];
        let mut states = StateMap::new();
        for r in &resources {
            states.insert(
                r.address.clone(),
                State::existing(r.address.clone(), HashMap::new()).with_identifier("id"),
            );
        }

        let plan = destroy_plan(&resources, &states);
        let order: Vec<String> = plan.effects().iter().map(|e| e.address().to_string()).collect();
        assert_eq!(
            order,
            vec![
                "azurerm_managed_disk.test".to_string(),
                "azurerm_resource_group.test".to_string()
            ]
        );
    }
}
