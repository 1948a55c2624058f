//! Effect - Side effects represented as values
//!
//! An Effect describes one remote mutation. Nothing happens until the
//! interpreter executes it against a Provider.

use crate::resource::{Resource, ResourceAddress, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a resource that does not exist yet
    Create(Resource),
    /// Update a resource in place
    Update {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Destroy and recreate a resource because a force-new attribute changed
    Replace {
        from: State,
        to: Resource,
        forced_by: Vec<String>,
    },
    /// Delete a resource
    Delete(State),
}

impl Effect {
    pub fn address(&self) -> &ResourceAddress {
        match self {
            Effect::Create(resource) => &resource.address,
            Effect::Update { to, .. } | Effect::Replace { to, .. } => &to.address,
            Effect::Delete(state) => &state.address,
        }
    }

    /// Short verb used in plan output
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete(_) => "delete",
        }
    }
}
