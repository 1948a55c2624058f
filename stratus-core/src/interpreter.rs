//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results and keeping the state map in step with the
//! remote system. This is where side effects actually occur.

use crate::config::resolve_references;
use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{Resource, ResourceAddress, State, StateMap};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete and re-create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { address: ResourceAddress },
    /// Skipped (e.g., dry-run)
    Skipped {
        address: ResourceAddress,
        reason: String,
    },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// Errors in execution order
    pub fn errors(&self) -> impl Iterator<Item = &ProviderError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects.
    ///
    /// `states` is updated after every successful Effect, so references to
    /// resources created earlier in the same Plan resolve.
    pub async fn apply(&self, plan: &Plan, states: &mut StateMap) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect, states).await;

            match &result {
                Ok(outcome) => {
                    success_count += 1;
                    record(outcome, states);
                }
                Err(e) => {
                    failure_count += 1;
                    log::error!("{} failed: {}", effect.address(), e);
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect. A Replace drops the old state as soon as its
    /// delete succeeds, even if the create that follows fails.
    async fn execute_effect(
        &self,
        effect: &Effect,
        states: &mut StateMap,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                address: effect.address().clone(),
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Create(resource) => {
                let resource = self.resolve(resource, states)?;
                log::info!("Creating {}", resource.address);
                let state = self.provider.create_or_update(&resource, None).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { from, to, .. } => {
                let resource = self.resolve(to, states)?;
                log::info!("Updating {}", resource.address);
                let state = self
                    .provider
                    .create_or_update(&resource, Some(from))
                    .await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { from, to, forced_by } => {
                let resource = self.resolve(to, states)?;
                log::info!(
                    "Replacing {} (forced by {})",
                    resource.address,
                    forced_by.join(", ")
                );
                self.provider.delete(from).await?;
                states.remove(&from.address);
                let state = self.provider.create_or_update(&resource, None).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete(state) => {
                log::info!("Deleting {}", state.address);
                self.provider.delete(state).await?;
                Ok(EffectOutcome::Deleted {
                    address: state.address.clone(),
                })
            }
        }
    }

    fn resolve(&self, resource: &Resource, states: &StateMap) -> ProviderResult<Resource> {
        resolve_references(resource, states).map_err(|e| {
            ProviderError::invalid_config(e.to_string()).for_resource(resource.address.clone())
        })
    }

    /// Re-read every known state from the remote system.
    ///
    /// States whose remote object is gone are dropped; their addresses are returned.
    pub async fn refresh(&self, states: &mut StateMap) -> ProviderResult<Vec<ResourceAddress>> {
        let mut removed = Vec::new();
        let addresses: Vec<ResourceAddress> = states.keys().cloned().collect();

        for address in addresses {
            let Some(current) = states.get(&address) else {
                continue;
            };
            let refreshed = self.provider.read(current).await?;
            if refreshed.exists {
                states.insert(address, refreshed);
            } else {
                log::warn!("{} no longer exists remotely, removing it from state", address);
                states.remove(&address);
                removed.push(address);
            }
        }

        Ok(removed)
    }
}

fn record(outcome: &EffectOutcome, states: &mut StateMap) {
    match outcome {
        EffectOutcome::Created { state }
        | EffectOutcome::Updated { state }
        | EffectOutcome::Replaced { state } => {
            states.insert(state.address.clone(), state.clone());
        }
        EffectOutcome::Deleted { address } => {
            states.remove(address);
        }
        EffectOutcome::Skipped { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::provider::{BoxFuture, ErrorKind, ResourceType};
    use crate::resource::Value;

    /// Provider that keeps remote objects in memory and logs every call
    #[derive(Default)]
    struct TestProvider {
        remote: Mutex<HashMap<String, State>>,
        calls: Mutex<Vec<String>>,
    }

    impl TestProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
            let current = current.clone();
            Box::pin(async move {
                let remote = self.remote.lock().unwrap();
                Ok(current
                    .identifier
                    .as_ref()
                    .and_then(|id| remote.get(id).cloned())
                    .unwrap_or_else(|| State::not_found(current.address)))
            })
        }

        fn create_or_update(
            &self,
            resource: &Resource,
            _current: Option<&State>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let resource = resource.clone();
            Box::pin(async move {
                if resource.get("fail").is_some() {
                    return Err(ProviderError::api("rejected").for_resource(resource.address));
                }
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("put {}", resource.address));
                let id = format!("id-{}", resource.address);
                let state = State::existing(resource.address, resource.attributes)
                    .with_identifier(id.clone());
                self.remote.lock().unwrap().insert(id, state.clone());
                Ok(state)
            })
        }

        fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
            let current = current.clone();
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("delete {}", current.address));
                if let Some(id) = &current.identifier {
                    self.remote.lock().unwrap().remove(id);
                }
                Ok(())
            })
        }
    }

    fn existing(resource_type: &str, label: &str) -> State {
        let address = ResourceAddress::new(resource_type, label);
        State::existing(address.clone(), HashMap::new()).with_identifier(format!("id-{}", address))
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::default());
        let plan = Plan::new();
        let result = interpreter.apply(&plan, &mut StateMap::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_create_records_state() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let mut states = StateMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 1);
        let state = &states[&ResourceAddress::new("test", "example")];
        assert_eq!(state.identifier.as_deref(), Some("id-test.example"));
    }

    #[tokio::test]
    async fn references_resolve_against_earlier_effects() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("group", "rg").with_attribute("name", Value::String("acctestrg".into())),
        ));
        plan.add(Effect::Create(Resource::new("disk", "d").with_attribute(
            "resource_group_name",
            Value::String("${group.rg.name}".into()),
        )));

        let mut states = StateMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(result.is_success());
        assert_eq!(
            states[&ResourceAddress::new("disk", "d")].attributes["resource_group_name"],
            Value::String("acctestrg".into())
        );
    }

    #[tokio::test]
    async fn unresolved_reference_fails_the_effect() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("disk", "d").with_attribute(
            "resource_group_name",
            Value::String("${group.rg.name}".into()),
        )));

        let result = interpreter.apply(&plan, &mut StateMap::new()).await;
        let err = result.errors().next().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn replace_deletes_before_creating() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(provider);
        let from = existing("disk", "d");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            from: from.clone(),
            to: Resource::new("disk", "d"),
            forced_by: vec!["name".into()],
        });

        let mut states = StateMap::new();
        states.insert(from.address.clone(), from);
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(result.is_success());
        assert_eq!(
            interpreter.provider().calls(),
            vec!["delete disk.d".to_string(), "put disk.d".to_string()]
        );
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Replaced { .. })
        ));
    }

    #[tokio::test]
    async fn failed_replace_forgets_the_deleted_state() {
        let interpreter = Interpreter::new(TestProvider::default());
        let from = existing("disk", "d");
        interpreter
            .provider()
            .remote
            .lock()
            .unwrap()
            .insert(from.identifier.clone().unwrap(), from.clone());

        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            from: from.clone(),
            to: Resource::new("disk", "d").with_attribute("fail", Value::Bool(true)),
            forced_by: vec!["name".into()],
        });

        let mut states = StateMap::new();
        states.insert(from.address.clone(), from.clone());
        let result = interpreter.apply(&plan, &mut states).await;

        assert_eq!(result.failure_count, 1);
        assert!(!states.contains_key(&from.address));
        assert!(interpreter.provider().remote.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stops_on_first_error() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("t", "a").with_attribute("fail", Value::Bool(true)),
        ));
        plan.add(Effect::Create(Resource::new("t", "b")));

        let mut states = StateMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn continue_on_error_runs_remaining_effects() {
        let interpreter = Interpreter::new(TestProvider::default()).with_config(InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        });
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("t", "a").with_attribute("fail", Value::Bool(true)),
        ));
        plan.add(Effect::Create(Resource::new("t", "b")));

        let mut states = StateMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 1);
        assert!(states.contains_key(&ResourceAddress::new("t", "b")));
    }

    #[tokio::test]
    async fn dry_run_skips_side_effects() {
        let interpreter = Interpreter::new(TestProvider::default()).with_config(InterpreterConfig {
            dry_run: true,
            ..Default::default()
        });
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("t", "a")));

        let mut states = StateMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
        assert!(interpreter.provider().calls().is_empty());
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn refresh_drops_states_gone_remotely() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("t", "kept")));
        let mut states = StateMap::new();
        interpreter.apply(&plan, &mut states).await;

        let gone = existing("t", "gone");
        states.insert(gone.address.clone(), gone);

        let removed = interpreter.refresh(&mut states).await.unwrap();
        assert_eq!(removed, vec![ResourceAddress::new("t", "gone")]);
        assert!(states.contains_key(&ResourceAddress::new("t", "kept")));
        assert_eq!(states.len(), 1);
    }
}
