//! Acceptance test harness
//!
//! Drives a Provider through a sequence of declarative documents the way a
//! user would: each step applies a document, runs checks against the
//! resulting states, and verifies that a second plan is empty. Everything
//! the case created is destroyed at the end, even when a step fails.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::{ConfigError, Document};
use crate::interpreter::Interpreter;
use crate::provider::{BoxFuture, Provider, ProviderError};
use crate::resource::{ResourceAddress, State, StateMap};
use crate::schema::ResourceSchema;

/// Assertion over the states known after a step
pub type CheckFn =
    Arc<dyn Fn(StateMap) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Acceptance test error
#[derive(Debug, thiserror::Error)]
pub enum AccTestError {
    #[error("Step {step}: {source}")]
    Config {
        step: usize,
        #[source]
        source: ConfigError,
    },

    #[error("Step {step}: invalid document:\n{}", errors.join("\n"))]
    Invalid { step: usize, errors: Vec<String> },

    #[error("Step {step}: refresh failed: {source}")]
    Refresh {
        step: usize,
        #[source]
        source: ProviderError,
    },

    #[error("Step {step}: apply failed:\n{}", errors.join("\n"))]
    Apply { step: usize, errors: Vec<String> },

    #[error("Step {step}: check failed: {message}")]
    Check { step: usize, message: String },

    #[error("Step {step}: expected an empty plan after apply, got:\n{plan}")]
    NonEmptyPlan { step: usize, plan: String },

    #[error("Step {step}: expected a non-empty plan")]
    EmptyPlan { step: usize },

    #[error("Step {step}: import of {address} failed: {message}")]
    Import {
        step: usize,
        address: ResourceAddress,
        message: String,
    },

    #[error(
        "Step {step}: imported {address} differs on '{attribute}': state has {expected:?}, import has {actual:?}"
    )]
    ImportMismatch {
        step: usize,
        address: ResourceAddress,
        attribute: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("Destroy failed:\n{}", errors.join("\n"))]
    Destroy { errors: Vec<String> },

    #[error("Destroy check failed: {0}")]
    CheckDestroy(String),
}

/// Re-import a resource created by an earlier step
#[derive(Debug, Clone)]
pub struct ImportStep {
    pub address: ResourceAddress,
    /// Identifier to import; defaults to the identifier in state
    pub identifier: Option<String>,
    /// Compare imported attributes with the ones in state
    pub verify: bool,
    /// Attributes that cannot be read back and are skipped by `verify`
    pub verify_ignore: Vec<String>,
}

impl ImportStep {
    pub fn new(address: ResourceAddress) -> Self {
        Self {
            address,
            identifier: None,
            verify: true,
            verify_ignore: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn ignore(mut self, attribute: impl Into<String>) -> Self {
        self.verify_ignore.push(attribute.into());
        self
    }
}

/// One step of a test case
#[derive(Clone, Default)]
pub struct TestStep {
    /// JSON document for this step
    pub config: String,
    pub check: Option<CheckFn>,
    /// Import instead of apply
    pub import: Option<ImportStep>,
    /// Only plan; fail if the plan is not empty
    pub plan_only: bool,
    /// The plan after this step is allowed (plan_only: required) to be non-empty
    pub expect_non_empty_plan: bool,
    /// Destroy the document's resources instead of applying them
    pub destroy: bool,
}

impl TestStep {
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            ..Default::default()
        }
    }

    pub fn with_check(mut self, check: CheckFn) -> Self {
        self.check = Some(check);
        self
    }

    pub fn import(mut self, import: ImportStep) -> Self {
        self.import = Some(import);
        self
    }

    pub fn plan_only(mut self) -> Self {
        self.plan_only = true;
        self
    }

    pub fn expect_non_empty_plan(mut self) -> Self {
        self.expect_non_empty_plan = true;
        self
    }
}

/// A sequence of steps run against one provider
pub struct TestCase {
    provider: Box<dyn Provider>,
    steps: Vec<TestStep>,
    check_destroy: Option<CheckFn>,
}

impl TestCase {
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            steps: Vec::new(),
            check_destroy: None,
        }
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Runs after teardown with the states that existed before it
    pub fn check_destroy(mut self, check: CheckFn) -> Self {
        self.check_destroy = Some(check);
        self
    }

    /// Run every step, then destroy what is left
    pub async fn run(self) -> Result<(), AccTestError> {
        let schemas: HashMap<String, ResourceSchema> = self
            .provider
            .resource_types()
            .iter()
            .map(|t| (t.name().to_string(), t.schema()))
            .collect();
        let interpreter = Interpreter::new(self.provider);
        let mut runner = Runner {
            interpreter,
            schemas,
            states: StateMap::new(),
            last_document: None,
        };

        let mut result = Ok(());
        for (i, step) in self.steps.iter().enumerate() {
            log::info!("Running step {}", i + 1);
            if let Err(e) = runner.run_step(i + 1, step).await {
                result = Err(e);
                break;
            }
        }

        let snapshot = runner.states.clone();
        let teardown = runner.teardown().await;
        if let Err(e) = &teardown {
            log::error!("{}", e);
        }
        result?;
        teardown?;

        if let Some(check) = &self.check_destroy {
            check(snapshot).await.map_err(AccTestError::CheckDestroy)?;
        }
        Ok(())
    }
}

struct Runner {
    interpreter: Interpreter<Box<dyn Provider>>,
    schemas: HashMap<String, ResourceSchema>,
    states: StateMap,
    last_document: Option<Document>,
}

impl Runner {
    async fn run_step(&mut self, step: usize, test_step: &TestStep) -> Result<(), AccTestError> {
        let document = Document::parse(&test_step.config)
            .map_err(|source| AccTestError::Config { step, source })?;

        let errors: Vec<String> = document
            .validate(&self.schemas)
            .iter()
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(AccTestError::Invalid { step, errors });
        }

        if let Some(import) = &test_step.import {
            return self.import(step, import).await;
        }

        self.interpreter
            .refresh(&mut self.states)
            .await
            .map_err(|source| AccTestError::Refresh { step, source })?;

        if test_step.plan_only {
            let plan = document.plan(&self.states, &self.schemas);
            return match (plan.is_empty(), test_step.expect_non_empty_plan) {
                (false, false) => Err(AccTestError::NonEmptyPlan {
                    step,
                    plan: describe(&plan),
                }),
                (true, true) => Err(AccTestError::EmptyPlan { step }),
                _ => Ok(()),
            };
        }

        let plan = if test_step.destroy {
            document.destroy_plan(&self.states)
        } else {
            document.plan(&self.states, &self.schemas)
        };
        let result = self.interpreter.apply(&plan, &mut self.states).await;
        self.last_document = Some(document);
        if !result.is_success() {
            return Err(AccTestError::Apply {
                step,
                errors: result.errors().map(|e| e.to_string()).collect(),
            });
        }

        if let Some(check) = &test_step.check {
            check(self.states.clone())
                .await
                .map_err(|message| AccTestError::Check { step, message })?;
        }

        if test_step.destroy {
            return Ok(());
        }

        self.interpreter
            .refresh(&mut self.states)
            .await
            .map_err(|source| AccTestError::Refresh { step, source })?;
        let Some(document) = &self.last_document else {
            return Ok(());
        };
        let plan = document.plan(&self.states, &self.schemas);
        if !plan.is_empty() && !test_step.expect_non_empty_plan {
            return Err(AccTestError::NonEmptyPlan {
                step,
                plan: describe(&plan),
            });
        }
        Ok(())
    }

    async fn import(&mut self, step: usize, import: &ImportStep) -> Result<(), AccTestError> {
        let import_error = |message: String| AccTestError::Import {
            step,
            address: import.address.clone(),
            message,
        };

        let current = self.states.get(&import.address);
        let identifier = match (&import.identifier, current) {
            (Some(id), _) => id.clone(),
            (None, Some(State {
                identifier: Some(id),
                ..
            })) => id.clone(),
            (None, _) => return Err(import_error("no identifier to import".to_string())),
        };

        let imported = self
            .interpreter
            .provider()
            .import(&import.address, &identifier)
            .await
            .map_err(|e| import_error(e.to_string()))?;

        if !import.verify {
            return Ok(());
        }
        let Some(current) = current else {
            return Err(import_error("nothing in state to verify against".to_string()));
        };

        let mut keys: Vec<&String> = current
            .attributes
            .keys()
            .chain(imported.attributes.keys())
            .collect();
        keys.sort();
        keys.dedup();

        for key in std::iter::once("id").chain(keys.iter().map(|k| k.as_str())) {
            if import.verify_ignore.iter().any(|i| i == key) {
                continue;
            }
            let expected = current.flat_attribute(key);
            let actual = imported.flat_attribute(key);
            if expected != actual {
                return Err(AccTestError::ImportMismatch {
                    step,
                    address: import.address.clone(),
                    attribute: key.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), AccTestError> {
        let plan = match &self.last_document {
            Some(document) => document.destroy_plan(&self.states),
            None => Document::default().destroy_plan(&self.states),
        };
        if plan.is_empty() {
            return Ok(());
        }

        let result = self.interpreter.apply(&plan, &mut self.states).await;
        if result.is_success() {
            Ok(())
        } else {
            Err(AccTestError::Destroy {
                errors: result.errors().map(|e| e.to_string()).collect(),
            })
        }
    }
}

fn describe(plan: &crate::plan::Plan) -> String {
    let mut lines: Vec<String> = plan
        .effects()
        .iter()
        .map(|e| format!("  {} {}", e.kind(), e.address()))
        .collect();
    lines.push(plan.summary().to_string());
    lines.join("\n")
}

/// Wrap an async closure as a check
pub fn check<F, Fut>(f: F) -> CheckFn
where
    F: Fn(StateMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move |states| Box::pin(f(states)))
}

/// Run checks in order, stopping at the first failure
pub fn compose(checks: Vec<CheckFn>) -> CheckFn {
    let checks = Arc::new(checks);
    check(move |states: StateMap| {
        let checks = checks.clone();
        async move {
            for c in checks.iter() {
                c(states.clone()).await?;
            }
            Ok(())
        }
    })
}

fn lookup_state<'a>(states: &'a StateMap, address: &str) -> Result<&'a State, String> {
    let parsed: ResourceAddress = address.parse().map_err(|e| format!("{}", e))?;
    states
        .get(&parsed)
        .filter(|s| s.exists)
        .ok_or_else(|| format!("{} not found in state", address))
}

/// Check that a flat-map attribute has the expected value
pub fn attr_equals(address: &str, key: &str, expected: &str) -> CheckFn {
    let (address, key, expected) = (address.to_string(), key.to_string(), expected.to_string());
    check(move |states: StateMap| {
        let (address, key, expected) = (address.clone(), key.clone(), expected.clone());
        async move {
            let state = lookup_state(&states, &address)?;
            match state.flat_attribute(&key) {
                Some(actual) if actual == expected => Ok(()),
                Some(actual) => Err(format!(
                    "{}: attribute '{}' expected {:?}, got {:?}",
                    address, key, expected, actual
                )),
                None => Err(format!(
                    "{}: attribute '{}' expected {:?}, not set",
                    address, key, expected
                )),
            }
        }
    })
}

/// Check that a flat-map attribute is set to a non-empty value
pub fn attr_set(address: &str, key: &str) -> CheckFn {
    let (address, key) = (address.to_string(), key.to_string());
    check(move |states: StateMap| {
        let (address, key) = (address.clone(), key.clone());
        async move {
            let state = lookup_state(&states, &address)?;
            match state.flat_attribute(&key) {
                Some(v) if !v.is_empty() => Ok(()),
                _ => Err(format!("{}: attribute '{}' is not set", address, key)),
            }
        }
    })
}

/// Check that a flat-map attribute is not set
pub fn attr_absent(address: &str, key: &str) -> CheckFn {
    let (address, key) = (address.to_string(), key.to_string());
    check(move |states: StateMap| {
        let (address, key) = (address.clone(), key.clone());
        async move {
            let state = lookup_state(&states, &address)?;
            match state.flat_attribute(&key) {
                None => Ok(()),
                Some(v) => Err(format!(
                    "{}: attribute '{}' expected to be unset, got {:?}",
                    address, key, v
                )),
            }
        }
    })
}
