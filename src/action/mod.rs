//! Actions - the external collaborators a step invokes

pub mod command;
pub mod error;
pub mod registry;
pub mod retry;
pub mod setup;
pub mod shell;

use crate::core::{EnvMutation, Environment, StepParams};
use async_trait::async_trait;
pub use error::ActionError;
pub use registry::ActionRegistry;
pub use retry::RetryingAction;
pub use shell::ShellRunner;

/// What a successful action reports back to the executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Captured output
    pub output: String,

    /// Environment changes, applied by the executor after success
    pub mutations: Vec<EnvMutation>,
}

impl ActionOutcome {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            mutations: Vec::new(),
        }
    }

    pub fn with_mutation(mut self, mutation: EnvMutation) -> Self {
        self.mutations.push(mutation);
        self
    }
}

/// Trait for step collaborators - allows for different implementations
///
/// An action reads the environment but never mutates it; it declares
/// mutations in its outcome instead, so a failed step leaves no trace.
#[async_trait]
pub trait Action: Send + Sync {
    /// Invoke the action with the step's (rendered) parameters
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError>;
}

pub(crate) fn required<'a>(params: &'a StepParams, key: &str) -> Result<&'a str, ActionError> {
    params
        .non_empty(key)
        .ok_or_else(|| ActionError::MissingParameter(key.to_string()))
}

/// `python` -> `PYTHON_VERSION`, `node-js` -> `NODE_JS_VERSION`
pub(crate) fn version_var(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_VERSION", normalized)
}

/// Reject values that cannot be a version or tool name
pub(crate) fn validate_token(name: &str, value: &str) -> Result<(), ActionError> {
    if value.chars().any(char::is_whitespace) {
        return Err(ActionError::invalid(name, format!("'{}' must not contain whitespace", value)));
    }
    Ok(())
}
