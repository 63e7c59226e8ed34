//! Action registry - resolves a step's action name to its collaborator

use crate::action::{
    command::{InstallDependencies, RunScript, RunTests},
    setup::{SetupBrowser, SetupPackageManager, SetupToolchain},
    Action, ActionError, RetryingAction, ShellRunner,
};
use crate::core::{Step, RUN_ACTION};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps action names to implementations
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every builtin action, running scripts through `sh`
    pub fn with_builtins() -> Self {
        Self::with_builtins_using(ShellRunner::default())
    }

    /// Registry with every builtin action, running scripts through `shell`
    pub fn with_builtins_using(shell: ShellRunner) -> Self {
        let mut registry = Self::new();
        registry.register(RUN_ACTION, RunScript::new(shell.clone()));
        registry.register("setup-toolchain", SetupToolchain::new(shell.clone()));
        registry.register("setup-package-manager", SetupPackageManager::new(shell.clone()));
        registry.register("install-dependencies", InstallDependencies::new(shell.clone()));
        registry.register("setup-browser", SetupBrowser::new(shell.clone()));
        registry.register("run-tests", RunTests::new(shell));
        registry
    }

    /// Register (or replace) an action
    pub fn register<A: Action + 'static>(&mut self, name: impl Into<String>, action: A) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the collaborator for a step, wrapped in its retry policy if it has one
    pub fn resolve(&self, step: &Step) -> Result<Arc<dyn Action>, ActionError> {
        let action = self
            .actions
            .get(&step.action)
            .cloned()
            .ok_or_else(|| ActionError::UnknownAction(step.action.clone()))?;

        let resolved: Arc<dyn Action> = match step.retry {
            Some(policy) if policy.max_attempts > 1 => Arc::new(RetryingAction::new(action, policy)),
            _ => action,
        };
        Ok(resolved)
    }
}
