//! Command actions: inline scripts, dependency installation and the test suite

use crate::action::{required, Action, ActionError, ActionOutcome, ShellRunner};
use crate::core::{Capability, EnvMutation, Environment, StepParams, RUN_ACTION};
use async_trait::async_trait;
use tracing::{info, warn};

/// `run`: executes an inline script
///
/// Params: `run` (the script), optional `shell` (default `sh`).
#[derive(Debug, Clone, Default)]
pub struct RunScript {
    shell: ShellRunner,
}

impl RunScript {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for RunScript {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let script = required(params, RUN_ACTION)?;
        let output = match params.non_empty("shell") {
            Some(shell) => ShellRunner::new(shell).run(script, env, &[]).await?,
            None => self.shell.run(script, env, &[]).await?,
        };
        Ok(ActionOutcome::new(output))
    }
}

/// `install-dependencies`: installs the project's dependencies from its manifest
///
/// Requires an installed package manager. Params: optional `manifest` that must
/// exist in the working directory, optional `command` (default `<manager> install`).
#[derive(Debug, Clone, Default)]
pub struct InstallDependencies {
    shell: ShellRunner,
}

impl InstallDependencies {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for InstallDependencies {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let manager = env.package_manager().ok_or_else(|| {
            ActionError::MissingCapability("an installed package manager".to_string())
        })?;

        if let Some(manifest) = params.non_empty("manifest") {
            let manifest_path = env.working_dir().join(manifest);
            if !manifest_path.is_file() {
                return Err(ActionError::invalid(
                    "manifest",
                    format!("{} not found", manifest_path.display()),
                ));
            }
        }

        let command = params
            .non_empty("command")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} install", manager));
        let output = self.shell.run(&command, env, &[]).await?;

        info!("Dependencies installed with {}", manager);
        Ok(ActionOutcome::new(output).with_mutation(EnvMutation::Install(
            Capability::Dependencies {
                manager: manager.to_string(),
            },
        )))
    }
}

/// `run-tests`: runs the test suite
///
/// Params: optional `command`; defaults to `<manager> test` when a package
/// manager is installed.
#[derive(Debug, Clone, Default)]
pub struct RunTests {
    shell: ShellRunner,
}

impl RunTests {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for RunTests {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let command = match (params.non_empty("command"), env.package_manager()) {
            (Some(command), _) => command.to_string(),
            (None, Some(manager)) => format!("{} test", manager),
            (None, None) => return Err(ActionError::MissingParameter("command".to_string())),
        };
        if env.package_manager().is_some() && !env.dependencies_installed() {
            warn!("Running tests before dependencies were installed");
        }

        let output = self.shell.run(&command, env, &[]).await?;
        Ok(ActionOutcome::new(output))
    }
}
