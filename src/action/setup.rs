//! Installers: language toolchains, package managers and browsers

use crate::action::{required, validate_token, version_var, Action, ActionError, ActionOutcome, ShellRunner};
use crate::core::{Capability, EnvMutation, Environment, StepParams};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// `setup-toolchain`: installs a language runtime
///
/// Params: `name`, `version`, optional `install` script.
#[derive(Debug, Clone, Default)]
pub struct SetupToolchain {
    shell: ShellRunner,
}

impl SetupToolchain {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for SetupToolchain {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let name = required(params, "name")?;
        let version = required(params, "version")?;
        validate_token("name", name)?;
        validate_token("version", version)?;

        let output = match params.non_empty("install") {
            Some(script) => {
                self.shell
                    .run(
                        script,
                        env,
                        &[("TOOLCHAIN_NAME", name), ("TOOLCHAIN_VERSION", version)],
                    )
                    .await?
            }
            None => format!("{} {} ready\n", name, version),
        };

        info!("Toolchain {} {} available", name, version);
        Ok(ActionOutcome::new(output)
            .with_mutation(EnvMutation::Install(Capability::Toolchain {
                name: name.to_string(),
                version: version.to_string(),
            }))
            .with_mutation(EnvMutation::set_var(version_var(name), version)))
    }
}

/// `setup-package-manager`: installs a package-management tool
///
/// Params: `name`, `version`, optional `install` script.
#[derive(Debug, Clone, Default)]
pub struct SetupPackageManager {
    shell: ShellRunner,
}

impl SetupPackageManager {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for SetupPackageManager {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let name = required(params, "name")?;
        let version = required(params, "version")?;
        validate_token("name", name)?;
        validate_token("version", version)?;

        let output = match params.non_empty("install") {
            Some(script) => {
                self.shell
                    .run(
                        script,
                        env,
                        &[("PACKAGE_MANAGER", name), ("PACKAGE_MANAGER_VERSION", version)],
                    )
                    .await?
            }
            None => format!("{} {} ready\n", name, version),
        };

        info!("Package manager {} {} available", name, version);
        Ok(ActionOutcome::new(output)
            .with_mutation(EnvMutation::Install(Capability::PackageManager {
                name: name.to_string(),
                version: version.to_string(),
            }))
            .with_mutation(EnvMutation::set_var("PACKAGE_MANAGER", name)))
    }
}

/// `setup-browser`: provisions a browser binary and records its location
///
/// Params: `name`, `version` (default `stable`), optional `path` and `install`.
/// Without `path` the browser lives under the run's scratch directory.
#[derive(Debug, Clone, Default)]
pub struct SetupBrowser {
    shell: ShellRunner,
}

impl SetupBrowser {
    pub fn new(shell: ShellRunner) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Action for SetupBrowser {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let name = required(params, "name")?;
        let version = params.non_empty("version").unwrap_or("stable");
        validate_token("name", name)?;
        validate_token("version", version)?;

        let (path, explicit) = match params.non_empty("path") {
            Some(path) => (env.working_dir().join(path), true),
            None => (
                env.scratch_dir()
                    .join("browsers")
                    .join(format!("{}-{}", name, version)),
                false,
            ),
        };

        if !explicit {
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| ActionError::Failed(format!("cannot create {}: {}", path.display(), e)))?;
        }

        let path_str = path.display().to_string();
        let output = match params.non_empty("install") {
            Some(script) => {
                self.shell
                    .run(
                        script,
                        env,
                        &[
                            ("BROWSER_NAME", name),
                            ("BROWSER_VERSION", version),
                            ("BROWSER_DIR", &path_str),
                        ],
                    )
                    .await?
            }
            None => format!("{} {} provisioned at {}\n", name, version, path_str),
        };

        if explicit && !path.exists() {
            return Err(ActionError::invalid(
                "path",
                format!("{} does not exist", path_str),
            ));
        }

        let bin_dir: PathBuf = if path.is_dir() {
            path.clone()
        } else {
            path.parent().map(PathBuf::from).unwrap_or_else(|| path.clone())
        };

        info!("Browser {} {} at {}", name, version, path_str);
        Ok(ActionOutcome::new(output)
            .with_mutation(EnvMutation::Install(Capability::Browser {
                name: name.to_string(),
                version: version.to_string(),
                path: path.clone(),
            }))
            .with_mutation(EnvMutation::set_var("BROWSER_PATH", path_str))
            .with_mutation(EnvMutation::AddPath(bin_dir)))
    }
}
