//! Shell subprocess runner used by the builtin actions

use crate::action::ActionError;
use crate::core::Environment;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs scripts through a shell inside a runner environment
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Shell executable, invoked as `<shell> -c <script>`
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run a script in the environment's working directory and capture its output
    ///
    /// The child sees the environment's variables plus `extra_env`. It is killed
    /// if the returned future is dropped, so a torn-down runner leaves no
    /// processes behind.
    ///
    /// # Errors
    /// - `ActionError::Spawn` if the shell cannot be started
    /// - `ActionError::CommandFailed` if the script exits non-zero; the error
    ///   carries the captured stdout and stderr
    pub async fn run(
        &self,
        script: &str,
        env: &Environment,
        extra_env: &[(&str, &str)],
    ) -> Result<String, ActionError> {
        debug!("Running `{}` in {}", script, env.working_dir().display());

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .current_dir(env.working_dir())
            .envs(env.process_env())
            .envs(extra_env.iter().copied())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ActionError::Spawn {
                command: script.to_string(),
                reason: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!("`{}` exited with code {}", script, code);
            return Err(ActionError::CommandFailed {
                command: script.to_string(),
                code,
                output: combined,
            });
        }

        debug!("`{}` returned {} bytes of output", script, combined.len());
        Ok(combined)
    }
}
