//! Action error types

use crate::core::TeardownReason;
use thiserror::Error;

/// Error types for action invocations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("requires {0}")]
    MissingCapability(String),

    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("command exited with code {code}: {command}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("cancelled: {0}")]
    Cancelled(TeardownReason),

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// Diagnostic output captured before the failure
    pub fn output(&self) -> &str {
        match self {
            ActionError::CommandFailed { output, .. } => output,
            _ => "",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled(_))
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ActionError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
