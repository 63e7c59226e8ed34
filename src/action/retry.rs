//! Retry decorator for flaky collaborators
//!
//! Retries belong to the collaborator, not to the executor: the registry wraps
//! an action in `RetryingAction` when its step declares a retry policy.

use crate::action::{Action, ActionError, ActionOutcome};
use crate::core::{Environment, RetryPolicy, StepParams};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct RetryingAction {
    inner: Arc<dyn Action>,
    policy: RetryPolicy,
}

impl RetryingAction {
    pub fn new(inner: Arc<dyn Action>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Action for RetryingAction {
    async fn run(&self, params: &StepParams, env: &Environment) -> Result<ActionOutcome, ActionError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.run(params, env).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) if error.is_cancelled() || attempt >= max_attempts => return Err(error),
                Err(error) => {
                    warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max_attempts, error, self.policy.delay
                    );
                    attempt += 1;
                    if !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }
    }
}
