//! Main execution engine - takes an event from trigger to released runner

use crate::{
    action::ActionRegistry,
    core::{config::PipelineConfig, RunResult, TriggerEvaluator, TriggerEvent},
    execution::{ExecutionEvent, StepExecutor},
    runner::{ProvisionError, Provisioner, RunnerLease},
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What happened to an event
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// No definition matched; nothing was provisioned
    Ignored { event: TriggerEvent },
    /// A run was executed and its runner released
    Completed(RunResult),
}

impl Dispatch {
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Dispatch::Completed(result) => Some(result),
            Dispatch::Ignored { .. } => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Dispatch::Ignored { .. })
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine<P> {
    provisioner: P,
    executor: StepExecutor,
    variables: BTreeMap<String, String>,
}

impl<P: Provisioner> ExecutionEngine<P> {
    pub fn new(provisioner: P, registry: ActionRegistry) -> Self {
        Self {
            provisioner,
            executor: StepExecutor::new(registry),
            variables: BTreeMap::new(),
        }
    }

    /// Variables that override the definition's `env` for every run
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.executor.add_event_handler(handler);
    }

    /// Run the first definition whose trigger accepts `event`
    pub async fn dispatch(
        &self,
        definitions: &[PipelineConfig],
        event: &TriggerEvent,
    ) -> Result<Dispatch, ProvisionError> {
        self.dispatch_with(definitions, event, |_| {}).await
    }

    /// Like [`dispatch`](Self::dispatch), handing the fresh lease to
    /// `on_provisioned` before the first step runs (e.g. to keep its abort handle)
    pub async fn dispatch_with<F>(
        &self,
        definitions: &[PipelineConfig],
        event: &TriggerEvent,
        on_provisioned: F,
    ) -> Result<Dispatch, ProvisionError>
    where
        F: FnOnce(&RunnerLease),
    {
        let Some(definition) = TriggerEvaluator::new(definitions).evaluate(event) else {
            info!("No pipeline accepts {}, ignoring", event);
            return Ok(Dispatch::Ignored {
                event: event.clone(),
            });
        };

        info!("Pipeline '{}' accepts {}", definition.name, event);
        let mut lease = self.provisioner.acquire().await?;
        on_provisioned(&lease);

        let result = self.run_on(definition, event, &mut lease).await;

        self.provisioner.release(&mut lease).await;
        if !lease.is_released() {
            warn!("Runner {} still alive after release", lease.id());
        }

        Ok(Dispatch::Completed(result))
    }

    async fn run_on(
        &self,
        definition: &PipelineConfig,
        event: &TriggerEvent,
        lease: &mut RunnerLease,
    ) -> RunResult {
        let mut pipeline = definition.to_pipeline().with_trigger(event.clone());
        pipeline
            .variables
            .extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(timeout) = pipeline.timeout {
            lease.limit_duration(timeout);
        }

        self.executor
            .execute(&mut pipeline, lease.environment_mut())
            .await
    }
}
