//! Pipeline domain model

use crate::core::{
    config::{timeout_from_minutes, PipelineConfig},
    state::PipelineState,
    step::Step,
    trigger::TriggerEvent,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// A pipeline instantiated for one run
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Event that instantiated this pipeline
    pub trigger: Option<TriggerEvent>,

    /// Variables seeded into the environment before the first step
    pub variables: BTreeMap<String, String>,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Maximum run duration requested by the definition
    pub timeout: Option<Duration>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let steps: Vec<Step> = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step_config)| Step::from_config(index, step_config))
            .collect();

        Pipeline {
            name: config.name.clone(),
            trigger: None,
            variables: config.env_as_string_map(),
            state: PipelineState::new(steps.len()),
            steps,
            timeout: config.timeout_minutes.and_then(timeout_from_minutes),
        }
    }

    /// Record the event this run belongs to
    pub fn with_trigger(mut self, trigger: TriggerEvent) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Get a step by name (first match)
    pub fn step_named(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Check if pipeline reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.state.run.is_terminal()
    }
}
