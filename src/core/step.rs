//! Step domain model

use crate::core::{config::StepConfig, state::StepState};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Action name used for inline `run:` steps
pub const RUN_ACTION: &str = "run";

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Position in the pipeline (zero-based)
    pub index: usize,

    /// Human-readable step name
    pub name: String,

    /// Name of the action this step invokes
    pub action: String,

    /// Parameters passed to the action
    pub params: StepParams,

    /// Retry policy applied by the action, if any
    pub retry: Option<RetryPolicy>,

    /// Runtime state
    pub state: StepState,
}

/// Retry policy for one step's action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(index: usize, config: &StepConfig) -> Self {
        let mut params = StepParams::from(config.params_as_string_map());
        let action = match (&config.uses, &config.run) {
            (Some(uses), _) => uses.clone(),
            (None, Some(script)) => {
                params.insert(RUN_ACTION, script.clone());
                RUN_ACTION.to_string()
            }
            // Rejected by validation
            (None, None) => RUN_ACTION.to_string(),
        };

        Step {
            index,
            name: config.name.clone(),
            action,
            params,
            retry: config.retry.map(|r| RetryPolicy {
                max_attempts: r.attempts,
                delay: Duration::from_secs(r.delay_secs),
            }),
            state: StepState::Pending,
        }
    }

    /// One-based position, as shown to users
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Mapping from option name to value for a step's action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParams(BTreeMap<String, String>);

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Non-empty value of a parameter
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Substitute `{{ NAME }}` placeholders from the given variables.
    /// Unknown placeholders are left as written.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> StepParams {
        StepParams(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), render_template(value, variables)))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for StepParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StepParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Render a template with variables in the form {{ NAME }}
pub fn render_template(template: &str, variables: &BTreeMap<String, String>) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
