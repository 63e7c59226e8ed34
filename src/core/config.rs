//! Pipeline configuration from YAML

use crate::core::{trigger::TriggerFilter, Pipeline};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Longest run duration a pipeline or the CLI may ask for (one week)
pub const MAX_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Convert a timeout in minutes, or `None` if it cannot be represented
pub fn timeout_from_minutes(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}

/// Top-level pipeline definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Events that start this pipeline
    #[serde(default)]
    pub on: TriggerFilter,

    /// Variables seeded into the environment before the first step
    #[serde(default)]
    env: BTreeMap<String, Value>,

    /// Maximum duration of one run, enforced by the runner
    #[serde(default)]
    pub timeout_minutes: Option<u64>,

    /// Pipeline steps, executed in declaration order
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name
    pub name: String,

    /// Builtin action to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Inline shell script (shorthand for `uses: run`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Action parameters
    #[serde(default)]
    pub with: BTreeMap<String, Value>,

    /// Retry policy for the step's action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

/// Retry policy configuration, applied by the action itself
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Delay between attempts (in seconds)
    #[serde(default)]
    pub delay_secs: u64,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid pipeline {}", path.display()))
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.on.is_empty() {
            anyhow::bail!("Pipeline '{}' has no trigger events", self.name);
        }
        for (kind, filter) in [("push", &self.on.push), ("pull_request", &self.on.pull_request)] {
            if let Some(filter) = filter {
                if filter.branches.is_empty() {
                    anyhow::bail!(
                        "Pipeline '{}' trigger '{}' lists no branches",
                        self.name,
                        kind
                    );
                }
            }
        }

        match self.timeout_minutes {
            Some(0) => anyhow::bail!("Pipeline '{}' timeout_minutes must be positive", self.name),
            Some(minutes) if minutes > MAX_TIMEOUT_MINUTES => anyhow::bail!(
                "Pipeline '{}' timeout_minutes must be at most {}",
                self.name,
                MAX_TIMEOUT_MINUTES
            ),
            _ => {}
        }

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            if step.name.trim().is_empty() {
                anyhow::bail!("Step {} has an empty name", number);
            }

            match (&step.uses, &step.run) {
                (Some(_), Some(_)) => anyhow::bail!(
                    "Step {} ('{}') sets both 'uses' and 'run'",
                    number,
                    step.name
                ),
                (None, None) => anyhow::bail!(
                    "Step {} ('{}') must set either 'uses' or 'run'",
                    number,
                    step.name
                ),
                (Some(uses), None) if uses.trim().is_empty() => {
                    anyhow::bail!("Step {} ('{}') has an empty 'uses'", number, step.name)
                }
                _ => {}
            }

            if let Some(retry) = &step.retry {
                if retry.attempts == 0 {
                    anyhow::bail!(
                        "Step {} ('{}') retry attempts must be at least 1",
                        number,
                        step.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Pipeline-level variables rendered as strings
    pub fn env_as_string_map(&self) -> BTreeMap<String, String> {
        stringify_map(&self.env)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

impl StepConfig {
    /// Parameters rendered as strings
    pub fn params_as_string_map(&self) -> BTreeMap<String, String> {
        stringify_map(&self.with)
    }
}

fn stringify_map(values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(key, value)| (key.clone(), value_to_string(value)))
        .collect()
}

/// Scalars keep their literal form; anything else falls back to YAML text
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
