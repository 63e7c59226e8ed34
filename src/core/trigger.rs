//! Trigger events and the evaluator that decides whether a pipeline runs

use crate::core::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Kind of version-control event that can start a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" => Ok(EventKind::PullRequest),
            other => Err(format!("Unknown event kind: {}", other)),
        }
    }
}

/// An incoming event descriptor. Immutable once fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub branch: String,
}

impl TriggerEvent {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            branch: branch.into(),
        }
    }

    pub fn push(branch: impl Into<String>) -> Self {
        Self::new(EventKind::Push, branch)
    }

    pub fn pull_request(branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, branch)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.kind, self.branch)
    }
}

/// Branch filter for one event kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFilter {
    #[serde(default)]
    pub branches: BTreeSet<String>,
}

impl BranchFilter {
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: branches.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact match against the configured branch set
    pub fn matches(&self, branch: &str) -> bool {
        self.branches.contains(branch)
    }
}

/// The `on:` section of a pipeline definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<BranchFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<BranchFilter>,
}

impl TriggerFilter {
    /// Filter for a given event kind, if that kind is configured at all
    pub fn for_kind(&self, kind: EventKind) -> Option<&BranchFilter> {
        match kind {
            EventKind::Push => self.push.as_ref(),
            EventKind::PullRequest => self.pull_request.as_ref(),
        }
    }

    pub fn accepts(&self, event: &TriggerEvent) -> bool {
        self.for_kind(event.kind)
            .is_some_and(|filter| filter.matches(&event.branch))
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.pull_request.is_none()
    }
}

/// Picks the pipeline definition (if any) an event should instantiate
pub struct TriggerEvaluator<'a> {
    definitions: &'a [PipelineConfig],
}

impl<'a> TriggerEvaluator<'a> {
    pub fn new(definitions: &'a [PipelineConfig]) -> Self {
        Self { definitions }
    }

    /// Zero or one pipeline per event; the first matching definition wins.
    /// A mismatch is not an error.
    pub fn evaluate(&self, event: &TriggerEvent) -> Option<&'a PipelineConfig> {
        let selected = self
            .definitions
            .iter()
            .find(|definition| definition.on.accepts(event));

        match selected {
            Some(definition) => {
                debug!("Event {} selected pipeline '{}'", event, definition.name);
            }
            None => {
                debug!("Event {} matched no pipeline, ignoring", event);
            }
        }

        selected
    }
}
