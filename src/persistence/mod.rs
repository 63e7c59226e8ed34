//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{RunResult, TriggerEvent};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Event that started the run
    pub trigger: Option<TriggerEvent>,

    /// Final status
    pub status: ExecutionStatus,

    /// One-based number of the failing step
    pub failed_step: Option<usize>,

    /// Name of the failing step
    pub failed_step_name: Option<String>,

    /// Error that stopped the run
    pub error: Option<String>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Total number of steps
    pub total_steps: usize,
}

impl RunSummary {
    /// Fraction of steps completed (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save (or overwrite) a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// Runs of one pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// Most recent runs of any pipeline, newest first
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>>;

    /// List all pipeline names with recorded runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
    by_pipeline: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(runs: &mut [RunSummary]) {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        let existed = runs.insert(run.run_id, run.clone()).is_some();

        if !existed {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(run.pipeline_name.clone())
                .or_default()
                .push(run.run_id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<RunSummary> = by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        newest_first(&mut result);
        Ok(result)
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs.values().cloned().collect();
        newest_first(&mut result);
        result.truncate(limit);
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(result: &RunResult) -> RunSummary {
    let failure = result.failure.as_ref();
    RunSummary {
        run_id: result.run_id,
        pipeline_name: result.pipeline_name.clone(),
        trigger: result.trigger.clone(),
        status: if result.is_success() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        },
        failed_step: failure.map(|f| f.step_number()),
        failed_step_name: failure.map(|f| f.name.clone()),
        error: failure.map(|f| f.error.to_string()),
        started_at: result.started_at,
        completed_at: Some(result.finished_at),
        completed_steps: result.completed_steps(),
        total_steps: result.steps.len(),
    }
}
