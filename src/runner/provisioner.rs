//! Runner provisioning - ephemeral, isolated environments for single runs

use crate::core::{Environment, TeardownReason};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Error types for runner provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no runner capacity available (limit {limit})")]
    NoCapacity { limit: usize },

    #[error("working directory {} does not exist", .path.display())]
    WorkingDirectory { path: PathBuf },

    #[error("failed to create runner workspace {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Allocates and tears down runners
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Allocate a fresh runner: no capabilities, empty variable mapping
    async fn acquire(&self) -> Result<RunnerLease, ProvisionError>;

    /// Tear a runner down. Idempotent.
    async fn release(&self, lease: &mut RunnerLease);
}

/// Lets an operator tear a runner down while its pipeline is running
#[derive(Debug, Clone)]
pub struct AbortHandle {
    teardown: Arc<watch::Sender<Option<TeardownReason>>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        signal(&self.teardown, TeardownReason::Aborted);
    }
}

/// First signal wins
fn signal(sender: &watch::Sender<Option<TeardownReason>>, reason: TeardownReason) {
    sender.send_if_modified(|current| {
        if current.is_none() {
            *current = Some(reason);
            true
        } else {
            false
        }
    });
}

/// One provisioned runner hosting one pipeline run
#[derive(Debug)]
pub struct RunnerLease {
    id: Uuid,
    environment: Environment,
    teardown: Arc<watch::Sender<Option<TeardownReason>>>,
    permit: Option<OwnedSemaphorePermit>,
    released: bool,
}

impl RunnerLease {
    /// Build a lease around a freshly created scratch directory
    pub fn new(
        working_dir: PathBuf,
        scratch_dir: PathBuf,
        max_run_duration: Option<Duration>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        let (sender, receiver) = watch::channel(None);
        let deadline = max_run_duration.and_then(|d| Instant::now().checked_add(d));
        let environment = Environment::new(working_dir, scratch_dir, receiver, deadline);
        Self {
            id: environment.id(),
            environment,
            teardown: Arc::new(sender),
            permit,
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            teardown: self.teardown.clone(),
        }
    }

    /// Shorten the run's maximum duration; never extends an existing limit.
    /// A duration too large to form a deadline leaves the run unlimited.
    pub fn limit_duration(&mut self, max_run_duration: Duration) {
        if let Some(deadline) = Instant::now().checked_add(max_run_duration) {
            self.environment.tighten_deadline(deadline);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Signal teardown, delete the scratch directory and give back capacity.
    /// Returns false if the lease was already released.
    pub async fn teardown(&mut self) -> bool {
        if self.released {
            debug!("Runner {} already released", self.id);
            return false;
        }

        signal(&self.teardown, TeardownReason::Released);

        let scratch = self.environment.scratch_dir().to_path_buf();
        match tokio::fs::remove_dir_all(&scratch).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove runner workspace {}: {}", scratch.display(), e),
        }

        self.permit.take();
        self.released = true;
        true
    }
}

impl Drop for RunnerLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("Runner {} dropped without release, cleaning up", self.id);
            signal(&self.teardown, TeardownReason::Released);
            let _ = std::fs::remove_dir_all(self.environment.scratch_dir());
        }
    }
}

/// Settings for the local provisioner
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Project directory steps run in
    pub working_dir: PathBuf,

    /// Parent of the per-run scratch directories
    pub base_dir: PathBuf,

    /// Maximum number of runners alive at once
    pub max_concurrent_runs: usize,

    /// Maximum duration of one run
    pub max_run_duration: Option<Duration>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            base_dir: std::env::temp_dir().join("cirun"),
            max_concurrent_runs: 4,
            max_run_duration: None,
        }
    }
}

impl ProvisionerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_max_concurrent_runs(mut self, max: usize) -> Self {
        self.max_concurrent_runs = max;
        self
    }

    pub fn with_max_run_duration(mut self, duration: Duration) -> Self {
        self.max_run_duration = Some(duration);
        self
    }
}

/// Provisions runners on the local machine
///
/// Capacity is a semaphore: `acquire` never waits, it fails with
/// `ProvisionError::NoCapacity` when every permit is taken.
#[derive(Debug)]
pub struct LocalProvisioner {
    config: ProvisionerConfig,
    permits: Arc<Semaphore>,
}

impl LocalProvisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Self { config, permits }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Runners that can still be acquired
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn acquire(&self) -> Result<RunnerLease, ProvisionError> {
        if !self.config.working_dir.is_dir() {
            return Err(ProvisionError::WorkingDirectory {
                path: self.config.working_dir.clone(),
            });
        }

        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| ProvisionError::NoCapacity {
                limit: self.config.max_concurrent_runs,
            })?;

        let scratch_dir = self.config.base_dir.join(format!("run-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|source| ProvisionError::Workspace {
                path: scratch_dir.clone(),
                source,
            })?;

        let lease = RunnerLease::new(
            self.config.working_dir.clone(),
            scratch_dir,
            self.config.max_run_duration,
            Some(permit),
        );
        info!(
            "Provisioned runner {} ({})",
            lease.id(),
            lease.environment().scratch_dir().display()
        );
        Ok(lease)
    }

    async fn release(&self, lease: &mut RunnerLease) {
        if lease.teardown().await {
            info!("Released runner {}", lease.id());
        }
    }
}
