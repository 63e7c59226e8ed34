//! Runner environment - the mutable state shared by the steps of one run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// Something a step installed into the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    /// A language runtime, e.g. python 3.10
    Toolchain { name: String, version: String },
    /// A package-management tool, e.g. poetry 1.5
    PackageManager { name: String, version: String },
    /// Project dependencies installed by the named manager
    Dependencies { manager: String },
    /// A browser binary
    Browser {
        name: String,
        version: String,
        path: PathBuf,
    },
}

impl Capability {
    /// Installing a capability with the same identity replaces the old one
    fn same_identity(&self, other: &Capability) -> bool {
        match (self, other) {
            (Capability::Toolchain { name: a, .. }, Capability::Toolchain { name: b, .. }) => a == b,
            (Capability::PackageManager { .. }, Capability::PackageManager { .. }) => true,
            (Capability::Dependencies { .. }, Capability::Dependencies { .. }) => true,
            (Capability::Browser { name: a, .. }, Capability::Browser { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Toolchain { name, version } => write!(f, "toolchain {} {}", name, version),
            Capability::PackageManager { name, version } => {
                write!(f, "package manager {} {}", name, version)
            }
            Capability::Dependencies { manager } => write!(f, "dependencies ({})", manager),
            Capability::Browser { name, version, path } => {
                write!(f, "browser {} {} at {}", name, version, path.display())
            }
        }
    }
}

/// A change a step declares; applied only once the step has succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvMutation {
    SetVar { key: String, value: String },
    AddPath(PathBuf),
    Install(Capability),
}

impl EnvMutation {
    pub fn set_var(key: impl Into<String>, value: impl Into<String>) -> Self {
        EnvMutation::SetVar {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Why a runner was torn down underneath a running pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownReason {
    /// Operator abort
    Aborted,
    /// Maximum run duration exceeded
    TimedOut,
    /// The runner was released
    Released,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::Aborted => write!(f, "runner aborted"),
            TeardownReason::TimedOut => write!(f, "maximum run duration exceeded"),
            TeardownReason::Released => write!(f, "runner released"),
        }
    }
}

/// Per-run environment owned by exactly one runner lease
#[derive(Debug)]
pub struct Environment {
    id: Uuid,
    working_dir: PathBuf,
    scratch_dir: PathBuf,
    vars: BTreeMap<String, String>,
    path_entries: Vec<PathBuf>,
    capabilities: Vec<Capability>,
    teardown: watch::Receiver<Option<TeardownReason>>,
    deadline: Option<Instant>,
}

impl Environment {
    pub(crate) fn new(
        working_dir: PathBuf,
        scratch_dir: PathBuf,
        teardown: watch::Receiver<Option<TeardownReason>>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            working_dir,
            scratch_dir,
            vars: BTreeMap::new(),
            path_entries: Vec::new(),
            capabilities: Vec::new(),
            teardown,
            deadline,
        }
    }

    /// An environment that is never torn down. Useful for driving actions directly.
    pub fn standalone(working_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        let (_sender, receiver) = watch::channel(None);
        Self::new(working_dir.into(), scratch_dir.into(), receiver, None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Per-run temporary directory, removed when the runner is released
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn path_entries(&self) -> &[PathBuf] {
        &self.path_entries
    }

    /// Apply one declared mutation
    pub fn apply(&mut self, mutation: EnvMutation) {
        match mutation {
            EnvMutation::SetVar { key, value } => {
                self.vars.insert(key, value);
            }
            EnvMutation::AddPath(path) => {
                if !self.path_entries.contains(&path) {
                    self.path_entries.push(path);
                }
            }
            EnvMutation::Install(capability) => {
                self.capabilities.retain(|c| !c.same_identity(&capability));
                self.capabilities.push(capability);
            }
        }
    }

    /// Installed version of a toolchain
    pub fn toolchain(&self, name: &str) -> Option<&str> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::Toolchain { name: n, version } if n == name => Some(version.as_str()),
            _ => None,
        })
    }

    /// Name of the installed package manager
    pub fn package_manager(&self) -> Option<&str> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::PackageManager { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn dependencies_installed(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, Capability::Dependencies { .. }))
    }

    /// Path of an installed browser
    pub fn browser(&self, name: &str) -> Option<&Path> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::Browser { name: n, path, .. } if n == name => Some(path.as_path()),
            _ => None,
        })
    }

    /// Variables handed to child processes
    pub fn process_env(&self) -> BTreeMap<String, String> {
        let mut env = self.vars.clone();
        env.insert(
            "RUNNER_TEMP".to_string(),
            self.scratch_dir.display().to_string(),
        );

        if !self.path_entries.is_empty() {
            let inherited = std::env::var_os("PATH").unwrap_or_default();
            let paths = self
                .path_entries
                .iter()
                .cloned()
                .chain(std::env::split_paths(&inherited));
            if let Ok(joined) = std::env::join_paths(paths) {
                env.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
            }
        }

        env
    }

    /// Latest instant the run may continue until
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn tighten_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
    }

    /// Whether the runner has already been torn down
    pub fn teardown_reason(&self) -> Option<TeardownReason> {
        if let Some(reason) = *self.teardown.borrow() {
            return Some(reason);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TeardownReason::TimedOut),
            _ => None,
        }
    }

    /// Resolves when the runner is torn down; pends forever otherwise
    pub async fn torn_down(&self) -> TeardownReason {
        let mut teardown = self.teardown.clone();
        let signalled = async move {
            loop {
                if let Some(reason) = *teardown.borrow_and_update() {
                    return reason;
                }
                if teardown.changed().await.is_err() {
                    // Sender gone without a signal: nobody can tear us down anymore
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                reason = signalled => reason,
                _ = tokio::time::sleep_until(deadline) => TeardownReason::TimedOut,
            },
            None => signalled.await,
        }
    }
}
