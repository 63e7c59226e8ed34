//! Runners - isolated execution contexts hosting one pipeline run each

pub mod provisioner;

pub use provisioner::{
    AbortHandle, LocalProvisioner, ProvisionError, Provisioner, ProvisionerConfig, RunnerLease,
};
