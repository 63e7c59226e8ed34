//! Core domain models for a pipeline run
//!
//! This module defines the fundamental data structures: trigger events,
//! pipelines and their steps, the per-run environment, and run results.

pub mod config;
pub mod environment;
pub mod pipeline;
pub mod result;
pub mod state;
pub mod step;
pub mod trigger;

pub use environment::*;
pub use pipeline::*;
pub use result::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
