//! Pipeline execution engine

pub mod engine;
pub mod executor;

pub use engine::{Dispatch, ExecutionEngine};
pub use executor::{EventHandler, ExecutionEvent, StepExecutor};
