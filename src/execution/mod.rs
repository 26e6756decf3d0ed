//! Pipeline execution engine

pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod generator;

pub use dispatcher::dispatch;
pub use engine::{EventHandler, PipelineRunner, RunEvent};
pub use executor::{StepExecutor, StepOutcome};
pub use generator::LazySequence;
