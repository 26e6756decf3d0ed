//! datapipe - a configuration-driven data pipeline engine
//!
//! Pipelines are declared in YAML as an ordered list of steps. Each step
//! names an operation from the registry, says how to acquire its input,
//! how to traverse it, and where to persist its output. The runner drives
//! steps sequentially, threading each output into the next step's input.

pub mod cli;
pub mod core;
pub mod execution;
pub mod ops;
pub mod storage;

// Re-export commonly used types
pub use crate::core::config::PipelineConfig;
pub use crate::core::{Data, EngineError, ExecutionStatus, Pipeline, RunState, Step};
pub use crate::execution::{PipelineRunner, RunEvent};
pub use crate::ops::{Operation, OperationRegistry};
pub use crate::storage::DataStore;
