//! Database backend interface for pipeline data
//!
//! The store talks to databases through this narrow trait: write a JSON
//! document for a step, read the latest one back. Data crosses the boundary
//! as `serde_json::Value`, so JSON-serializability is enforced before a
//! backend ever sees the payload.

use crate::core::error::EngineError;
use chrono::{DateTime, Utc};
use std::cell::RefCell;

/// Backend that persists step data as JSON documents
pub trait PipelineDatabase {
    /// Store a data document (and optional metadata) for a step
    fn store_pipeline_data(
        &self,
        step_name: &str,
        data: &serde_json::Value,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), EngineError>;

    /// Fetch the most recently stored data document for a step
    fn get_pipeline_data(&self, step_name: &str) -> Result<Option<serde_json::Value>, EngineError>;
}

/// One stored row
#[derive(Debug, Clone)]
struct DataRow {
    step_name: String,
    data: serde_json::Value,
    #[allow(dead_code)]
    metadata: Option<serde_json::Value>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// In-memory database for tests and ephemeral runs.
///
/// Append-only like the real backend; `get` returns the latest row for a
/// step. Interior mutability keeps the trait `&self` for parity with
/// connection-based backends.
pub struct InMemoryDatabase {
    rows: RefCell<Vec<DataRow>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
        }
    }

    /// Total number of stored rows
    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineDatabase for InMemoryDatabase {
    fn store_pipeline_data(
        &self,
        step_name: &str,
        data: &serde_json::Value,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), EngineError> {
        self.rows.borrow_mut().push(DataRow {
            step_name: step_name.to_string(),
            data: data.clone(),
            metadata: metadata.cloned(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn get_pipeline_data(&self, step_name: &str) -> Result<Option<serde_json::Value>, EngineError> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .rev()
            .find(|row| row.step_name == step_name)
            .map(|row| row.data.clone()))
    }
}
