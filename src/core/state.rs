//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing steps
    Running,
    /// Run completed successfully
    Completed,
    /// Run failed
    Failed,
}

/// State of a single pipeline run.
///
/// Created when a run begins, mutated as steps complete, dropped when the
/// run ends. `items_yielded` accumulates generator yields across the whole
/// run; the per-invocation yield cap lives in the generator itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps in the pipeline
    pub total_steps: usize,

    /// Number of steps completed so far
    pub completed_steps: usize,

    /// Total generator items yielded across the run
    pub items_yielded: u64,

    /// Yield budget applied to each generator invocation
    pub max_iterations: Option<u64>,
}

impl RunState {
    /// Create a new, not-yet-started run state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            items_yielded: 0,
            max_iterations: None,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self, total_steps: usize, max_iterations: Option<u64>) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
        self.max_iterations = max_iterations;
    }

    /// Record a completed step
    pub fn step_completed(&mut self) {
        self.completed_steps += 1;
    }

    /// Record generator yields from one invocation
    pub fn record_yields(&mut self, count: u64) {
        self.items_yielded += count;
    }

    /// Mark the run as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as failed
    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Progress fraction (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut state = RunState::new();
        assert_eq!(state.status, ExecutionStatus::Pending);
        assert!(state.started_at.is_none());

        state.start(3, Some(100));
        assert_eq!(state.status, ExecutionStatus::Running);
        assert!(state.started_at.is_some());
        assert_eq!(state.max_iterations, Some(100));

        state.step_completed();
        state.step_completed();
        assert_eq!(state.completed_steps, 2);

        state.complete();
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_progress() {
        let mut state = RunState::new();
        assert_eq!(state.progress(), 0.0);

        state.start(4, None);
        state.step_completed();
        assert_eq!(state.progress(), 0.25);
    }

    #[test]
    fn test_yield_accounting() {
        let mut state = RunState::new();
        state.record_yields(5);
        state.record_yields(3);
        assert_eq!(state.items_yielded, 8);
    }
}
