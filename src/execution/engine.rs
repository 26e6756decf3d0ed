//! Pipeline runner
//!
//! Drives a pipeline from first step to last, threading each step's output
//! into the next step's input. Execution is strictly sequential; the first
//! step failure aborts the run and side effects of already completed steps
//! are kept.

use crate::core::data::Data;
use crate::core::error::EngineError;
use crate::core::pipeline::Pipeline;
use crate::core::state::{ExecutionStatus, RunState};
use crate::execution::executor::StepExecutor;
use crate::ops::OperationRegistry;
use crate::storage::DataStore;
use std::path::Path;
use tracing::{error, info};
use uuid::Uuid;

/// Events emitted during a pipeline run
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step_name: String,
        index: usize,
        total: usize,
    },
    StepCompleted {
        step_name: String,
        index: usize,
        total: usize,
    },
    StepFailed {
        step_name: String,
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Box<dyn Fn(&RunEvent)>;

/// Runs pipelines against a fixed operation registry and data store.
///
/// The runner is single threaded: steps execute one at a time, in order,
/// on the calling thread.
pub struct PipelineRunner {
    registry: OperationRegistry,
    store: DataStore,
    handlers: Vec<EventHandler>,
    last_run: Option<RunState>,
}

impl PipelineRunner {
    pub fn new(registry: OperationRegistry, store: DataStore) -> Self {
        Self {
            registry,
            store,
            handlers: Vec::new(),
            last_run: None,
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&RunEvent) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Registered operations
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// The backing data store
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// State of the most recent run, if any
    pub fn last_run(&self) -> Option<&RunState> {
        self.last_run.as_ref()
    }

    fn emit(&self, event: &RunEvent) {
        for handler in &self.handlers {
            handler(event);
        }
    }

    /// Execute the pipeline with the given initial value.
    ///
    /// Returns the final step's output. On failure the error of the failing
    /// step is returned and no later step is started; outputs already
    /// persisted by earlier steps stay in the store.
    pub fn run(&mut self, pipeline: &Pipeline, initial: Data) -> Result<Data, EngineError> {
        let mut state = RunState::new();
        state.start(pipeline.len(), pipeline.max_iterations);
        let run_id = state.run_id;
        let total = pipeline.len();

        info!(
            run_id = %run_id,
            pipeline = %pipeline.name,
            steps = total,
            "starting pipeline run"
        );
        self.emit(&RunEvent::RunStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: total,
        });

        let mut current = initial;
        for (index, step) in pipeline.steps.iter().enumerate() {
            self.emit(&RunEvent::StepStarted {
                step_name: step.name.clone(),
                index,
                total,
            });

            let result = {
                let mut executor =
                    StepExecutor::new(&self.registry, &mut self.store, state.max_iterations);
                executor.execute(step, &current)
            };

            match result {
                Ok(outcome) => {
                    state.step_completed();
                    state.record_yields(outcome.generator_yields);
                    current = outcome.data;
                    self.emit(&RunEvent::StepCompleted {
                        step_name: step.name.clone(),
                        index,
                        total,
                    });
                }
                Err(e) => {
                    state.fail();
                    error!(step = %step.name, error = %e, "step failed, aborting run");
                    self.emit(&RunEvent::StepFailed {
                        step_name: step.name.clone(),
                        error: e.to_string(),
                    });
                    self.emit(&RunEvent::RunCompleted {
                        run_id,
                        status: ExecutionStatus::Failed,
                    });
                    self.last_run = Some(state);
                    return Err(e);
                }
            }
        }

        state.complete();
        info!(
            run_id = %run_id,
            steps = state.completed_steps,
            items_yielded = state.items_yielded,
            "pipeline run completed"
        );
        self.emit(&RunEvent::RunCompleted {
            run_id,
            status: ExecutionStatus::Completed,
        });
        self.last_run = Some(state);

        Ok(current)
    }

    /// Execute the pipeline and write the final output as pretty JSON
    pub fn run_to_file(
        &mut self,
        pipeline: &Pipeline,
        initial: Data,
        path: &Path,
    ) -> Result<Data, EngineError> {
        let output = self.run(pipeline, initial)?;
        let text = output.to_json_pretty()?;
        std::fs::write(path, text).map_err(|e| {
            EngineError::Storage(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "run output written");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn runner() -> (tempfile::TempDir, PipelineRunner) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        let runner = PipelineRunner::new(OperationRegistry::with_builtins(), store);
        (dir, runner)
    }

    fn pipeline(yaml: &str) -> Pipeline {
        PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap()
    }

    #[test]
    fn test_run_chains_step_outputs() {
        let pipeline = pipeline(
            r#"
name: "chain"
steps:
  - step_name: "bump"
    module: "math"
    function: "increment"
  - step_name: "grow"
    module: "math"
    function: "double"
"#,
        );
        let (_dir, mut runner) = runner();

        let output = runner.run(&pipeline, Data::from(5i64)).unwrap();
        assert_eq!(output, Data::from(12i64));

        let state = runner.last_run().unwrap();
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert_eq!(state.completed_steps, 2);
    }

    #[test]
    fn test_empty_pipeline_returns_initial() {
        let pipeline = pipeline(
            r#"
name: "empty"
steps: []
"#,
        );
        let (_dir, mut runner) = runner();

        let input = Data::from_json(json!({"seed": 1}));
        let output = runner.run(&pipeline, input.clone()).unwrap();
        assert_eq!(output, input);
        assert_eq!(
            runner.last_run().unwrap().status,
            ExecutionStatus::Completed
        );
    }

    #[test]
    fn test_first_failure_aborts_and_keeps_earlier_outputs() {
        let pipeline = pipeline(
            r#"
name: "brittle"
steps:
  - step_name: "first"
    module: "math"
    function: "double"
    output:
      storage:
        type: "memory"
  - step_name: "bad"
    module: "ghost"
    function: "vanish"
  - step_name: "after"
    module: "math"
    function: "double"
"#,
        );
        let (_dir, mut runner) = runner();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        runner.add_event_handler(move |e| sink.borrow_mut().push(e.clone()));

        let err = runner.run(&pipeline, Data::from(3i64)).unwrap_err();
        assert!(matches!(err, EngineError::Resolution { .. }));

        // the first step's persisted output survives the abort
        let artifact = runner.store().memory_artifact("first").unwrap();
        assert_eq!(artifact.data, Data::from(6i64));

        // the step after the failure never started
        let started: Vec<String> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RunEvent::StepStarted { step_name, .. } => Some(step_name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["first", "bad"]);

        assert!(events
            .borrow()
            .iter()
            .any(|e| matches!(e, RunEvent::StepFailed { step_name, .. } if step_name == "bad")));
        assert_eq!(runner.last_run().unwrap().status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_generator_yields_are_accumulated() {
        let pipeline = pipeline(
            r#"
name: "stream"
steps:
  - step_name: "filtered"
    module: "math"
    function: "double"
    generator:
      enabled: true
      filter: "x > 5"
"#,
        );
        let (_dir, mut runner) = runner();

        let input = Data::from_json(json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        let output = runner.run(&pipeline, input).unwrap();
        assert_eq!(output, Data::from_json(json!([12, 14, 16, 18, 20])));
        assert_eq!(runner.last_run().unwrap().items_yielded, 5);
    }

    #[test]
    fn test_run_to_file_writes_pretty_json() {
        let pipeline = pipeline(
            r#"
name: "out"
steps:
  - step_name: "bump"
    module: "math"
    function: "increment"
"#,
        );
        let (dir, mut runner) = runner();
        let out_path = dir.path().join("result.json");

        runner
            .run_to_file(&pipeline, Data::from(1i64), &out_path)
            .unwrap();

        let text = std::fs::read_to_string(&out_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!(2));
    }
}
