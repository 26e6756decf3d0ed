//! Step executor
//!
//! Runs a single compiled step: resolves its input, applies the operation
//! according to the process mode (or streams the input through the
//! generator), and persists the result when the step has output storage.

use crate::core::config::{InputMode, ProcessMode};
use crate::core::data::Data;
use crate::core::error::EngineError;
use crate::core::step::{ExplicitInput, GeneratorSettings, OperationRef, Step};
use crate::execution::dispatcher::dispatch;
use crate::execution::generator::LazySequence;
use crate::ops::{Operation, OperationRegistry};
use crate::storage::DataStore;
use std::path::Path;
use tracing::debug;

/// What a step produced
#[derive(Debug)]
pub struct StepOutcome {
    /// The step's output value, fed to the next step
    pub data: Data,

    /// Generator yields during this step (0 for non-streaming steps)
    pub generator_yields: u64,
}

/// Executes steps against a registry and a store.
///
/// Borrowed per run by the pipeline driver; the yield cap applies to each
/// generator invocation separately.
pub struct StepExecutor<'a> {
    registry: &'a OperationRegistry,
    store: &'a mut DataStore,
    max_iterations: Option<u64>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        registry: &'a OperationRegistry,
        store: &'a mut DataStore,
        max_iterations: Option<u64>,
    ) -> Self {
        Self {
            registry,
            store,
            max_iterations,
        }
    }

    /// Execute one step: resolve input, process, persist output
    pub fn execute(&mut self, step: &Step, previous: &Data) -> Result<StepOutcome, EngineError> {
        debug!(
            step = %step.name,
            operation = %step.operation_label(),
            mode = ?step.process_mode,
            "executing step"
        );

        let input = self.resolve_input(step, previous)?;
        let (data, generator_yields) = self.process(step, input)?;

        if let Some(storage) = &step.output_storage {
            let metadata = serde_json::json!({
                "step": step.name,
                "operation": step.operation_label(),
            });
            self.store.store(&step.name, &data, storage, metadata)?;
        }

        Ok(StepOutcome {
            data,
            generator_yields,
        })
    }

    /// Resolve the step's input value. An explicit input always wins;
    /// otherwise the input mode decides.
    fn resolve_input(&self, step: &Step, previous: &Data) -> Result<Data, EngineError> {
        if let Some(explicit) = &step.explicit_input {
            return self.resolve_explicit(step, explicit);
        }

        match step.input_mode {
            InputMode::Previous | InputMode::Passthrough => Ok(previous.clone()),
            InputMode::Storage => {
                let config = step.input_storage.as_ref().ok_or_else(|| {
                    EngineError::Config(format!(
                        "step '{}' has input mode 'storage' without a descriptor",
                        step.name
                    ))
                })?;
                self.store.retrieve(&step.name, config)
            }
            InputMode::ExplicitInput => Err(EngineError::Config(format!(
                "step '{}' has input mode 'explicit_input' without a value",
                step.name
            ))),
        }
    }

    /// Resolve an explicit input. Strings are references: URLs pass
    /// through, existing `.json` files are parsed and substituted, other
    /// existing paths pass through as the path string, and missing paths
    /// are an error. Non-string values were already captured as data.
    fn resolve_explicit(
        &self,
        step: &Step,
        explicit: &ExplicitInput,
    ) -> Result<Data, EngineError> {
        match explicit {
            ExplicitInput::Literal(data) => Ok(data.clone()),
            ExplicitInput::Reference(text) => {
                if text.starts_with("http://") || text.starts_with("https://") {
                    return Ok(Data::Text(text.clone()));
                }

                let path = Path::new(text);
                if !path.exists() {
                    return Err(EngineError::NotFound(format!(
                        "explicit input path '{}' does not exist",
                        text
                    )));
                }

                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    let content = std::fs::read_to_string(path).map_err(|e| {
                        EngineError::Storage(format!("cannot read {}: {}", path.display(), e))
                    })?;
                    Data::parse_json(&content).map_err(|e| {
                        EngineError::execution(
                            step.name.as_str(),
                            "explicit_input",
                            format!("cannot parse {}: {}", path.display(), e),
                        )
                    })
                } else {
                    Ok(Data::Text(text.clone()))
                }
            }
        }
    }

    fn process(&mut self, step: &Step, input: Data) -> Result<(Data, u64), EngineError> {
        if let (Some(generator), Some(op_ref)) = (&step.generator, &step.operation) {
            match input {
                Data::List(items) => {
                    return self.run_generator(step, generator, op_ref, items);
                }
                other => {
                    debug!(
                        step = %step.name,
                        input = other.type_name(),
                        "generator enabled but input is not a sequence"
                    );
                    return Ok((self.apply_mode(step, other)?, 0));
                }
            }
        }
        Ok((self.apply_mode(step, input)?, 0))
    }

    /// Stream a sequence input: filter, cap, then apply the operation the
    /// configured number of times to each yielded item.
    fn run_generator(
        &mut self,
        step: &Step,
        settings: &GeneratorSettings,
        op_ref: &OperationRef,
        items: Vec<Data>,
    ) -> Result<(Data, u64), EngineError> {
        let op = self.registry.resolve(&op_ref.module, &op_ref.function)?;
        let mut sequence =
            LazySequence::new(items.into_iter(), settings.filter.clone(), self.max_iterations);

        let mut out = Vec::new();
        while let Some(item) = sequence.next() {
            let mut value = item?;
            // Diagnostics name the element's position in the source sequence,
            // not its post-filter emission index
            let position = sequence.consumed() - 1;
            for _ in 0..settings.applications {
                value = op(&value).map_err(|e| {
                    EngineError::execution(
                        step.name.as_str(),
                        format!("{}_item_{}", step.name, position),
                        e,
                    )
                })?;
            }
            out.push(value);
        }

        let yields = sequence.yielded();
        debug!(step = %step.name, yields, "generator drained");
        Ok((Data::List(out), yields))
    }

    fn apply_mode(&mut self, step: &Step, input: Data) -> Result<Data, EngineError> {
        match step.process_mode {
            ProcessMode::None => Ok(input),
            ProcessMode::Single => {
                let op = self.resolve_operation(step)?;
                op(&input)
                    .map_err(|e| EngineError::execution(step.name.as_str(), step.name.as_str(), e))
            }
            ProcessMode::Nested => {
                let op = self.resolve_operation(step)?;
                dispatch(&step.name, &op, &input)
            }
        }
    }

    fn resolve_operation(&self, step: &Step) -> Result<Operation, EngineError> {
        let op_ref = step.operation.as_ref().ok_or_else(|| {
            EngineError::Config(format!("step '{}' has no operation to apply", step.name))
        })?;
        self.registry.resolve(&op_ref.module, &op_ref.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{PipelineConfig, StorageConfig, StorageKind};
    use serde_json::json;

    fn step(yaml: &str) -> Step {
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        Step::from_config(&config.steps[0]).unwrap()
    }

    fn run(step: &Step, previous: Data, store: &mut DataStore) -> Result<StepOutcome, EngineError> {
        run_capped(step, previous, store, None)
    }

    fn run_capped(
        step: &Step,
        previous: Data,
        store: &mut DataStore,
        cap: Option<u64>,
    ) -> Result<StepOutcome, EngineError> {
        let registry = OperationRegistry::with_builtins();
        let mut executor = StepExecutor::new(&registry, store, cap);
        executor.execute(step, &previous)
    }

    fn scratch_store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_single_mode_sees_the_whole_value() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "label"
    module: "collection"
    function: "index_prefix"
    process_mode: "single"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::from_json(json!(["a", "b", "c"])), &mut store).unwrap();
        assert_eq!(
            outcome.data,
            Data::from_json(json!(["item_0_a", "item_1_b", "item_2_c"]))
        );
        assert_eq!(outcome.generator_yields, 0);
    }

    #[test]
    fn test_nested_mode_dispatches_structurally() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "grow"
    module: "math"
    function: "double"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(
            &step,
            Data::from_json(json!({"a": 1, "b": [2, 3]})),
            &mut store,
        )
        .unwrap();
        assert_eq!(outcome.data, Data::from_json(json!({"a": 2, "b": [4, 6]})));
    }

    #[test]
    fn test_none_mode_passes_through_without_resolving() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "skip"
    process_mode: "none"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let input = Data::from_json(json!({"untouched": true}));
        let outcome = run(&step, input.clone(), &mut store).unwrap();
        assert_eq!(outcome.data, input);
    }

    #[test]
    fn test_unknown_operation_is_a_resolution_error() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "s"
    module: "ghost"
    function: "vanish"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let err = run(&step, Data::from(1i64), &mut store).unwrap_err();
        assert!(matches!(err, EngineError::Resolution { .. }));
    }

    #[test]
    fn test_explicit_literal_overrides_previous() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "s"
    module: "core"
    function: "identity"
    process_mode: "single"
    explicit_input:
      fixed: 1
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::from("ignored"), &mut store).unwrap();
        assert_eq!(outcome.data, Data::from_json(json!({"fixed": 1})));
    }

    #[test]
    fn test_explicit_json_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.json");
        std::fs::write(&input_path, r#"{"v": 5}"#).unwrap();

        let yaml = format!(
            r#"
name: "t"
steps:
  - step_name: "s"
    module: "math"
    function: "double"
    explicit_input: "{}"
"#,
            input_path.display()
        );
        let step = step(&yaml);
        let (_scratch, mut store) = scratch_store();

        let outcome = run(&step, Data::Null, &mut store).unwrap();
        assert_eq!(outcome.data, Data::from_json(json!({"v": 10})));
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "s"
    module: "core"
    function: "identity"
    explicit_input: "/no/such/input.json"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let err = run(&step, Data::Null, &mut store).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_explicit_url_passes_through() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "s"
    module: "core"
    function: "identity"
    process_mode: "single"
    explicit_input: "https://example.com/data"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::Null, &mut store).unwrap();
        assert_eq!(outcome.data, Data::from("https://example.com/data"));
    }

    #[test]
    fn test_storage_input_reads_own_step_key() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "resume"
    module: "math"
    function: "double"
    input:
      mode: "storage"
      storage:
        type: "memory"
"#,
        );
        let (_dir, mut store) = scratch_store();
        let memory = StorageConfig {
            kind: StorageKind::Memory,
            format: "raw".to_string(),
            location: None,
        };
        store
            .store("resume", &Data::from(7i64), &memory, json!({}))
            .unwrap();

        let outcome = run(&step, Data::Null, &mut store).unwrap();
        assert_eq!(outcome.data, Data::from(14i64));
    }

    #[test]
    fn test_generator_filters_then_applies_once() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "stream"
    module: "math"
    function: "double"
    generator:
      enabled: true
      filter: "x > 5"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let input = Data::from_json(json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        let outcome = run(&step, input, &mut store).unwrap();
        assert_eq!(outcome.data, Data::from_json(json!([12, 14, 16, 18, 20])));
        assert_eq!(outcome.generator_yields, 5);
    }

    #[test]
    fn test_generator_applications_repeat_the_operation() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "stream"
    module: "math"
    function: "double"
    generator:
      enabled: true
      applications: 2
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::from_json(json!([1, 2, 3])), &mut store).unwrap();
        assert_eq!(outcome.data, Data::from_json(json!([4, 8, 12])));
    }

    #[test]
    fn test_generator_respects_the_cap() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "stream"
    module: "math"
    function: "double"
    generator:
      enabled: true
"#,
        );
        let (_dir, mut store) = scratch_store();

        let input = Data::from_json(json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        let outcome = run_capped(&step, input, &mut store, Some(3)).unwrap();
        assert_eq!(outcome.data, Data::from_json(json!([2, 4, 6])));
        assert_eq!(outcome.generator_yields, 3);
    }

    #[test]
    fn test_generator_failure_names_the_source_position() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "stream"
    module: "math"
    function: "increment"
    generator:
      enabled: true
      filter: "x > 5"
"#,
        );
        let (_dir, mut store) = scratch_store();

        // The first item is filtered out; the failing item sits at source
        // position 1 and must be reported there, not as the first emission
        let input = Data::List(vec![Data::from(1i64), Data::from(i64::MAX)]);
        let err = run(&step, input, &mut store).unwrap_err();
        match err {
            EngineError::Execution {
                context, message, ..
            } => {
                assert_eq!(context, "stream_item_1");
                assert!(message.contains("overflowed"));
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_generator_falls_back_on_non_sequence_input() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "stream"
    module: "math"
    function: "double"
    generator:
      enabled: true
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::from(4i64), &mut store).unwrap();
        assert_eq!(outcome.data, Data::from(8i64));
        assert_eq!(outcome.generator_yields, 0);
    }

    #[test]
    fn test_output_storage_persists_result() {
        let step = step(
            r#"
name: "t"
steps:
  - step_name: "keep"
    module: "math"
    function: "increment"
    output:
      storage:
        type: "memory"
"#,
        );
        let (_dir, mut store) = scratch_store();

        let outcome = run(&step, Data::from(41i64), &mut store).unwrap();
        assert_eq!(outcome.data, Data::from(42i64));

        let artifact = store.memory_artifact("keep").unwrap();
        assert_eq!(artifact.data, Data::from(42i64));
        assert_eq!(artifact.metadata["operation"], json!("math.increment"));
    }
}
