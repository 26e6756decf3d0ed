//! Step domain model

use crate::core::config::{InputMode, ProcessMode, StepConfig, StorageConfig};
use crate::core::data::Data;
use crate::core::filter::Filter;
use anyhow::{Context, Result};

/// A single step in a pipeline, compiled from its config.
///
/// Filter expressions are parsed here, once, so a malformed expression fails
/// pipeline construction instead of surfacing mid-run.
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub name: String,

    /// Operation to apply; `None` when the step passes data through
    pub operation: Option<OperationRef>,

    /// How the operation is applied to the input value
    pub process_mode: ProcessMode,

    /// Where the step's input comes from
    pub input_mode: InputMode,

    /// Storage descriptor for input mode `storage`
    pub input_storage: Option<StorageConfig>,

    /// Storage descriptor the result is persisted to, if any
    pub output_storage: Option<StorageConfig>,

    /// Literal input overriding input resolution
    pub explicit_input: Option<ExplicitInput>,

    /// Streaming behavior for sequence inputs, when enabled
    pub generator: Option<GeneratorSettings>,
}

/// A registry address: which operation the step invokes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    pub module: String,
    pub function: String,
}

impl OperationRef {
    /// Display label, e.g. `math.double`
    pub fn label(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }
}

/// Explicit input, resolved from the config literal
#[derive(Debug, Clone)]
pub enum ExplicitInput {
    /// String literal; may name a file (resolved when the step runs) or a URL
    Reference(String),
    /// Structured literal carried directly as pipeline data
    Literal(Data),
}

/// Compiled generator settings (only present when enabled in config)
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Item filter, applied before the operation
    pub filter: Option<Filter>,

    /// Operation applications per yielded item
    pub applications: u32,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig) -> Result<Self> {
        let operation = match config.process_mode {
            ProcessMode::None => None,
            _ => match (&config.module, &config.function) {
                (Some(module), Some(function)) => Some(OperationRef {
                    module: module.clone(),
                    function: function.clone(),
                }),
                // Unreachable after PipelineConfig::validate, but harmless
                _ => None,
            },
        };

        let explicit_input = match &config.explicit_input {
            Some(serde_yaml::Value::String(s)) => Some(ExplicitInput::Reference(s.clone())),
            Some(value) => {
                let json = serde_json::to_value(value).with_context(|| {
                    format!(
                        "Step '{}' has an explicit_input that is not plain data",
                        config.step_name
                    )
                })?;
                Some(ExplicitInput::Literal(Data::from_json(json)))
            }
            None => None,
        };

        let generator = match &config.generator {
            Some(g) if g.enabled => {
                let filter = match &g.filter {
                    Some(expr) => Some(Filter::parse(expr).with_context(|| {
                        format!("Step '{}' has an invalid generator filter", config.step_name)
                    })?),
                    None => None,
                };
                Some(GeneratorSettings {
                    filter,
                    applications: g.applications,
                })
            }
            _ => None,
        };

        Ok(Step {
            name: config.step_name.clone(),
            operation,
            process_mode: config.process_mode,
            input_mode: config.input.mode,
            input_storage: config.input.storage.clone(),
            output_storage: config.output.storage.clone(),
            explicit_input,
            generator,
        })
    }

    /// Display label for the step's operation, e.g. `math.double`
    pub fn operation_label(&self) -> String {
        self.operation
            .as_ref()
            .map(|op| op.label())
            .unwrap_or_else(|| "(passthrough)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;

    fn step_from(yaml: &str) -> Step {
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        Step::from_config(&config.steps[0]).unwrap()
    }

    #[test]
    fn test_from_config_defaults() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "double"
    module: "math"
    function: "double"
"#,
        );

        assert_eq!(step.name, "double");
        assert_eq!(step.operation_label(), "math.double");
        assert_eq!(step.process_mode, ProcessMode::Nested);
        assert_eq!(step.input_mode, InputMode::Previous);
        assert!(step.generator.is_none());
        assert!(step.explicit_input.is_none());
    }

    #[test]
    fn test_passthrough_step_has_no_operation() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "pass"
    process_mode: "none"
"#,
        );

        assert!(step.operation.is_none());
        assert_eq!(step.operation_label(), "(passthrough)");
    }

    #[test]
    fn test_disabled_generator_is_dropped() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "s"
    module: "math"
    function: "double"
    generator:
      enabled: false
      filter: "x > 5"
"#,
        );

        assert!(step.generator.is_none());
    }

    #[test]
    fn test_enabled_generator_compiles_filter() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "s"
    module: "math"
    function: "double"
    generator:
      enabled: true
      filter: "x > 5"
      applications: 2
"#,
        );

        let generator = step.generator.unwrap();
        assert_eq!(generator.applications, 2);
        assert_eq!(generator.filter.unwrap().raw(), "x > 5");
    }

    #[test]
    fn test_explicit_input_string_is_a_reference() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "s"
    module: "core"
    function: "identity"
    explicit_input: "data/input.json"
"#,
        );

        match step.explicit_input.unwrap() {
            ExplicitInput::Reference(path) => assert_eq!(path, "data/input.json"),
            other => panic!("expected a reference, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_input_mapping_is_a_literal() {
        let step = step_from(
            r#"
name: "Test"
steps:
  - step_name: "s"
    module: "core"
    function: "identity"
    explicit_input:
      key1: "value1"
      key2: 2
"#,
        );

        match step.explicit_input.unwrap() {
            ExplicitInput::Literal(Data::Map(map)) => {
                assert_eq!(map.get("key1"), Some(&Data::from("value1")));
                assert_eq!(map.get("key2"), Some(&Data::from(2i64)));
            }
            other => panic!("expected a literal mapping, got {:?}", other),
        }
    }
}
