//! Pipeline configuration from YAML

use crate::core::filter::Filter;
use crate::core::Pipeline;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Pipeline steps, executed in declaration order
    pub steps: Vec<StepConfig>,

    /// Yield budget for each generator invocation
    #[serde(default)]
    pub max_iterations: Option<u64>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub step_name: String,

    /// Operation module to resolve from the registry
    #[serde(default)]
    pub module: Option<String>,

    /// Operation function within the module
    #[serde(default)]
    pub function: Option<String>,

    /// How the step applies its operation to the input value
    #[serde(default)]
    pub process_mode: ProcessMode,

    /// Where the step's input comes from
    #[serde(default)]
    pub input: InputConfig,

    /// Where the step's output goes (in addition to the next step)
    #[serde(default)]
    pub output: OutputConfig,

    /// Literal input that overrides input resolution when present
    #[serde(default)]
    pub explicit_input: Option<serde_yaml::Value>,

    /// Streaming configuration for sequence inputs
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
}

/// How a step's operation is applied to its input
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// Pass the input through untouched; no operation is resolved
    None,
    /// Recursive structural traversal, applying at terminal positions
    #[default]
    Nested,
    /// Apply the operation once to the whole input value
    Single,
}

/// Input acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    /// Acquisition mode
    #[serde(default)]
    pub mode: InputMode,

    /// Storage descriptor, required when mode is `storage`
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

/// Where a step's input comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Output of the previous step (initial input for the first step)
    #[default]
    Previous,
    /// Same as `previous`; the value flows through input resolution unchanged
    Passthrough,
    /// Retrieve from the storage backend named by `input.storage`
    Storage,
    /// Use the step's `explicit_input` literal
    ExplicitInput,
}

/// Output disposition configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Storage descriptor to persist the step result to
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

/// A storage location: backend kind, data format, and optional path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(rename = "type")]
    pub kind: StorageKind,

    /// Format key for the converter registry ("raw" stores unconverted)
    #[serde(default = "default_format")]
    pub format: String,

    /// Target path for file storage; defaults to `<data dir>/<step name>`
    #[serde(default)]
    pub location: Option<PathBuf>,
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
    Database,
}

/// Generator (streaming) configuration for sequence inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Whether generator mode is active for this step
    #[serde(default)]
    pub enabled: bool,

    /// Optional filter expression over the bound item variable `x`
    #[serde(default)]
    pub filter: Option<String>,

    /// How many times the operation is applied to each yielded item
    #[serde(default = "default_applications")]
    pub applications: u32,
}

fn default_format() -> String {
    "raw".to_string()
}

fn default_applications() -> u32 {
    1
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        // Check that all step names are unique
        let mut seen_names = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen_names.insert(&step.step_name) {
                anyhow::bail!("Duplicate step name: {}", step.step_name);
            }
        }

        for step in &self.steps {
            // Operation identity is required unless the step passes through
            if step.process_mode != ProcessMode::None {
                if step.module.is_none() {
                    anyhow::bail!("Step '{}' is missing 'module'", step.step_name);
                }
                if step.function.is_none() {
                    anyhow::bail!("Step '{}' is missing 'function'", step.step_name);
                }
            }

            if step.input.mode == InputMode::Storage && step.input.storage.is_none() {
                anyhow::bail!(
                    "Step '{}' has input mode 'storage' but no input.storage descriptor",
                    step.step_name
                );
            }

            if step.input.mode == InputMode::ExplicitInput && step.explicit_input.is_none() {
                anyhow::bail!(
                    "Step '{}' has input mode 'explicit_input' but no explicit_input value",
                    step.step_name
                );
            }

            if let Some(generator) = &step.generator {
                if generator.enabled && step.process_mode == ProcessMode::None {
                    anyhow::bail!(
                        "Step '{}' enables a generator but its process_mode is 'none'; \
                         the generator would never run",
                        step.step_name
                    );
                }
                if let Some(expr) = &generator.filter {
                    if let Err(e) = Filter::parse(expr) {
                        anyhow::bail!(
                            "Step '{}' has an invalid generator filter: {}",
                            step.step_name,
                            e
                        );
                    }
                }
                if generator.applications == 0 {
                    anyhow::bail!(
                        "Step '{}' has generator.applications = 0; must be at least 1",
                        step.step_name
                    );
                }
            }
        }

        if self.max_iterations == Some(0) {
            anyhow::bail!("max_iterations must be greater than zero");
        }

        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline> {
        Pipeline::from_config(self)
    }
}
