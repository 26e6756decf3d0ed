//! Pipeline domain model

use crate::core::config::PipelineConfig;
use crate::core::step::Step;
use anyhow::Result;

/// A pipeline definition: an ordered list of compiled steps.
///
/// Steps run strictly in declaration order; each step's output is the next
/// step's `previous` input.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Yield budget for each generator invocation
    pub max_iterations: Option<u64>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let steps = config
            .steps
            .iter()
            .map(Step::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Pipeline {
            name: config.name.clone(),
            steps,
            max_iterations: config.max_iterations,
        })
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
