//! Operation registry
//!
//! Steps name their transformation as a `module`/`function` pair; the
//! registry maps those names to callable operations. Registration happens
//! once at process start (built-ins plus whatever the embedding code adds),
//! so resolution is a pure lookup with no importing or reflection involved.

pub mod builtin;

use crate::core::data::Data;
use crate::core::error::EngineError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A registered transformation: takes a value, produces a value.
///
/// Operations are opaque to the engine; one that rejects its input surfaces
/// as an execution failure at call time, not at resolution time.
pub type Operation = Arc<dyn Fn(&Data) -> anyhow::Result<Data> + Send + Sync>;

/// Maps module name to function name to operation.
pub struct OperationRegistry {
    modules: BTreeMap<String, BTreeMap<String, Operation>>,
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in operation modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register an operation under `module.function`, replacing any previous
    /// registration with the same name
    pub fn register<F>(&mut self, module: &str, function: &str, op: F)
    where
        F: Fn(&Data) -> anyhow::Result<Data> + Send + Sync + 'static,
    {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), Arc::new(op));
    }

    /// Resolve `module.function` to its operation.
    ///
    /// Lookup only; repeated resolution of the same name always yields the
    /// same operation. Failure distinguishes an unknown module from an
    /// unknown function within a known module.
    pub fn resolve(&self, module: &str, function: &str) -> Result<Operation, EngineError> {
        let functions = self.modules.get(module).ok_or_else(|| EngineError::Resolution {
            module: module.to_string(),
            function: function.to_string(),
            reason: format!("module '{}' is not registered", module),
        })?;

        functions
            .get(function)
            .cloned()
            .ok_or_else(|| EngineError::Resolution {
                module: module.to_string(),
                function: function.to_string(),
                reason: format!("module '{}' has no function '{}'", module, function),
            })
    }

    /// All registered operations as sorted `(module, function)` pairs
    pub fn list(&self) -> Vec<(String, String)> {
        self.modules
            .iter()
            .flat_map(|(module, functions)| {
                functions
                    .keys()
                    .map(move |function| (module.clone(), function.clone()))
            })
            .collect()
    }

    /// Number of registered operations
    pub fn len(&self) -> usize {
        self.modules.values().map(|functions| functions.len()).sum()
    }

    /// Whether the registry has no operations
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.list())
            .finish()
    }
}
