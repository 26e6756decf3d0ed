//! Recursive structural traversal
//!
//! Walks a nested value depth-first and applies a step's operation at the
//! right positions: mappings are recursed into, sequence elements each get
//! the operation directly (one level, no recursion into elements), a string
//! naming an existing directory triggers a file walk, and everything else
//! is a terminal. The output mirrors the input's structure.

use crate::core::data::Data;
use crate::core::error::EngineError;
use crate::ops::Operation;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Apply `op` to `data` following the structural traversal rules.
///
/// Any failure (operation error, unreadable file, unparsable JSON) aborts
/// the whole traversal with a step-scoped execution error naming where in
/// the structure it happened.
pub fn dispatch(step_name: &str, op: &Operation, data: &Data) -> Result<Data, EngineError> {
    walk_value(step_name, op, data, step_name)
}

fn walk_value(
    step_name: &str,
    op: &Operation,
    data: &Data,
    context: &str,
) -> Result<Data, EngineError> {
    match data {
        Data::Map(map) => {
            let mut out = BTreeMap::new();
            for (key, value) in map {
                let child_context = format!("{}.{}", context, key);
                out.insert(
                    key.clone(),
                    walk_value(step_name, op, value, &child_context)?,
                );
            }
            Ok(Data::Map(out))
        }
        Data::List(items) => {
            // Elements get the operation directly; no recursion into them
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let element_context = format!("{}_item_{}", context, i);
                let result = op(item).map_err(|e| {
                    EngineError::execution(step_name, &element_context, e)
                })?;
                out.push(result);
            }
            Ok(Data::List(out))
        }
        Data::Text(text) if Path::new(text).is_dir() => {
            walk_directory(step_name, op, Path::new(text), context)
        }
        terminal => op(terminal).map_err(|e| EngineError::execution(step_name, context, e)),
    }
}

/// Walk every regular file beneath `root` (sorted, subdirectories included),
/// parse each as JSON, apply the operation once per file, and collect the
/// results keyed by path relative to `root`.
fn walk_directory(
    step_name: &str,
    op: &Operation,
    root: &Path,
    context: &str,
) -> Result<Data, EngineError> {
    debug!(step = step_name, root = %root.display(), "walking input directory");

    let mut out = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            EngineError::execution(step_name, context, format!("cannot walk {}: {}", root.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let file_context = format!("{}/{}", context, relative);

        let text = std::fs::read_to_string(entry.path()).map_err(|e| {
            EngineError::execution(step_name, &file_context, format!("cannot read file: {}", e))
        })?;
        let parsed = Data::parse_json(&text).map_err(|e| {
            EngineError::execution(step_name, &file_context, format!("cannot parse JSON: {}", e))
        })?;

        let result =
            op(&parsed).map_err(|e| EngineError::execution(step_name, &file_context, e))?;
        out.insert(relative, result);
    }
    Ok(Data::Map(out))
}
