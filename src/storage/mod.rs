//! Storage backends for step data
//!
//! A storage descriptor on a step names a backend (memory, file, database),
//! a format key, and an optional location. The store owns everything behind
//! that descriptor: the in-memory artifact map, file layout and metadata
//! sidecars, and the database handle. Steps never touch a backend directly.

pub mod database;
pub mod format;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use database::{InMemoryDatabase, PipelineDatabase};
pub use format::{FormatConverter, FormatRegistry};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use crate::core::config::{StorageConfig, StorageKind};
use crate::core::data::Data;
use crate::core::error::EngineError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// A stored value with its bookkeeping.
///
/// Owned exclusively by the store; `stored_at` is stamped at write time.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// The stored data, in the format's memory shape
    pub data: Data,

    /// Format key it was stored under
    pub format: String,

    /// Caller-supplied metadata
    pub metadata: serde_json::Value,

    /// When the artifact was written
    pub stored_at: DateTime<Utc>,
}

/// Storage facade: dispatches store/retrieve calls to the backend named by
/// a descriptor, applying format conversion where a converter is registered.
pub struct DataStore {
    base_path: PathBuf,
    formats: FormatRegistry,
    memory: BTreeMap<String, StoredArtifact>,
    database: Option<Box<dyn PipelineDatabase>>,
}

impl DataStore {
    /// Create a store rooted at the given directory for file storage
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
            formats: FormatRegistry::with_defaults(),
            memory: BTreeMap::new(),
            database: None,
        }
    }

    /// Attach a database backend
    pub fn with_database(mut self, database: Box<dyn PipelineDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// Whether a database backend is attached
    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    /// Base directory for file storage
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// Persist a step's data as described by the descriptor
    pub fn store(
        &mut self,
        step_name: &str,
        data: &Data,
        config: &StorageConfig,
        metadata: serde_json::Value,
    ) -> Result<(), EngineError> {
        debug!(
            step = step_name,
            kind = ?config.kind,
            format = %config.format,
            "storing step data"
        );

        match config.kind {
            StorageKind::Memory => {
                let stored = match self.formats.get(&config.format) {
                    Some(converter) => converter.to_memory(data)?,
                    None => data.clone(),
                };
                self.memory.insert(
                    step_name.to_string(),
                    StoredArtifact {
                        data: stored,
                        format: config.format.clone(),
                        metadata,
                        stored_at: Utc::now(),
                    },
                );
                Ok(())
            }
            StorageKind::File => {
                let location = self.resolve_location(step_name, config);
                if let Some(parent) = location.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        EngineError::Storage(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }

                match self.formats.get(&config.format) {
                    Some(converter) => {
                        converter.to_file(data, &location)?;
                        let sidecar = serde_json::json!({
                            "format": config.format,
                            "metadata": metadata,
                            "stored_at": Utc::now().to_rfc3339(),
                        });
                        let path = Self::sidecar_path(&location);
                        std::fs::write(
                            &path,
                            serde_json::to_string_pretty(&sidecar).unwrap_or_default(),
                        )
                        .map_err(|e| {
                            EngineError::Storage(format!(
                                "cannot write {}: {}",
                                path.display(),
                                e
                            ))
                        })
                    }
                    None => {
                        let document = serde_json::json!({
                            "data": data.to_json()?,
                            "format": config.format,
                            "metadata": metadata,
                            "stored_at": Utc::now().to_rfc3339(),
                        });
                        std::fs::write(
                            &location,
                            serde_json::to_string_pretty(&document).unwrap_or_default(),
                        )
                        .map_err(|e| {
                            EngineError::Storage(format!(
                                "cannot write {}: {}",
                                location.display(),
                                e
                            ))
                        })
                    }
                }
            }
            StorageKind::Database => {
                let database = self.database.as_ref().ok_or_else(|| {
                    EngineError::Config(
                        "database storage requested but no database is configured".to_string(),
                    )
                })?;
                let document = data.to_json()?;
                database.store_pipeline_data(step_name, &document, Some(&metadata))
            }
        }
    }

    /// Retrieve a step's data as described by the descriptor
    pub fn retrieve(&self, step_name: &str, config: &StorageConfig) -> Result<Data, EngineError> {
        debug!(
            step = step_name,
            kind = ?config.kind,
            format = %config.format,
            "retrieving step data"
        );

        match config.kind {
            StorageKind::Memory => {
                let artifact = self.memory.get(step_name).ok_or_else(|| {
                    EngineError::NotFound(format!("no stored data for step '{}'", step_name))
                })?;
                match self.formats.get(&config.format) {
                    Some(converter) => converter.from_memory(&artifact.data),
                    None => Ok(artifact.data.clone()),
                }
            }
            StorageKind::File => {
                let location = self.resolve_location(step_name, config);
                match self.formats.get(&config.format) {
                    Some(converter) => {
                        let payload = converter.payload_path(&location);
                        if !payload.exists() {
                            return Err(EngineError::NotFound(format!(
                                "no stored data at {}",
                                payload.display()
                            )));
                        }
                        converter.from_file(&location)
                    }
                    None => {
                        if !location.exists() {
                            return Err(EngineError::NotFound(format!(
                                "no stored data at {}",
                                location.display()
                            )));
                        }
                        let text = std::fs::read_to_string(&location).map_err(|e| {
                            EngineError::Storage(format!(
                                "cannot read {}: {}",
                                location.display(),
                                e
                            ))
                        })?;
                        let document: serde_json::Value =
                            serde_json::from_str(&text).map_err(|e| {
                                EngineError::Storage(format!(
                                    "malformed {}: {}",
                                    location.display(),
                                    e
                                ))
                            })?;
                        let data = document.get("data").cloned().ok_or_else(|| {
                            EngineError::Storage(format!(
                                "{} has no 'data' key",
                                location.display()
                            ))
                        })?;
                        Ok(Data::from_json(data))
                    }
                }
            }
            StorageKind::Database => {
                let database = self.database.as_ref().ok_or_else(|| {
                    EngineError::Config(
                        "database storage requested but no database is configured".to_string(),
                    )
                })?;
                let document = database.get_pipeline_data(step_name)?.ok_or_else(|| {
                    EngineError::NotFound(format!(
                        "no stored data for step '{}' in database",
                        step_name
                    ))
                })?;
                Ok(Data::from_json(document))
            }
        }
    }

    /// Inspect the in-memory artifact for a step, if any
    pub fn memory_artifact(&self, step_name: &str) -> Option<&StoredArtifact> {
        self.memory.get(step_name)
    }

    /// Where file storage for this step lands: the configured location
    /// (joined onto the base when relative) or `<base>/<step name>`
    pub fn resolve_location(&self, step_name: &str, config: &StorageConfig) -> PathBuf {
        match &config.location {
            Some(location) if location.is_absolute() => location.clone(),
            Some(location) => self.base_path.join(location),
            None => self.base_path.join(step_name),
        }
    }

    fn sidecar_path(location: &std::path::Path) -> PathBuf {
        let mut path = location.as_os_str().to_owned();
        path.push("_metadata.json");
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_config(format: &str) -> StorageConfig {
        StorageConfig {
            kind: StorageKind::Memory,
            format: format.to_string(),
            location: None,
        }
    }

    fn file_config(format: &str, location: Option<&str>) -> StorageConfig {
        StorageConfig {
            kind: StorageKind::File,
            format: format.to_string(),
            location: location.map(PathBuf::from),
        }
    }

    fn database_config() -> StorageConfig {
        StorageConfig {
            kind: StorageKind::Database,
            format: "raw".to_string(),
            location: None,
        }
    }

    #[test]
    fn test_memory_raw_round_trip() {
        let mut store = DataStore::new("/tmp/unused");
        let data = Data::from_json(json!({"a": [1, 2, 3]}));

        store
            .store("extract", &data, &memory_config("raw"), json!({}))
            .unwrap();
        assert_eq!(store.retrieve("extract", &memory_config("raw")).unwrap(), data);

        let artifact = store.memory_artifact("extract").unwrap();
        assert_eq!(artifact.format, "raw");
    }

    #[test]
    fn test_memory_missing_is_not_found() {
        let store = DataStore::new("/tmp/unused");
        let err = store.retrieve("absent", &memory_config("raw")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_memory_dataframe_stores_columnar() {
        let mut store = DataStore::new("/tmp/unused");
        let records = Data::from_json(json!([{"x": 1}, {"x": 2}]));

        store
            .store("table", &records, &memory_config("dataframe"), json!({}))
            .unwrap();

        // The artifact holds the columnar memory shape
        let artifact = store.memory_artifact("table").unwrap();
        assert_eq!(artifact.data, Data::from_json(json!({"x": [1, 2]})));

        // Retrieval converts back to records
        let restored = store.retrieve("table", &memory_config("dataframe")).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_file_raw_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(dir.path());
        let data = Data::from_json(json!({"nested": {"ok": true}}));
        let config = file_config("raw", Some("artifacts/result"));

        store.store("save", &data, &config, json!({"run": 1})).unwrap();

        let written = dir.path().join("artifacts/result");
        assert!(written.exists());
        let document: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(document["format"], json!("raw"));
        assert_eq!(document["metadata"], json!({"run": 1}));
        assert!(document["stored_at"].is_string());

        assert_eq!(store.retrieve("save", &config).unwrap(), data);
    }

    #[test]
    fn test_file_default_location_is_step_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(dir.path());

        store
            .store("step_out", &Data::from(1i64), &file_config("raw", None), json!({}))
            .unwrap();
        assert!(dir.path().join("step_out").exists());
    }

    #[test]
    fn test_file_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        let err = store
            .retrieve("absent", &file_config("raw", None))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = store
            .retrieve("absent", &file_config("dataframe", None))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_file_dataframe_writes_payload_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::new(dir.path());
        let records = Data::from_json(json!([{"name": "a"}, {"name": "b"}]));
        let config = file_config("dataframe", Some("table"));

        store
            .store("table", &records, &config, json!({"source": "test"}))
            .unwrap();

        assert!(dir.path().join("table.csv").exists());
        let sidecar: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("table_metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(sidecar["format"], json!("dataframe"));
        assert_eq!(sidecar["metadata"], json!({"source": "test"}));

        assert_eq!(store.retrieve("table", &config).unwrap(), records);
    }

    #[test]
    fn test_database_round_trip() {
        let mut store =
            DataStore::new("/tmp/unused").with_database(Box::new(InMemoryDatabase::new()));
        let data = Data::from_json(json!([1, 2, 3]));

        store
            .store("db_step", &data, &database_config(), json!({}))
            .unwrap();
        assert_eq!(store.retrieve("db_step", &database_config()).unwrap(), data);
    }

    #[test]
    fn test_database_unconfigured_is_config_error() {
        let mut store = DataStore::new("/tmp/unused");
        let err = store
            .store("s", &Data::Null, &database_config(), json!({}))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_database_rejects_binary_data() {
        let mut store =
            DataStore::new("/tmp/unused").with_database(Box::new(InMemoryDatabase::new()));
        let err = store
            .store(
                "s",
                &Data::List(vec![Data::Bytes(vec![1])]),
                &database_config(),
                json!({}),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_database_missing_is_not_found() {
        let store =
            DataStore::new("/tmp/unused").with_database(Box::new(InMemoryDatabase::new()));
        let err = store.retrieve("absent", &database_config()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
