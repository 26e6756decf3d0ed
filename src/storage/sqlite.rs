//! SQLite database backend

use crate::core::error::EngineError;
use crate::storage::database::PipelineDatabase;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// SQLite-backed pipeline data store.
///
/// Rows are append-only; retrieval returns the most recent document for a
/// step. Documents are stored as JSON text alongside an RFC 3339 timestamp.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open (or create) a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            EngineError::Persistence(format!(
                "cannot open database {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and ephemeral runs)
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::Persistence(format!("cannot open database: {}", e)))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open the database at the default per-user data path
    pub fn with_default_path() -> Result<Self, EngineError> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Persistence(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        Self::open(path)
    }

    /// Default database location under the user data directory
    pub fn default_path() -> Result<PathBuf, EngineError> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Ok(data_dir.join("datapipe").join("pipeline.db"))
    }

    fn init(&self) -> Result<(), EngineError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS pipeline_data (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    step_name TEXT NOT NULL,
                    data TEXT NOT NULL,
                    metadata TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_pipeline_data_step
                    ON pipeline_data(step_name);
                "#,
            )
            .map_err(|e| EngineError::Persistence(format!("cannot initialize schema: {}", e)))
    }
}

impl PipelineDatabase for SqliteDatabase {
    fn store_pipeline_data(
        &self,
        step_name: &str,
        data: &serde_json::Value,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), EngineError> {
        self.conn
            .execute(
                "INSERT INTO pipeline_data (step_name, data, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    step_name,
                    data.to_string(),
                    metadata.map(|m| m.to_string()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| {
                EngineError::Persistence(format!("cannot store data for '{}': {}", step_name, e))
            })?;
        Ok(())
    }

    fn get_pipeline_data(&self, step_name: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM pipeline_data
                 WHERE step_name = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                params![step_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                EngineError::Persistence(format!("cannot load data for '{}': {}", step_name, e))
            })?;

        match document {
            Some(text) => {
                let value = serde_json::from_str(&text).map_err(|e| {
                    EngineError::Persistence(format!(
                        "stored data for '{}' is not valid JSON: {}",
                        step_name, e
                    ))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
