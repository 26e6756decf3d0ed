//! Format converters for stored data
//!
//! A format key on a storage descriptor selects a converter that reshapes
//! pipeline data for the target backend: a memory shape and an on-disk
//! shape, with the inverse applied on retrieval. Formats without a
//! registered converter are stored raw.

use crate::core::data::Data;
use crate::core::error::EngineError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reshapes data between its pipeline form and a backend-specific form.
///
/// The four operations are fixed: converting to/from the memory shape and
/// writing/reading the on-disk shape. `payload_path` names what `to_file`
/// produces for a given location, which is also the existence check used
/// on retrieval.
pub trait FormatConverter {
    /// Convert pipeline data to the in-memory stored shape
    fn to_memory(&self, data: &Data) -> Result<Data, EngineError>;

    /// Convert the in-memory stored shape back to pipeline data
    fn from_memory(&self, stored: &Data) -> Result<Data, EngineError>;

    /// Write pipeline data to disk at the given location
    fn to_file(&self, data: &Data, location: &Path) -> Result<(), EngineError>;

    /// Read pipeline data back from disk
    fn from_file(&self, location: &Path) -> Result<Data, EngineError>;

    /// The path `to_file` writes its payload to
    fn payload_path(&self, location: &Path) -> PathBuf;
}

/// Maps format keys to converters
pub struct FormatRegistry {
    converters: BTreeMap<String, Box<dyn FormatConverter + Send + Sync>>,
}

impl FormatRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            converters: BTreeMap::new(),
        }
    }

    /// Registry with the standard converters: `dataframe` and `image_list`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("dataframe", Box::new(DataFrameFormat));
        registry.register("image_list", Box::new(ImageListFormat));
        registry
    }

    /// Register a converter under a format key
    pub fn register(&mut self, key: &str, converter: Box<dyn FormatConverter + Send + Sync>) {
        self.converters.insert(key.to_string(), converter);
    }

    /// Look up the converter for a format key
    pub fn get(&self, key: &str) -> Option<&(dyn FormatConverter + Send + Sync)> {
        self.converters.get(key).map(|c| c.as_ref())
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Tabular data: a sequence of record mappings.
///
/// Memory shape is column-keyed (`{column: [values...]}`); disk shape is a
/// CSV file at `<location>.csv` with a sorted union header. Cell values are
/// type-sniffed on read (null, bool, integer, float, string), so the
/// round-trip contract is table-shaped data, not exact dtypes.
pub struct DataFrameFormat;

impl DataFrameFormat {
    fn records(data: &Data) -> Result<&[Data], EngineError> {
        match data {
            Data::List(items) => Ok(items),
            other => Err(EngineError::Storage(format!(
                "dataframe format requires a sequence of mappings, got {}",
                other.type_name()
            ))),
        }
    }

    fn columns(records: &[Data]) -> Result<Vec<String>, EngineError> {
        let mut columns = std::collections::BTreeSet::new();
        for record in records {
            match record {
                Data::Map(map) => columns.extend(map.keys().cloned()),
                other => {
                    return Err(EngineError::Storage(format!(
                        "dataframe records must be mappings, got {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(columns.into_iter().collect())
    }

    fn cell_string(value: &Data) -> Result<String, EngineError> {
        match value {
            Data::Null => Ok(String::new()),
            Data::Bool(b) => Ok(b.to_string()),
            Data::Number(n) => Ok(n.to_string()),
            Data::Text(s) => Ok(s.clone()),
            other => Err(EngineError::Storage(format!(
                "dataframe cells must be scalar, got {}",
                other.type_name()
            ))),
        }
    }

    fn sniff_cell(cell: &str) -> Data {
        if cell.is_empty() {
            return Data::Null;
        }
        match cell {
            "true" => return Data::Bool(true),
            "false" => return Data::Bool(false),
            _ => {}
        }
        if let Ok(i) = cell.parse::<i64>() {
            return Data::Number(serde_json::Number::from(i));
        }
        if let Ok(f) = cell.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Data::Number(n);
            }
        }
        Data::Text(cell.to_string())
    }
}

impl FormatConverter for DataFrameFormat {
    fn to_memory(&self, data: &Data) -> Result<Data, EngineError> {
        let records = Self::records(data)?;
        let columns = Self::columns(records)?;

        let mut table: BTreeMap<String, Data> = BTreeMap::new();
        for column in &columns {
            let mut values = Vec::with_capacity(records.len());
            for record in records {
                if let Data::Map(map) = record {
                    values.push(map.get(column).cloned().unwrap_or(Data::Null));
                }
            }
            table.insert(column.clone(), Data::List(values));
        }
        Ok(Data::Map(table))
    }

    fn from_memory(&self, stored: &Data) -> Result<Data, EngineError> {
        let table = match stored {
            Data::Map(map) => map,
            other => {
                return Err(EngineError::Storage(format!(
                    "stored dataframe must be column-keyed, got {}",
                    other.type_name()
                )))
            }
        };

        let mut row_count = None;
        for (column, values) in table {
            let values = match values {
                Data::List(values) => values,
                other => {
                    return Err(EngineError::Storage(format!(
                        "dataframe column '{}' must be a sequence, got {}",
                        column,
                        other.type_name()
                    )))
                }
            };
            match row_count {
                None => row_count = Some(values.len()),
                Some(count) if count != values.len() => {
                    return Err(EngineError::Storage(format!(
                        "dataframe column '{}' has {} values, expected {}",
                        column,
                        values.len(),
                        count
                    )))
                }
                _ => {}
            }
        }

        let rows = row_count.unwrap_or(0);
        let mut records = Vec::with_capacity(rows);
        for i in 0..rows {
            let mut record = BTreeMap::new();
            for (column, values) in table {
                if let Data::List(values) = values {
                    record.insert(column.clone(), values[i].clone());
                }
            }
            records.push(Data::Map(record));
        }
        Ok(Data::List(records))
    }

    fn to_file(&self, data: &Data, location: &Path) -> Result<(), EngineError> {
        let records = Self::records(data)?;
        let columns = Self::columns(records)?;
        let path = self.payload_path(location);

        let mut writer = csv::Writer::from_path(&path).map_err(|e| {
            EngineError::Storage(format!("cannot create {}: {}", path.display(), e))
        })?;

        writer
            .write_record(&columns)
            .map_err(|e| EngineError::Storage(format!("cannot write CSV header: {}", e)))?;

        for record in records {
            if let Data::Map(map) = record {
                let row = columns
                    .iter()
                    .map(|column| {
                        map.get(column)
                            .map(Self::cell_string)
                            .unwrap_or_else(|| Ok(String::new()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                writer
                    .write_record(&row)
                    .map_err(|e| EngineError::Storage(format!("cannot write CSV row: {}", e)))?;
            }
        }

        writer
            .flush()
            .map_err(|e| EngineError::Storage(format!("cannot flush {}: {}", path.display(), e)))
    }

    fn from_file(&self, location: &Path) -> Result<Data, EngineError> {
        let path = self.payload_path(location);
        let mut reader = csv::Reader::from_path(&path).map_err(|e| {
            EngineError::Storage(format!("cannot open {}: {}", path.display(), e))
        })?;

        let headers = reader
            .headers()
            .map_err(|e| EngineError::Storage(format!("cannot read CSV header: {}", e)))?
            .clone();

        let mut records = Vec::new();
        for result in reader.records() {
            let row =
                result.map_err(|e| EngineError::Storage(format!("cannot read CSV row: {}", e)))?;
            let record = headers
                .iter()
                .zip(row.iter())
                .map(|(column, cell)| (column.to_string(), Self::sniff_cell(cell)))
                .collect();
            records.push(Data::Map(record));
        }
        Ok(Data::List(records))
    }

    fn payload_path(&self, location: &Path) -> PathBuf {
        let mut path = location.as_os_str().to_owned();
        path.push(".csv");
        PathBuf::from(path)
    }
}

/// An ordered collection of encoded PNG buffers.
///
/// Memory shape is the pipeline shape (a sequence of byte buffers). Disk
/// shape is a directory of zero-padded `image_NNNN.png` files plus a
/// `metadata.json` with the count, format, and write timestamp. Buffers are
/// written verbatim, so the file round-trip is byte-lossless.
pub struct ImageListFormat;

impl ImageListFormat {
    fn buffers(data: &Data) -> Result<Vec<&[u8]>, EngineError> {
        let items = match data {
            Data::List(items) => items,
            other => {
                return Err(EngineError::Storage(format!(
                    "image_list format requires a sequence of byte buffers, got {}",
                    other.type_name()
                )))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Data::Bytes(buffer) => {
                    match image::guess_format(buffer) {
                        Ok(image::ImageFormat::Png) => Ok(buffer.as_slice()),
                        Ok(other) => Err(EngineError::Storage(format!(
                            "image {} is {:?}, expected PNG",
                            i, other
                        ))),
                        Err(_) => Err(EngineError::Storage(format!(
                            "image {} is not recognizable image data",
                            i
                        ))),
                    }
                }
                other => Err(EngineError::Storage(format!(
                    "image_list elements must be byte buffers, got {} at index {}",
                    other.type_name(),
                    i
                ))),
            })
            .collect()
    }

    fn image_file(location: &Path, index: usize) -> PathBuf {
        location.join(format!("image_{:04}.png", index))
    }
}

impl FormatConverter for ImageListFormat {
    fn to_memory(&self, data: &Data) -> Result<Data, EngineError> {
        // Validation only; the memory shape is the pipeline shape
        Self::buffers(data)?;
        Ok(data.clone())
    }

    fn from_memory(&self, stored: &Data) -> Result<Data, EngineError> {
        Self::buffers(stored)?;
        Ok(stored.clone())
    }

    fn to_file(&self, data: &Data, location: &Path) -> Result<(), EngineError> {
        let buffers = Self::buffers(data)?;

        std::fs::create_dir_all(location).map_err(|e| {
            EngineError::Storage(format!("cannot create {}: {}", location.display(), e))
        })?;

        for (i, buffer) in buffers.iter().enumerate() {
            let path = Self::image_file(location, i);
            std::fs::write(&path, buffer).map_err(|e| {
                EngineError::Storage(format!("cannot write {}: {}", path.display(), e))
            })?;
        }

        let manifest = serde_json::json!({
            "count": buffers.len(),
            "format": "png",
            "timestamp": Utc::now().to_rfc3339(),
        });
        let path = location.join("metadata.json");
        std::fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap_or_default())
            .map_err(|e| {
                EngineError::Storage(format!("cannot write {}: {}", path.display(), e))
            })
    }

    fn from_file(&self, location: &Path) -> Result<Data, EngineError> {
        let manifest_path = location.join("metadata.json");
        let manifest = std::fs::read_to_string(&manifest_path).map_err(|e| {
            EngineError::Storage(format!("cannot read {}: {}", manifest_path.display(), e))
        })?;
        let manifest: serde_json::Value = serde_json::from_str(&manifest).map_err(|e| {
            EngineError::Storage(format!("malformed {}: {}", manifest_path.display(), e))
        })?;

        let count = manifest
            .get("count")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                EngineError::Storage(format!(
                    "{} is missing an integer 'count'",
                    manifest_path.display()
                ))
            })?;

        let mut buffers = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let path = Self::image_file(location, i);
            let buffer = std::fs::read(&path).map_err(|e| {
                EngineError::Storage(format!("cannot read {}: {}", path.display(), e))
            })?;
            buffers.push(Data::Bytes(buffer));
        }
        Ok(Data::List(buffers))
    }

    fn payload_path(&self, location: &Path) -> PathBuf {
        location.to_path_buf()
    }
}
