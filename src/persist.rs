//! Persistence: the blob format, the tolerant merge, and storage
//! backends.
//!
//! The persisted value is the JSON tree the original lab sheets used:
//!
//! ```json
//! {
//!   "version": 1,
//!   "updatedAt": "2025-03-14T10:12:00.000Z",
//!   "data": {
//!     "osa_visivel": { "5": { "green": { "peak_nm": "516.1", "intensity": "" }, ... } },
//!     "thorlabs": { ... }
//!   }
//! }
//! ```
//!
//! Nesting under `data` follows the schema's axes: equipment, then trial
//! and spectrum view when present, then duty cycle, then color — all map
//! keys are decimal strings.
//!
//! Loading never trusts that shape. [`deserialize`] is total: a missing
//! blob, non-JSON bytes, or a foreign tree all come back as the default
//! grid, and a parseable tree is folded in cell by cell through
//! [`merge_value`], which copies a reading only when both `peak_nm` and
//! `intensity` are JSON strings. That per-cell check is the whole
//! defense against corrupt or outdated persisted data — there is no
//! schema validation step that could reject a blob outright.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::dataset::Dataset;
use crate::schema::{Coordinate, GridSchema, ReadingField};

/// Errors raised by storage backends and blob serialization.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O failure reading or writing the persisted blob.
    #[error("Failed to access persisted data: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value storage for persisted grids, one JSON blob per storage key.
///
/// Models the browser-local storage the original tool wrote to; the
/// store is generic over this seam so tests can count writes.
pub trait StorageBackend {
    /// Read the blob under `key`. `Ok(None)` means no prior data.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write the blob under `key`, replacing any previous value.
    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError>;
}

/// Filesystem backend: one `<key>.json` file per storage key under a
/// data directory, created on demand.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileBackend { dir: dir.into() }
    }

    /// File holding the blob for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write-then-rename keeps readers from ever seeing a partial blob.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        debug!("Persisted {} bytes under key {key}", blob.len());
        Ok(())
    }
}

/// In-memory backend for tests; counts writes so debounce coalescing is
/// observable.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    writes: usize,
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Backend pre-seeded with one blob (does not count as a write).
    pub fn with_blob(key: &str, blob: &str) -> Self {
        let mut backend = MemoryBackend::new();
        backend.entries.insert(key.to_string(), blob.to_string());
        backend
    }

    /// Blob currently stored under `key`.
    pub fn blob(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of `store` calls made so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), blob.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Map keys addressing one cell inside the `data` tree, outermost first.
fn coordinate_path(coordinate: &Coordinate) -> Vec<String> {
    let mut path = vec![coordinate.equipment.clone()];
    if let Some(t) = coordinate.trial {
        path.push(t.to_string());
    }
    if let Some(v) = coordinate.spectrum_view {
        path.push(v.to_string());
    }
    path.push(coordinate.duty_cycle.to_string());
    path.push(coordinate.color.id().to_string());
    path
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, key| value.get(key))
}

fn insert_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [key] => {
            map.insert(key.clone(), value);
        }
        [key, rest @ ..] => {
            let entry = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Render a dataset as the persisted JSON tree (the same tree JSON
/// export pretty-prints).
pub fn dataset_to_value(schema: &GridSchema, dataset: &Dataset) -> Value {
    let mut data = Map::new();
    for coordinate in schema.coordinates() {
        let cell = dataset.cell(&coordinate).cloned().unwrap_or_default();
        insert_path(
            &mut data,
            &coordinate_path(&coordinate),
            json!({ "peak_nm": cell.peak_nm, "intensity": cell.intensity }),
        );
    }
    json!({
        "version": dataset.version,
        "updatedAt": dataset
            .updated_at
            .map(|t| Value::String(t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
            .unwrap_or(Value::Null),
        "data": data,
    })
}

/// Fold a parsed JSON tree into a fresh default grid, cell by cell.
///
/// Shared by [`deserialize`] and JSON import. For each schema
/// coordinate the cell is looked up under `data`, falling back to the
/// tree root (the pre-envelope blob shape); a reading is copied only
/// when present as a JSON string. Everything else in the tree is
/// ignored. Total: never fails.
pub fn merge_value(schema: &GridSchema, value: &Value) -> Dataset {
    let mut dataset = schema.default_dataset();

    for coordinate in schema.coordinates() {
        let path = coordinate_path(&coordinate);
        let src = value
            .get("data")
            .and_then(|data| lookup(data, &path))
            .or_else(|| lookup(value, &path));
        let Some(obj) = src.and_then(Value::as_object) else {
            continue;
        };
        // The coordinate came from the schema, so the key exists.
        if let Some(cell) = dataset.cell_mut(&coordinate) {
            if let Some(peak) = obj.get(ReadingField::PeakNm.id()).and_then(Value::as_str) {
                cell.peak_nm = peak.to_string();
            }
            if let Some(intensity) = obj.get(ReadingField::Intensity.id()).and_then(Value::as_str) {
                cell.intensity = intensity.to_string();
            }
        }
    }

    dataset.updated_at = value
        .get("updatedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    dataset
}

/// Parse a persisted blob into a dataset. Total and fail-soft: `None`,
/// unparseable bytes, or an alien shape all yield the default grid — a
/// corrupt blob is treated as "no prior data", never surfaced.
pub fn deserialize(schema: &GridSchema, blob: Option<&str>) -> Dataset {
    let Some(text) = blob else {
        return schema.default_dataset();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(value) => merge_value(schema, &value),
        Err(e) => {
            warn!(
                "Persisted blob under {} is not valid JSON ({e}); starting from an empty grid",
                schema.storage_key
            );
            schema.default_dataset()
        }
    }
}

/// Stamp `updated_at` with the current time and render the compact
/// persisted blob.
pub fn serialize(schema: &GridSchema, dataset: &mut Dataset) -> String {
    dataset.updated_at = Some(Utc::now());
    dataset_to_value(schema, dataset).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{equipment, Color};

    fn set(dataset: &mut Dataset, coordinate: &Coordinate, peak: &str, intensity: &str) {
        dataset
            .set(coordinate, ReadingField::PeakNm, peak)
            .unwrap();
        dataset
            .set(coordinate, ReadingField::Intensity, intensity)
            .unwrap();
    }

    #[test]
    fn test_round_trip_idempotent() {
        let schema = GridSchema::flat();
        let mut dataset = schema.default_dataset();
        set(
            &mut dataset,
            &Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green),
            "516.1",
            "177,85",
        );
        set(
            &mut dataset,
            &Coordinate::simple(equipment::THORLABS, 100, Color::Blue),
            "468.2",
            "",
        );

        let blob = serialize(&schema, &mut dataset);
        let reloaded = deserialize(&schema, Some(&blob));

        // Identical modulo the updated_at stamp refresh; the blob keeps
        // millisecond precision.
        assert_eq!(
            reloaded.updated_at.map(|t| t.timestamp_millis()),
            dataset.updated_at.map(|t| t.timestamp_millis())
        );
        for coordinate in schema.coordinates() {
            assert_eq!(
                reloaded.get(&coordinate).unwrap(),
                dataset.get(&coordinate).unwrap()
            );
        }
    }

    #[test]
    fn test_extended_round_trip() {
        let schema = GridSchema::extended();
        let mut dataset = schema.default_dataset();
        set(
            &mut dataset,
            &Coordinate::extended(equipment::OSA_VISIVEL, 3, Some(2), 7, Color::Red),
            "637.7",
            "84.23",
        );
        set(
            &mut dataset,
            &Coordinate::extended(equipment::THORLABS, 1, None, 1, Color::Green),
            "515.9",
            "10",
        );

        let blob = serialize(&schema, &mut dataset);
        let reloaded = deserialize(&schema, Some(&blob));
        for coordinate in schema.coordinates() {
            assert_eq!(
                reloaded.get(&coordinate).unwrap(),
                dataset.get(&coordinate).unwrap()
            );
        }
    }

    #[test]
    fn test_deserialize_fail_soft() {
        let schema = GridSchema::flat();
        for blob in [
            None,
            Some(""),
            Some("not json at all"),
            Some("{\"data\": 42}"),
            Some("[1, 2, 3]"),
            Some("null"),
        ] {
            let dataset = deserialize(&schema, blob);
            assert_eq!(dataset.len(), schema.cell_count());
            assert_eq!(dataset.filled_cell_count(), 0);
            assert_eq!(dataset.updated_at, None);
        }
    }

    #[test]
    fn test_partial_blob_tolerated() {
        let schema = GridSchema::flat();
        let blob = r#"{
            "data": {
                "osa_visivel": { "5": { "green": { "peak_nm": "516.1", "intensity": "177.85" } } }
            }
        }"#;

        let dataset = deserialize(&schema, Some(blob));
        let cell = dataset
            .get(&Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green))
            .unwrap();
        assert_eq!(cell.peak_nm, "516.1");
        assert_eq!(cell.intensity, "177.85");
        assert_eq!(dataset.filled_cell_count(), 1);
    }

    #[test]
    fn test_pre_envelope_shape_tolerated() {
        // Older blobs stored the cells at the root, without "data".
        let schema = GridSchema::flat();
        let blob = r#"{
            "osa_visivel": { "10": { "red": { "peak_nm": "637.7", "intensity": "84.23" } } }
        }"#;

        let dataset = deserialize(&schema, Some(blob));
        let cell = dataset
            .get(&Coordinate::simple(equipment::OSA_VISIVEL, 10, Color::Red))
            .unwrap();
        assert_eq!(cell.peak_nm, "637.7");
    }

    #[test]
    fn test_non_string_readings_defaulted() {
        let schema = GridSchema::flat();
        let blob = r#"{
            "data": {
                "osa_visivel": { "5": { "green": { "peak_nm": 516.1, "intensity": "177.85" } } }
            }
        }"#;

        let dataset = deserialize(&schema, Some(blob));
        let cell = dataset
            .get(&Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green))
            .unwrap();
        // Numeric peak_nm is rejected, string intensity is kept
        assert_eq!(cell.peak_nm, "");
        assert_eq!(cell.intensity, "177.85");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let schema = GridSchema::flat();
        let blob = r#"{
            "version": 99,
            "operator": "maria",
            "data": {
                "osa_visivel": { "7": { "green": { "peak_nm": "1", "intensity": "2" } } },
                "agilent": { "5": { "green": { "peak_nm": "3", "intensity": "4" } } }
            }
        }"#;

        let dataset = deserialize(&schema, Some(blob));
        // duty 7 and equipment "agilent" are outside the grid: nothing lands
        assert_eq!(dataset.filled_cell_count(), 0);
        // Version comes from the schema, not the blob
        assert_eq!(dataset.version, schema.version);
    }

    #[test]
    fn test_updated_at_parsing() {
        let schema = GridSchema::flat();

        let dataset = deserialize(
            &schema,
            Some(r#"{"updatedAt": "2025-03-14T10:12:00.000Z", "data": {}}"#),
        );
        assert!(dataset.updated_at.is_some());

        let dataset = deserialize(&schema, Some(r#"{"updatedAt": "yesterday", "data": {}}"#));
        assert_eq!(dataset.updated_at, None);

        let dataset = deserialize(&schema, Some(r#"{"updatedAt": 1234, "data": {}}"#));
        assert_eq!(dataset.updated_at, None);
    }

    #[test]
    fn test_serialize_stamps_updated_at() {
        let schema = GridSchema::flat();
        let mut dataset = schema.default_dataset();
        assert_eq!(dataset.updated_at, None);

        let blob = serialize(&schema, &mut dataset);
        assert!(dataset.updated_at.is_some());
        assert!(blob.contains("\"updatedAt\""));
        assert!(blob.contains("\"version\":1"));
    }

    #[test]
    fn test_memory_backend_counts_writes() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.load("k").unwrap(), None);
        backend.store("k", "a").unwrap();
        backend.store("k", "b").unwrap();
        assert_eq!(backend.writes(), 2);
        assert_eq!(backend.blob("k"), Some("b"));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("grids"));

        assert_eq!(backend.load("key").unwrap(), None);
        backend.store("key", "{\"version\":1}").unwrap();
        assert_eq!(backend.load("key").unwrap().as_deref(), Some("{\"version\":1}"));

        // Keys stay isolated
        assert_eq!(backend.load("other").unwrap(), None);
    }
}
