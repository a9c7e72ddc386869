//! # specgrid — LED spectral measurement logbook
//!
//! `specgrid` records optical measurement readings (peak wavelength and
//! intensity) across a fixed grid of experimental conditions: duty
//! cycles, color channels, equipment types, and — in the extended grid —
//! repeated trials and spectral views. Entries persist locally as a JSON
//! blob, export to CSV/JSON, and re-import from JSON with a tolerant
//! per-cell merge.
//!
//! ## Quick Start
//!
//! ```rust
//! use specgrid::prelude::*;
//!
//! let schema = GridSchema::flat();
//! let mut store = MeasurementStore::open(
//!     schema,
//!     MemoryBackend::new(),
//!     StoreOptions::default(),
//! )?;
//!
//! // Record one reading; persistence is debounced behind the scenes.
//! let coord = Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green);
//! store.set(&coord, ReadingField::PeakNm, "516.1")?;
//! store.flush()?;
//!
//! // Export the equipment's sweep as an always-quoted CSV table.
//! let csv = to_csv(
//!     store.schema(),
//!     store.dataset(),
//!     &CsvScope::Equipment(equipment::OSA_VISIVEL),
//! )?;
//! assert!(csv.contains("\"516.1\""));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`schema`]: the fixed coordinate space (two incompatible grid
//!   versions, each under its own storage key) and its canonical
//!   enumeration order
//! - [`dataset`]: `Cell`/`Dataset` types holding exactly one cell per
//!   grid coordinate, values kept as entered text
//! - [`persist`]: the persisted JSON blob, the fail-soft tolerant merge,
//!   and pluggable storage backends
//! - [`store`]: the mutable state store with debounced persistence
//! - [`export`]: CSV/JSON export and JSON import with explicit parse
//!   errors
//! - [`cli`]: TOML configuration for the companion binary
//!
//! ## Failure philosophy
//!
//! Loading is total: a corrupt or outdated persisted blob silently
//! becomes an empty grid (there is nothing actionable to tell the user
//! at startup). Import is the opposite: the user asked for it, so a
//! malformed file is reported as [`export::ImportError`] and the current
//! dataset stays untouched.

pub mod cli;
pub mod dataset;
pub mod export;
pub mod persist;
pub mod schema;
pub mod store;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::dataset::{parse_reading, Cell, Dataset, OutOfGridError};
    pub use crate::export::{
        csv_filename, from_json, json_filename, to_csv, to_json, CsvScope, ExportError,
        ImportError, CSV_HEADER,
    };
    pub use crate::persist::{
        deserialize, merge_value, serialize, FileBackend, MemoryBackend, StorageBackend,
        StorageError,
    };
    pub use crate::schema::{
        equipment, Color, Coordinate, EquipmentSpec, GridSchema, ReadingField, STORAGE_KEY_V1,
        STORAGE_KEY_V2,
    };
    pub use crate::store::{MeasurementStore, StoreOptions, DEFAULT_DEBOUNCE};
}
