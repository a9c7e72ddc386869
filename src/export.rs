//! Export/import adapter: CSV and JSON interchange for a dataset.
//!
//! CSV export renders one scope — a whole equipment on the flat grid,
//! or one trial (plus one spectrum view on the OSA) on the extended
//! grid — as a fixed seven-column table, one row per duty cycle. Every
//! cell is quoted so decimal commas and stray punctuation survive any
//! downstream parser.
//!
//! JSON export pretty-prints the full persisted tree; import is the one
//! place malformed input is *reported* instead of silently defaulted,
//! because the user explicitly asked for it and needs to know it
//! failed. A parseable file then goes through the same per-cell
//! tolerant merge as loading.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::dataset::Dataset;
use crate::persist;
use crate::schema::{Color, Coordinate, GridSchema};

/// The fixed CSV header row.
pub const CSV_HEADER: [&str; 7] = [
    "DutyCycle_percent",
    "Green_peak_nm",
    "Green_intensity",
    "Red_peak_nm",
    "Red_intensity",
    "Blue_peak_nm",
    "Blue_intensity",
];

/// Which slice of the grid a CSV export covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvScope<'a> {
    /// A whole equipment (flat grid).
    Equipment(&'a str),
    /// One trial of one equipment, optionally narrowed to one spectrum
    /// view (extended grid).
    TrialView {
        /// Equipment identifier.
        equipment: &'a str,
        /// Trial number.
        trial: u8,
        /// Spectrum view, for equipments that have the axis.
        spectrum_view: Option<u8>,
    },
}

impl CsvScope<'_> {
    /// Equipment the scope addresses.
    pub fn equipment(&self) -> &str {
        match self {
            CsvScope::Equipment(id) => id,
            CsvScope::TrialView { equipment, .. } => equipment,
        }
    }

    fn trial(&self) -> Option<u8> {
        match self {
            CsvScope::Equipment(_) => None,
            CsvScope::TrialView { trial, .. } => Some(*trial),
        }
    }

    fn spectrum_view(&self) -> Option<u8> {
        match self {
            CsvScope::Equipment(_) => None,
            CsvScope::TrialView { spectrum_view, .. } => *spectrum_view,
        }
    }
}

/// Errors from CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The scope names an equipment the schema does not define — a
    /// caller defect, distinct from missing cells (which render blank).
    #[error("Unknown equipment in export scope: {0}")]
    UnknownEquipment(String),

    /// CSV formatting error.
    #[error("CSV formatting error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error flushing the CSV buffer.
    #[error("CSV write error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from JSON import, surfaced to the user as an actionable
/// message (unlike load-time corruption, which defaults silently).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The uploaded file is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Render one scope of the dataset as CSV text.
///
/// Always `1 + duty_cycles` lines of seven quoted fields, newline
/// separated with no trailing newline. Cells the grid does not contain
/// render as empty strings.
pub fn to_csv(
    schema: &GridSchema,
    dataset: &Dataset,
    scope: &CsvScope<'_>,
) -> Result<String, ExportError> {
    if schema.equipment(scope.equipment()).is_none() {
        return Err(ExportError::UnknownEquipment(scope.equipment().to_string()));
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for &duty in &schema.duty_cycles {
        let mut record = vec![duty.to_string()];
        for color in Color::ALL {
            let coordinate = Coordinate {
                equipment: scope.equipment().to_string(),
                trial: scope.trial(),
                spectrum_view: scope.spectrum_view(),
                duty_cycle: duty,
                color,
            };
            match dataset.cell(&coordinate) {
                Some(cell) => {
                    record.push(cell.peak_nm.clone());
                    record.push(cell.intensity.clone());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(text.trim_end_matches('\n').to_string())
}

/// Render the full dataset as pretty-printed (2-space indented) JSON —
/// semantically identical to the persisted blob.
pub fn to_json(schema: &GridSchema, dataset: &Dataset) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&persist::dataset_to_value(
        schema, dataset,
    ))?)
}

/// Parse an uploaded JSON file into a dataset.
///
/// Accepts either the full envelope (`{"data": {...}}`) or a bare
/// coordinate mapping; structure beyond that is handled by the same
/// tolerant merge as loading, so a partial file fills what it names and
/// leaves the rest empty. Only non-JSON input is an error. The result's
/// `updated_at` is stamped with the import time.
pub fn from_json(schema: &GridSchema, text: &str) -> Result<Dataset, ImportError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let mut dataset = persist::merge_value(schema, &value);
    dataset.updated_at = Some(Utc::now());
    Ok(dataset)
}

/// Timestamp slug used in download filenames: RFC 3339 UTC with `:`
/// replaced so it is filesystem-safe.
fn timestamp_slug(when: DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-")
}

/// Suggested filename for a CSV export:
/// `dados_<equipment>[_trial<N>][_espectro<N>]_<timestamp>.csv`.
pub fn csv_filename(scope: &CsvScope<'_>, when: DateTime<Utc>) -> String {
    let mut name = format!("dados_{}", scope.equipment());
    if let Some(trial) = scope.trial() {
        name.push_str(&format!("_trial{trial}"));
    }
    if let Some(view) = scope.spectrum_view() {
        name.push_str(&format!("_espectro{view}"));
    }
    format!("{name}_{}.csv", timestamp_slug(when))
}

/// Suggested filename for a JSON export: `dados_todos_<timestamp>.json`.
pub fn json_filename(when: DateTime<Utc>) -> String {
    format!("dados_todos_{}.json", timestamp_slug(when))
}
