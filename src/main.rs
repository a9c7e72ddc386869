//! # specgrid CLI
//!
//! Command-line data entry for LED spectral measurement grids.
//!
//! ## Usage
//!
//! ```bash
//! # Record one reading (flat grid, persisted under ./specgrid-data)
//! specgrid set osa_visivel 5 green peak_nm 516.1
//!
//! # Show an equipment's sweep as a table
//! specgrid show osa_visivel
//!
//! # Extended grid: trials and spectrum views
//! specgrid --extended set osa_visivel 3 red intensity 84,23 --trial 2 --view 1
//!
//! # Interchange
//! specgrid export-csv osa_visivel
//! specgrid export-json
//! specgrid import dados_todos_2025-03-14T10-12-00.000Z.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use specgrid::cli::config::{Config, GridKind};
use specgrid::dataset::parse_reading;
use specgrid::export::{self, CsvScope};
use specgrid::persist::FileBackend;
use specgrid::schema::{Color, Coordinate, GridSchema, ReadingField};
use specgrid::store::{MeasurementStore, StoreOptions, DEFAULT_DEBOUNCE};

/// specgrid - LED spectral measurement logbook
#[derive(Parser)]
#[command(name = "specgrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the persisted grid files
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Config file path (defaults to ./specgrid.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Operate on the extended grid (trials + spectrum views)
    #[arg(long)]
    extended: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one reading into a cell (stored verbatim)
    Set {
        /// Equipment identifier (osa_visivel, thorlabs)
        equipment: String,

        /// Duty cycle value
        duty: u16,

        /// Color channel (green, red, blue)
        color: String,

        /// Reading field (peak_nm, intensity)
        field: String,

        /// The reading text; decimal point or comma both accepted
        value: String,

        /// Trial number (extended grid)
        #[arg(long)]
        trial: Option<u8>,

        /// Spectrum view number (extended grid, OSA only)
        #[arg(long)]
        view: Option<u8>,
    },

    /// Print one scope of the grid as a table
    Show {
        /// Equipment identifier
        equipment: String,

        /// Trial number (extended grid)
        #[arg(long)]
        trial: Option<u8>,

        /// Spectrum view number (extended grid, OSA only)
        #[arg(long)]
        view: Option<u8>,
    },

    /// Reset every cell of one equipment to empty
    Clear {
        /// Equipment identifier
        equipment: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Export one scope of the grid as CSV
    ExportCsv {
        /// Equipment identifier
        equipment: String,

        /// Trial number (extended grid)
        #[arg(long)]
        trial: Option<u8>,

        /// Spectrum view number (extended grid, OSA only)
        #[arg(long)]
        view: Option<u8>,

        /// Output file (defaults to dados_<scope>_<timestamp>.csv)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Export the full dataset as pretty-printed JSON
    ExportJson {
        /// Output file (defaults to dados_todos_<timestamp>.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Import a JSON file, replacing the full dataset
    Import {
        /// JSON file previously produced by export-json (or a bare
        /// coordinate mapping)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Display grid and persistence status
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = load_config(cli.config.as_deref())?;

    let grid = if cli.extended {
        GridKind::Extended
    } else {
        config.grid.unwrap_or(GridKind::Flat)
    };
    let schema = grid.schema();

    let data_dir = cli
        .data_dir
        .or(config.storage.dir)
        .unwrap_or_else(|| PathBuf::from("specgrid-data"));
    let debounce = config
        .storage
        .debounce_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or(DEFAULT_DEBOUNCE);

    info!("Data directory: {}", data_dir.display());
    let backend = FileBackend::new(data_dir);
    let mut store = MeasurementStore::open(schema, backend, StoreOptions { debounce })?;

    match cli.command {
        Commands::Set {
            equipment,
            duty,
            color,
            field,
            value,
            trial,
            view,
        } => run_set(&mut store, &equipment, duty, &color, &field, &value, trial, view),
        Commands::Show {
            equipment,
            trial,
            view,
        } => run_show(&store, &equipment, trial, view),
        Commands::Clear { equipment, yes } => run_clear(&mut store, &equipment, yes),
        Commands::ExportCsv {
            equipment,
            trial,
            view,
            output,
        } => run_export_csv(&store, &equipment, trial, view, output),
        Commands::ExportJson { output } => run_export_json(&store, output),
        Commands::Import { file } => run_import(&mut store, &file),
        Commands::Info => run_info(&store),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => {
            let default = Path::new("specgrid.toml");
            if default.exists() {
                Config::from_file(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Check the trial/view arguments against the equipment's axes and build
/// the cell coordinate.
fn resolve_coordinate(
    schema: &GridSchema,
    equipment: &str,
    duty: u16,
    color: Color,
    trial: Option<u8>,
    view: Option<u8>,
) -> Result<Coordinate> {
    let (trial, view) = resolve_axes(schema, equipment, trial, view)?;
    Ok(Coordinate {
        equipment: equipment.to_string(),
        trial,
        spectrum_view: view,
        duty_cycle: duty,
        color,
    })
}

fn resolve_axes(
    schema: &GridSchema,
    equipment: &str,
    trial: Option<u8>,
    view: Option<u8>,
) -> Result<(Option<u8>, Option<u8>)> {
    let Some(eq) = schema.equipment(equipment) else {
        bail!(
            "Unknown equipment '{equipment}' (expected one of: {})",
            schema
                .equipments
                .iter()
                .map(|e| e.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    let trial = match (eq.trials.is_empty(), trial) {
        (true, None) => None,
        (true, Some(_)) => bail!("This grid has no trial axis; drop --trial or pass --extended"),
        (false, Some(t)) => Some(t),
        (false, None) => bail!(
            "Equipment '{equipment}' needs --trial (1..={})",
            eq.trials.len()
        ),
    };
    let view = match (eq.spectrum_views.is_empty(), view) {
        (true, None) => None,
        (true, Some(_)) => bail!("Equipment '{equipment}' has no spectrum-view axis; drop --view"),
        (false, Some(v)) => Some(v),
        (false, None) => bail!(
            "Equipment '{equipment}' needs --view (1..={})",
            eq.spectrum_views.len()
        ),
    };
    Ok((trial, view))
}

fn resolve_scope<'a>(
    schema: &GridSchema,
    equipment: &'a str,
    trial: Option<u8>,
    view: Option<u8>,
) -> Result<CsvScope<'a>> {
    let (trial, view) = resolve_axes(schema, equipment, trial, view)?;
    Ok(match trial {
        None => CsvScope::Equipment(equipment),
        Some(trial) => CsvScope::TrialView {
            equipment,
            trial,
            spectrum_view: view,
        },
    })
}

#[allow(clippy::too_many_arguments)]
fn run_set(
    store: &mut MeasurementStore<FileBackend>,
    equipment: &str,
    duty: u16,
    color: &str,
    field: &str,
    value: &str,
    trial: Option<u8>,
    view: Option<u8>,
) -> Result<()> {
    let Some(color) = Color::from_id(color) else {
        bail!("Unknown color '{color}' (expected green, red or blue)");
    };
    let Some(field) = ReadingField::from_id(field) else {
        bail!("Unknown field '{field}' (expected peak_nm or intensity)");
    };
    let coordinate = resolve_coordinate(store.schema(), equipment, duty, color, trial, view)?;

    if !value.trim().is_empty() && parse_reading(value).is_none() {
        let hint = match field {
            ReadingField::PeakNm => color.peak_nm_hint(),
            ReadingField::Intensity => color.intensity_hint(),
        };
        warn!("Value {value:?} is not a parseable number (expected something like {hint}); storing it verbatim anyway");
    }

    store.set(&coordinate, field, value)?;
    store.flush()?;
    println!("Recorded {} {} = {value}", coordinate, field.id());
    Ok(())
}

fn run_show(
    store: &MeasurementStore<FileBackend>,
    equipment: &str,
    trial: Option<u8>,
    view: Option<u8>,
) -> Result<()> {
    let scope = resolve_scope(store.schema(), equipment, trial, view)?;
    let csv = export::to_csv(store.schema(), store.dataset(), &scope)?;
    for line in csv.lines() {
        println!("{}", line.replace("\",\"", " | ").trim_matches('"'));
    }
    Ok(())
}

fn run_clear(store: &mut MeasurementStore<FileBackend>, equipment: &str, yes: bool) -> Result<()> {
    let Some(eq) = store.schema().equipment(equipment) else {
        bail!("Unknown equipment '{equipment}'");
    };
    let label = eq.label.clone();

    if !yes {
        print!("Clear all data for equipment {label}? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y") {
            println!("Aborted; nothing was cleared.");
            return Ok(());
        }
    }

    store.clear_equipment(equipment);
    store.flush()?;
    println!("Cleared all cells for {label}.");
    Ok(())
}

fn run_export_csv(
    store: &MeasurementStore<FileBackend>,
    equipment: &str,
    trial: Option<u8>,
    view: Option<u8>,
    output: Option<PathBuf>,
) -> Result<()> {
    let scope = resolve_scope(store.schema(), equipment, trial, view)?;
    let csv = export::to_csv(store.schema(), store.dataset(), &scope)?;
    let path = output.unwrap_or_else(|| PathBuf::from(export::csv_filename(&scope, chrono::Utc::now())));

    std::fs::write(&path, csv)
        .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_export_json(store: &MeasurementStore<FileBackend>, output: Option<PathBuf>) -> Result<()> {
    let json = export::to_json(store.schema(), store.dataset())?;
    let path = output.unwrap_or_else(|| PathBuf::from(export::json_filename(chrono::Utc::now())));

    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_import(store: &mut MeasurementStore<FileBackend>, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let dataset = match export::from_json(store.schema(), &text) {
        Ok(dataset) => dataset,
        Err(e) => bail!(
            "Import failed: {e}. Check the file and try again; the current dataset was left unchanged."
        ),
    };

    store.replace(dataset)?;
    println!(
        "Import complete: {}/{} cells filled and saved.",
        store.dataset().filled_cell_count(),
        store.dataset().len()
    );
    Ok(())
}

fn run_info(store: &MeasurementStore<FileBackend>) -> Result<()> {
    let schema = store.schema();
    let dataset = store.dataset();

    println!("Grid version:  {}", schema.version);
    println!("Storage key:   {}", schema.storage_key);
    println!(
        "Cells filled:  {}/{}",
        dataset.filled_cell_count(),
        dataset.len()
    );
    let saved = match dataset.updated_at {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    };
    println!("Last saved:    {saved}");

    for eq in &schema.equipments {
        let filled = dataset
            .iter()
            .filter(|(c, cell)| c.equipment == eq.id && !cell.is_empty())
            .count();
        println!("  {:12} {} cells filled", eq.id, filled);
    }
    Ok(())
}
