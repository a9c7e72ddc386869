//! # Measurement Grid Schema
//!
//! Defines the fixed coordinate space for an LED duty-cycle sweep:
//! equipment × trial × spectrum view × duty cycle × color. Every dataset
//! produced by this crate covers the grid exactly — one cell per
//! coordinate, no holes, no extras.
//!
//! ## Grid versions
//!
//! Two incompatible grid shapes exist and each persists under its own
//! storage key:
//!
//! | Version | Constructor | Duty cycles | Trials | Spectrum views |
//! |---------|-------------|-------------|--------|----------------|
//! | 1 | [`GridSchema::flat`] | 5, 10, …, 100 (%) | — | — |
//! | 2 | [`GridSchema::extended`] | 1..=10 | 1..=5 | 1..=4 (OSA only) |
//!
//! The versions are deliberately not migrated into each other: their
//! duty-cycle axes have no faithful mapping, so the extended grid starts
//! empty under a fresh key.
//!
//! ## Canonical order
//!
//! [`GridSchema::coordinates`] enumerates equipment → trial → spectrum
//! view → duty cycle → color. CSV export and every full-grid traversal
//! follow this order; it carries no meaning beyond determinism.

use std::fmt;

use crate::dataset::Dataset;

/// Storage key for the version-1 (flat) grid.
pub const STORAGE_KEY_V1: &str = "tcc_visible_osa_experimento_leds_v1";

/// Storage key for the version-2 (trial/spectrum-view) grid.
pub const STORAGE_KEY_V2: &str = "tcc_visible_osa_experimento_leds_v2";

/// Equipment identifiers as constants for type safety.
pub mod equipment {
    /// Visible-range optical spectrum analyzer.
    pub const OSA_VISIVEL: &str = "osa_visivel";
    /// ThorLabs spectrometer.
    pub const THORLABS: &str = "thorlabs";
}

/// LED color channel of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Color {
    /// Green channel.
    Green,
    /// Red channel.
    Red,
    /// Blue channel.
    Blue,
}

impl Color {
    /// All channels in canonical (CSV column) order.
    pub const ALL: [Color; 3] = [Color::Green, Color::Red, Color::Blue];

    /// Stable identifier used as a JSON map key.
    pub fn id(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Red => "red",
            Color::Blue => "blue",
        }
    }

    /// Display label (Portuguese, matching the lab sheets).
    pub fn label(&self) -> &'static str {
        match self {
            Color::Green => "Verde",
            Color::Red => "Vermelho",
            Color::Blue => "Azul",
        }
    }

    /// Example peak-wavelength reading shown as an input hint.
    pub fn peak_nm_hint(&self) -> &'static str {
        match self {
            Color::Green => "516.1",
            Color::Red => "637.7",
            Color::Blue => "468.2",
        }
    }

    /// Example intensity reading shown as an input hint.
    pub fn intensity_hint(&self) -> &'static str {
        match self {
            Color::Green => "177.85",
            Color::Red => "84.23",
            Color::Blue => "122.12",
        }
    }

    /// Look up a channel by its identifier.
    pub fn from_id(id: &str) -> Option<Color> {
        Color::ALL.into_iter().find(|c| c.id() == id)
    }
}

/// The two readings recorded per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingField {
    /// Peak wavelength in nanometers.
    PeakNm,
    /// Peak intensity (instrument units).
    Intensity,
}

impl ReadingField {
    /// Stable identifier used as a JSON object key.
    pub fn id(&self) -> &'static str {
        match self {
            ReadingField::PeakNm => "peak_nm",
            ReadingField::Intensity => "intensity",
        }
    }

    /// Look up a field by its identifier.
    pub fn from_id(id: &str) -> Option<ReadingField> {
        match id {
            "peak_nm" => Some(ReadingField::PeakNm),
            "intensity" => Some(ReadingField::Intensity),
            _ => None,
        }
    }
}

/// One equipment's axes within the grid.
///
/// Empty `trials` / `spectrum_views` mean the axis is absent for this
/// equipment (the flat grid has neither; ThorLabs never has views).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSpec {
    /// Stable identifier used as a JSON map key and in filenames.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Repeated-trial axis, ascending. Empty when absent.
    pub trials: Vec<u8>,
    /// Spectral-view axis, ascending. Empty when absent.
    pub spectrum_views: Vec<u8>,
}

/// Address of one measurement cell within the grid.
///
/// `trial` and `spectrum_view` are `None` exactly when the owning
/// equipment lacks that axis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    /// Equipment identifier.
    pub equipment: String,
    /// Trial number, when the equipment has a trial axis.
    pub trial: Option<u8>,
    /// Spectrum view number, when the equipment has a view axis.
    pub spectrum_view: Option<u8>,
    /// Duty cycle value (percent in the flat grid, step index in the
    /// extended grid).
    pub duty_cycle: u16,
    /// Color channel.
    pub color: Color,
}

impl Coordinate {
    /// Coordinate in a grid without trial/view axes.
    pub fn simple(equipment: &str, duty_cycle: u16, color: Color) -> Self {
        Coordinate {
            equipment: equipment.to_string(),
            trial: None,
            spectrum_view: None,
            duty_cycle,
            color,
        }
    }

    /// Coordinate in the extended grid.
    pub fn extended(
        equipment: &str,
        trial: u8,
        spectrum_view: Option<u8>,
        duty_cycle: u16,
        color: Color,
    ) -> Self {
        Coordinate {
            equipment: equipment.to_string(),
            trial: Some(trial),
            spectrum_view,
            duty_cycle,
            color,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.equipment)?;
        if let Some(t) = self.trial {
            write!(f, "/trial{}", t)?;
        }
        if let Some(v) = self.spectrum_view {
            write!(f, "/espectro{}", v)?;
        }
        write!(f, "/duty{}/{}", self.duty_cycle, self.color.id())
    }
}

/// The fixed coordinate space of one grid version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSchema {
    /// Dataset shape version, stamped into every persisted blob.
    pub version: u32,
    /// Key under which this grid persists. Distinct per version.
    pub storage_key: String,
    /// Equipments in canonical order.
    pub equipments: Vec<EquipmentSpec>,
    /// Duty-cycle axis, ascending, shared by all equipments.
    pub duty_cycles: Vec<u16>,
}

impl GridSchema {
    /// Version-1 grid: two equipments, duty cycles 5–100 % in steps of
    /// five, no trial or view axes.
    pub fn flat() -> Self {
        GridSchema {
            version: 1,
            storage_key: STORAGE_KEY_V1.to_string(),
            equipments: vec![
                EquipmentSpec {
                    id: equipment::OSA_VISIVEL.to_string(),
                    label: "OSA Visível".to_string(),
                    trials: Vec::new(),
                    spectrum_views: Vec::new(),
                },
                EquipmentSpec {
                    id: equipment::THORLABS.to_string(),
                    label: "ThorLabs".to_string(),
                    trials: Vec::new(),
                    spectrum_views: Vec::new(),
                },
            ],
            duty_cycles: (1..=20).map(|i| i * 5).collect(),
        }
    }

    /// Version-2 grid: five trials per equipment, duty cycles 1–10, four
    /// spectrum views on the OSA only.
    pub fn extended() -> Self {
        GridSchema {
            version: 2,
            storage_key: STORAGE_KEY_V2.to_string(),
            equipments: vec![
                EquipmentSpec {
                    id: equipment::OSA_VISIVEL.to_string(),
                    label: "OSA Visível".to_string(),
                    trials: (1..=5).collect(),
                    spectrum_views: (1..=4).collect(),
                },
                EquipmentSpec {
                    id: equipment::THORLABS.to_string(),
                    label: "ThorLabs".to_string(),
                    trials: (1..=5).collect(),
                    spectrum_views: Vec::new(),
                },
            ],
            duty_cycles: (1..=10).collect(),
        }
    }

    /// Look up an equipment by its identifier.
    pub fn equipment(&self, id: &str) -> Option<&EquipmentSpec> {
        self.equipments.iter().find(|e| e.id == id)
    }

    /// Whether a coordinate belongs to this grid.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        let Some(eq) = self.equipment(&coordinate.equipment) else {
            return false;
        };
        let trial_ok = match coordinate.trial {
            None => eq.trials.is_empty(),
            Some(t) => eq.trials.contains(&t),
        };
        let view_ok = match coordinate.spectrum_view {
            None => eq.spectrum_views.is_empty(),
            Some(v) => eq.spectrum_views.contains(&v),
        };
        trial_ok && view_ok && self.duty_cycles.contains(&coordinate.duty_cycle)
    }

    /// Every coordinate of the grid in canonical order: equipment →
    /// trial → spectrum view → duty cycle → color.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut out = Vec::with_capacity(self.cell_count());
        for eq in &self.equipments {
            for trial in axis(&eq.trials) {
                for view in axis(&eq.spectrum_views) {
                    for &duty in &self.duty_cycles {
                        for color in Color::ALL {
                            out.push(Coordinate {
                                equipment: eq.id.clone(),
                                trial,
                                spectrum_view: view,
                                duty_cycle: duty,
                                color,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.equipments
            .iter()
            .map(|eq| {
                axis(&eq.trials).len()
                    * axis(&eq.spectrum_views).len()
                    * self.duty_cycles.len()
                    * Color::ALL.len()
            })
            .sum()
    }

    /// Fully-populated, all-empty dataset for this grid.
    ///
    /// Pure and total: always succeeds and always covers every
    /// coordinate exactly once.
    pub fn default_dataset(&self) -> Dataset {
        Dataset::empty(self)
    }
}

/// An optional axis: absent axes contribute a single `None` step so the
/// enumeration loops stay uniform.
fn axis(values: &[u8]) -> Vec<Option<u8>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_grid_shape() {
        let schema = GridSchema::flat();
        assert_eq!(schema.version, 1);
        assert_eq!(schema.storage_key, STORAGE_KEY_V1);
        assert_eq!(schema.duty_cycles.first(), Some(&5));
        assert_eq!(schema.duty_cycles.last(), Some(&100));
        assert_eq!(schema.duty_cycles.len(), 20);
        // 2 equipments × 20 duty cycles × 3 colors
        assert_eq!(schema.cell_count(), 120);
        assert_eq!(schema.coordinates().len(), 120);
    }

    #[test]
    fn test_extended_grid_shape() {
        let schema = GridSchema::extended();
        assert_eq!(schema.version, 2);
        assert_eq!(schema.storage_key, STORAGE_KEY_V2);
        // OSA: 5 trials × 4 views × 10 duties × 3 colors = 600
        // ThorLabs: 5 trials × 10 duties × 3 colors = 150
        assert_eq!(schema.cell_count(), 750);
        assert_eq!(schema.coordinates().len(), 750);
    }

    #[test]
    fn test_contains() {
        let flat = GridSchema::flat();
        assert!(flat.contains(&Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green)));
        // Duty cycle off the axis
        assert!(!flat.contains(&Coordinate::simple(equipment::OSA_VISIVEL, 7, Color::Green)));
        // Unknown equipment
        assert!(!flat.contains(&Coordinate::simple("agilent", 5, Color::Green)));
        // Trial on a grid without a trial axis
        assert!(!flat.contains(&Coordinate::extended(
            equipment::OSA_VISIVEL,
            1,
            None,
            5,
            Color::Green
        )));

        let ext = GridSchema::extended();
        assert!(ext.contains(&Coordinate::extended(
            equipment::OSA_VISIVEL,
            1,
            Some(4),
            10,
            Color::Blue
        )));
        // OSA requires a spectrum view
        assert!(!ext.contains(&Coordinate::extended(
            equipment::OSA_VISIVEL,
            1,
            None,
            10,
            Color::Blue
        )));
        // ThorLabs has no views
        assert!(ext.contains(&Coordinate::extended(
            equipment::THORLABS,
            5,
            None,
            1,
            Color::Red
        )));
        assert!(!ext.contains(&Coordinate::extended(
            equipment::THORLABS,
            5,
            Some(1),
            1,
            Color::Red
        )));
    }

    #[test]
    fn test_canonical_order() {
        let schema = GridSchema::flat();
        let coords = schema.coordinates();
        assert_eq!(
            coords[0],
            Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green)
        );
        assert_eq!(coords[1].color, Color::Red);
        assert_eq!(coords[2].color, Color::Blue);
        assert_eq!(coords[3].duty_cycle, 10);
        // Second half of the enumeration is the second equipment
        assert_eq!(coords[60].equipment, equipment::THORLABS);

        // Deterministic
        assert_eq!(coords, schema.coordinates());
    }

    #[test]
    fn test_color_ids_round_trip() {
        for color in Color::ALL {
            assert_eq!(Color::from_id(color.id()), Some(color));
        }
        assert_eq!(Color::from_id("verde"), None);
        assert_eq!(ReadingField::from_id("peak_nm"), Some(ReadingField::PeakNm));
        assert_eq!(ReadingField::from_id("nm"), None);
    }

    #[test]
    fn test_labels_and_hints() {
        assert_eq!(Color::Green.label(), "Verde");
        assert_eq!(Color::Red.label(), "Vermelho");
        assert_eq!(Color::Blue.label(), "Azul");
        for color in Color::ALL {
            assert!(color.peak_nm_hint().parse::<f64>().is_ok());
            assert!(color.intensity_hint().parse::<f64>().is_ok());
        }
        let schema = GridSchema::flat();
        assert_eq!(
            schema.equipment(equipment::OSA_VISIVEL).unwrap().label,
            "OSA Visível"
        );
    }
}
