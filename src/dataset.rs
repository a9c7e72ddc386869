//! Cell and Dataset types: the in-memory measurement grid.
//!
//! A [`Dataset`] holds exactly one [`Cell`] per coordinate of its
//! [`GridSchema`](crate::schema::GridSchema). That invariant is
//! established by [`Dataset::empty`] and preserved by every operation:
//! `set` only writes keys that already exist, `clear_equipment` blanks
//! values without touching keys, and the tolerant merge in
//! [`persist`](crate::persist) only fills cells the schema defines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Coordinate, GridSchema, ReadingField};

/// One measurement cell: a peak-wavelength / intensity pair.
///
/// Both fields hold the operator's text verbatim — typically a decimal
/// number with `.` or `,` as separator, or the empty string. Values are
/// never coerced to numeric types; see [`parse_reading`] for the one
/// place parseability is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Peak wavelength reading in nanometers, as entered.
    pub peak_nm: String,
    /// Peak intensity reading, as entered.
    pub intensity: String,
}

impl Cell {
    /// Read one field.
    pub fn get(&self, field: ReadingField) -> &str {
        match field {
            ReadingField::PeakNm => &self.peak_nm,
            ReadingField::Intensity => &self.intensity,
        }
    }

    /// Write one field verbatim.
    pub fn set(&mut self, field: ReadingField, text: &str) {
        match field {
            ReadingField::PeakNm => self.peak_nm = text.to_string(),
            ReadingField::Intensity => self.intensity = text.to_string(),
        }
    }

    /// Whether both readings are blank.
    pub fn is_empty(&self) -> bool {
        self.peak_nm.is_empty() && self.intensity.is_empty()
    }
}

/// An operation referenced a coordinate outside the fixed grid.
///
/// This is a caller defect (the presentation layer desynchronized from
/// the schema), not a recoverable runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("coordinate outside the measurement grid: {0}")]
pub struct OutOfGridError(pub Coordinate);

/// The full measurement grid plus its persistence metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Grid shape version, matching the owning schema.
    pub version: u32,
    /// When the dataset was last serialized, if ever.
    pub updated_at: Option<DateTime<Utc>>,
    cells: BTreeMap<Coordinate, Cell>,
}

impl Dataset {
    /// All-empty dataset covering every coordinate of `schema`.
    pub fn empty(schema: &GridSchema) -> Self {
        Dataset {
            version: schema.version,
            updated_at: None,
            cells: schema
                .coordinates()
                .into_iter()
                .map(|c| (c, Cell::default()))
                .collect(),
        }
    }

    /// Read the cell at a coordinate.
    pub fn get(&self, coordinate: &Coordinate) -> Result<&Cell, OutOfGridError> {
        self.cells
            .get(coordinate)
            .ok_or_else(|| OutOfGridError(coordinate.clone()))
    }

    /// Cell lookup that treats an out-of-grid coordinate as absent.
    ///
    /// Export rendering uses this: a scope that misses the grid renders
    /// empty cells rather than failing.
    pub fn cell(&self, coordinate: &Coordinate) -> Option<&Cell> {
        self.cells.get(coordinate)
    }

    /// Store `text` verbatim into one field of one cell.
    pub fn set(
        &mut self,
        coordinate: &Coordinate,
        field: ReadingField,
        text: &str,
    ) -> Result<(), OutOfGridError> {
        let cell = self
            .cells
            .get_mut(coordinate)
            .ok_or_else(|| OutOfGridError(coordinate.clone()))?;
        cell.set(field, text);
        Ok(())
    }

    pub(crate) fn cell_mut(&mut self, coordinate: &Coordinate) -> Option<&mut Cell> {
        self.cells.get_mut(coordinate)
    }

    /// Reset every cell under one equipment to blank readings. Other
    /// equipments are untouched. Unknown ids are a no-op.
    pub fn clear_equipment(&mut self, equipment_id: &str) {
        for (coordinate, cell) in self.cells.iter_mut() {
            if coordinate.equipment == equipment_id {
                *cell = Cell::default();
            }
        }
    }

    /// Number of cells in the grid.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells (never true for a schema-built
    /// dataset).
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells holding at least one reading.
    pub fn filled_cell_count(&self) -> usize {
        self.cells.values().filter(|c| !c.is_empty()).count()
    }

    /// Iterate all cells. Map order, not the canonical schema order —
    /// full-grid traversals that care should walk
    /// [`GridSchema::coordinates`] instead.
    pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, &Cell)> {
        self.cells.iter()
    }
}

/// Check that operator-entered text parses as a decimal number,
/// accepting either `.` or `,` as the separator.
///
/// Used to validate pasted values before offering to store them; stored
/// text itself is never coerced.
pub fn parse_reading(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{equipment, Color};

    #[test]
    fn test_empty_covers_grid() {
        let schema = GridSchema::flat();
        let dataset = schema.default_dataset();
        assert_eq!(dataset.len(), schema.cell_count());
        assert_eq!(dataset.filled_cell_count(), 0);
        for coordinate in schema.coordinates() {
            assert_eq!(dataset.get(&coordinate).unwrap(), &Cell::default());
        }
    }

    #[test]
    fn test_set_stores_verbatim() {
        let schema = GridSchema::flat();
        let mut dataset = schema.default_dataset();
        let coord = Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green);

        // Decimal comma and stray spaces survive untouched
        dataset.set(&coord, ReadingField::PeakNm, "516,1 ").unwrap();
        assert_eq!(dataset.get(&coord).unwrap().peak_nm, "516,1 ");
        assert_eq!(dataset.get(&coord).unwrap().intensity, "");
        assert_eq!(dataset.filled_cell_count(), 1);
    }

    #[test]
    fn test_out_of_grid() {
        let schema = GridSchema::flat();
        let mut dataset = schema.default_dataset();
        let bad = Coordinate::simple("agilent", 5, Color::Green);

        assert_eq!(dataset.get(&bad), Err(OutOfGridError(bad.clone())));
        assert!(dataset.set(&bad, ReadingField::PeakNm, "1.0").is_err());
        assert!(dataset.cell(&bad).is_none());
    }

    #[test]
    fn test_clear_scoping() {
        let schema = GridSchema::flat();
        let mut dataset = schema.default_dataset();
        let osa = Coordinate::simple(equipment::OSA_VISIVEL, 5, Color::Green);
        let thor = Coordinate::simple(equipment::THORLABS, 5, Color::Green);
        dataset.set(&osa, ReadingField::PeakNm, "516.1").unwrap();
        dataset.set(&thor, ReadingField::PeakNm, "517.0").unwrap();

        dataset.clear_equipment(equipment::THORLABS);

        assert_eq!(dataset.get(&osa).unwrap().peak_nm, "516.1");
        assert!(dataset.get(&thor).unwrap().is_empty());
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("516.1"), Some(516.1));
        assert_eq!(parse_reading("516,1"), Some(516.1));
        assert_eq!(parse_reading("  84.23 "), Some(84.23));
        assert_eq!(parse_reading("-3,5"), Some(-3.5));
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("   "), None);
        assert_eq!(parse_reading("abc"), None);
        assert_eq!(parse_reading("1.2.3"), None);
        assert_eq!(parse_reading("NaN"), None);
        assert_eq!(parse_reading("inf"), None);
    }
}
