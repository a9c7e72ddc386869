//! State store: the mutable dataset behind the data-entry surface.
//!
//! [`MeasurementStore`] is the context object the presentation layer
//! owns (one per grid version — never a singleton). It pairs the
//! in-memory [`Dataset`] with a [`StorageBackend`] and coalesces writes:
//! each mutation (re)schedules a save `debounce` after the latest edit,
//! so rapid typing produces exactly one persisted blob per idle gap.
//!
//! The crate never spawns timers. Execution is single-threaded and
//! event-driven, so the caller owns the clock: it calls
//! [`MeasurementStore::tick`] from its event loop and the pending save
//! fires when due. One-shot callers (the CLI) call
//! [`MeasurementStore::flush`] before exiting instead.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::dataset::{Cell, Dataset, OutOfGridError};
use crate::persist::{self, StorageBackend, StorageError};
use crate::schema::{Coordinate, GridSchema, ReadingField};

/// Debounce window matching the original tool's save timer.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Tuning knobs for [`MeasurementStore::open`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Idle gap after the last mutation before the blob is written.
    pub debounce: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// The current dataset plus debounced persistence.
#[derive(Debug)]
pub struct MeasurementStore<B: StorageBackend> {
    schema: GridSchema,
    dataset: Dataset,
    backend: B,
    debounce: Duration,
    save_due: Option<Instant>,
}

impl<B: StorageBackend> MeasurementStore<B> {
    /// Open the store, loading any persisted grid under the schema's
    /// storage key.
    ///
    /// A corrupt or foreign-shaped blob loads as an empty grid (the
    /// fail-soft contract of [`persist::deserialize`]); only a real
    /// backend I/O failure is an error.
    pub fn open(
        schema: GridSchema,
        backend: B,
        options: StoreOptions,
    ) -> Result<Self, StorageError> {
        let blob = backend.load(&schema.storage_key)?;
        let dataset = persist::deserialize(&schema, blob.as_deref());
        info!(
            "Opened grid v{} ({}): {}/{} cells filled",
            schema.version,
            schema.storage_key,
            dataset.filled_cell_count(),
            dataset.len()
        );
        Ok(MeasurementStore {
            schema,
            dataset,
            backend,
            debounce: options.debounce,
            save_due: None,
        })
    }

    /// The grid this store operates on.
    pub fn schema(&self) -> &GridSchema {
        &self.schema
    }

    /// Read-only view of the current dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Backend access, mainly for tests inspecting persisted blobs.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read the cell at a coordinate.
    pub fn get(&self, coordinate: &Coordinate) -> Result<&Cell, OutOfGridError> {
        self.dataset.get(coordinate)
    }

    /// Store `text` verbatim into one field and schedule the debounced
    /// save.
    pub fn set(
        &mut self,
        coordinate: &Coordinate,
        field: ReadingField,
        text: &str,
    ) -> Result<(), OutOfGridError> {
        self.dataset.set(coordinate, field, text)?;
        self.schedule_save();
        Ok(())
    }

    /// Blank every cell under one equipment and schedule the debounced
    /// save. Other equipments keep their readings.
    pub fn clear_equipment(&mut self, equipment_id: &str) {
        self.dataset.clear_equipment(equipment_id);
        self.schedule_save();
    }

    /// Swap in an entirely new dataset (the import path) and persist it
    /// at once, superseding any pending debounced save.
    pub fn replace(&mut self, dataset: Dataset) -> Result<(), StorageError> {
        self.dataset = dataset;
        self.save_due = None;
        self.persist_now()
    }

    /// Clock hook for the host event loop: writes the pending blob once
    /// the debounce window has elapsed. Returns whether a write
    /// happened.
    pub fn tick(&mut self, now: Instant) -> Result<bool, StorageError> {
        match self.save_due {
            Some(due) if now >= due => {
                self.save_due = None;
                self.persist_now()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write any pending state immediately. Returns whether a write
    /// happened.
    pub fn flush(&mut self) -> Result<bool, StorageError> {
        if self.save_due.take().is_some() {
            self.persist_now()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Whether a debounced save is waiting for its window to elapse.
    pub fn is_save_pending(&self) -> bool {
        self.save_due.is_some()
    }

    fn schedule_save(&mut self) {
        // Every mutation resets the deadline: only the latest in-memory
        // state is ever persisted.
        self.save_due = Some(Instant::now() + self.debounce);
    }

    fn persist_now(&mut self) -> Result<(), StorageError> {
        let blob = persist::serialize(&self.schema, &mut self.dataset);
        self.backend.store(&self.schema.storage_key, &blob)?;
        debug!(
            "Saved grid {} at {:?}",
            self.schema.storage_key, self.dataset.updated_at
        );
        Ok(())
    }
}
