//! Unified storage interface
//!
//! The `Store` owns the SQLite connection and exposes the whole data
//! API: workouts, exercises, workout membership, per-day sessions,
//! maintenance and JSON export/import.
//!
//! ## Concurrency
//!
//! `Store` is `Clone`; handles share one connection behind a mutex.
//! Session writes additionally pass through a FIFO queue, so saves
//! land in submission order even when callers race.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;  // Creates or loads existing
//!
//! let workout = store.create_workout("Push Day")?;
//! let bench = store.ensure_exercise(None, "Bench Press", "weight_reps", &units)?;
//! store.add_exercise_to_workout(&workout.id, &bench)?;
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::document::{self, ExportDocument, ImportSummary};
use crate::models::{
    DaySession, Exercise, ExerciseUnits, LinkedExercise, SessionInput, UnitsUpdate, Workout,
};
use crate::storage::{entities, purge, schema, sessions, WriteQueue};

/// Unified storage interface for RepSet
///
/// Cheap to clone; all clones share the same database.
#[derive(Clone)]
pub struct Store {
    /// Shared SQLite connection
    conn: Arc<Mutex<Connection>>,
    /// FIFO queue for session writes
    writes: Arc<WriteQueue>,
    /// Configuration
    config: Config,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl Store {
    /// Open the store at the configured database path
    ///
    /// On first run this creates the data directory, the database file
    /// and the schema. Every open also sweeps out expired tombstones.
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let path = config.db_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        debug!("Opened database at {:?}", path);
        Self::from_connection(conn, config)
    }

    /// Open an ephemeral in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, Config::default())
    }

    fn from_connection(mut conn: Connection, config: Config) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign key enforcement")?;
        schema::initialize(&mut conn).context("Failed to initialize database schema")?;

        // Sweep expired tombstones; a failed sweep is not fatal
        match purge::purge_deleted(
            &mut conn,
            Duration::days(purge::TOMBSTONE_RETENTION_DAYS),
            now_ms(),
        ) {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} expired tombstones", purged),
            Err(e) => warn!("Tombstone purge failed: {}", e),
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            writes: Arc::new(WriteQueue::new()),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        // A panicked writer rolled back its transaction; the connection
        // stays usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_tx<T>(&self, job: impl FnOnce(&Transaction) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        let value = job(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Like `with_tx`, but jobs run strictly in submission order
    fn with_queued_tx<T>(
        &self,
        job: impl FnOnce(&Transaction) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.writes.run(|| self.with_tx(job))
    }

    // ==================== Workout Operations ====================

    /// Create a workout at the end of the list
    pub fn create_workout(&self, name: &str) -> Result<Workout> {
        self.with_tx(|tx| entities::create_workout(tx, name, now_ms()))
            .context("Failed to create workout")
    }

    /// Get all workouts in list order
    pub fn list_workouts(&self) -> Result<Vec<Workout>> {
        entities::list_workouts(&self.connection()).context("Failed to list workouts")
    }

    /// Rename a workout
    pub fn rename_workout(&self, id: &str, name: &str) -> Result<()> {
        entities::rename_workout(&self.connection(), id, name, now_ms())
            .context("Failed to rename workout")
    }

    /// Delete a workout (a tombstone; history is untouched)
    pub fn delete_workout(&self, id: &str) -> Result<()> {
        entities::soft_delete_workout(&self.connection(), id, now_ms())
            .context("Failed to delete workout")
    }

    /// Swap the list positions of two workouts
    pub fn swap_workout_positions(&self, first: &str, second: &str) -> Result<()> {
        self.with_tx(|tx| entities::swap_workout_positions(tx, first, second, now_ms()))
            .context("Failed to swap workout positions")
    }

    // ==================== Exercise Operations ====================

    /// Find or create an exercise, returning its id
    ///
    /// Matches by id first, then by normalized name; a match is updated
    /// in place (and revived if tombstoned) rather than duplicated.
    pub fn ensure_exercise(
        &self,
        id: Option<&str>,
        name: &str,
        kind: &str,
        units: &ExerciseUnits,
    ) -> Result<String> {
        self.with_tx(|tx| entities::ensure_exercise(tx, id, name, kind, units, now_ms()))
            .context("Failed to ensure exercise")
    }

    /// Get all exercises sorted by name
    pub fn list_exercises(&self) -> Result<Vec<Exercise>> {
        entities::list_exercises(&self.connection()).context("Failed to list exercises")
    }

    /// Rename an exercise
    pub fn rename_exercise(&self, id: &str, name: &str) -> Result<()> {
        entities::rename_exercise(&self.connection(), id, name, now_ms())
            .context("Failed to rename exercise")
    }

    /// Change an exercise's default units; `None` fields keep their value
    pub fn update_exercise_units(&self, id: &str, update: &UnitsUpdate) -> Result<()> {
        entities::update_exercise_units(&self.connection(), id, update, now_ms())
            .context("Failed to update exercise units")
    }

    /// Delete an exercise along with its links, sessions and sets
    pub fn delete_exercise_everywhere(&self, id: &str) -> Result<()> {
        self.with_queued_tx(|tx| sessions::delete_exercise_everywhere(tx, id, now_ms()))
            .context("Failed to delete exercise")
    }

    // ==================== Workout Membership ====================

    /// Add an exercise to the end of a workout
    ///
    /// Does nothing if either side is missing or deleted.
    pub fn add_exercise_to_workout(&self, workout_id: &str, exercise_id: &str) -> Result<()> {
        self.with_tx(|tx| entities::add_exercise_to_workout(tx, workout_id, exercise_id, now_ms()))
            .context("Failed to add exercise to workout")
    }

    /// Remove an exercise from a workout (history is untouched)
    pub fn remove_exercise_from_workout(&self, workout_id: &str, exercise_id: &str) -> Result<()> {
        entities::remove_exercise_from_workout(&self.connection(), workout_id, exercise_id, now_ms())
            .context("Failed to remove exercise from workout")
    }

    /// Swap the positions of two exercises within a workout
    pub fn swap_link_positions(&self, workout_id: &str, first: &str, second: &str) -> Result<()> {
        self.with_tx(|tx| entities::swap_link_positions(tx, workout_id, first, second, now_ms()))
            .context("Failed to swap exercise positions")
    }

    /// Get a workout's exercises in display order
    pub fn list_workout_exercises(&self, workout_id: &str) -> Result<Vec<LinkedExercise>> {
        entities::list_workout_exercises(&self.connection(), workout_id)
            .context("Failed to list workout exercises")
    }

    // ==================== Session Operations ====================

    /// Replace the logged day for an exercise
    ///
    /// An input with no sets and blank notes deletes the day. Writes
    /// are queued, so racing saves apply in submission order.
    pub fn save_session(&self, exercise_id: &str, day_key: &str, input: &SessionInput) -> Result<()> {
        self.with_queued_tx(|tx| sessions::save_session(tx, exercise_id, day_key, input, now_ms()))
            .context("Failed to save session")
    }

    /// Get an exercise's full history, keyed by day
    pub fn sessions_for_exercise(&self, exercise_id: &str) -> Result<BTreeMap<String, DaySession>> {
        sessions::sessions_for_exercise(&self.connection(), exercise_id)
            .context("Failed to load sessions")
    }

    /// Delete an exercise's history between two day keys, inclusive
    pub fn delete_history_in_range(
        &self,
        exercise_id: &str,
        from_day: &str,
        to_day: &str,
    ) -> Result<()> {
        self.with_queued_tx(|tx| {
            sessions::delete_history_in_range(tx, exercise_id, from_day, to_day, now_ms())
        })
        .context("Failed to delete history range")
    }

    // ==================== Maintenance ====================

    /// Hard-delete tombstones older than `retention`, returning the
    /// number of rows removed
    pub fn purge_deleted(&self, retention: Duration) -> Result<usize> {
        let mut conn = self.connection();
        purge::purge_deleted(&mut conn, retention, now_ms()).context("Failed to purge tombstones")
    }

    /// Wipe every record, live and deleted
    pub fn reset_all_data(&self) -> Result<()> {
        let mut conn = self.connection();
        purge::reset_all(&mut conn).context("Failed to reset data")?;
        info!("All data reset");
        Ok(())
    }

    // ==================== Export / Import ====================

    /// Snapshot all live data as an export document
    pub fn export_all(&self) -> Result<ExportDocument> {
        document::export_all(&self.connection()).context("Failed to export data")
    }

    /// Merge a JSON export into this store
    ///
    /// Additive: local data is never overwritten. See [`crate::document`]
    /// for the merge rules.
    pub fn import_all(&self, raw: &str) -> Result<ImportSummary> {
        document::import_all(self, raw).context("Failed to import data")
    }
}
