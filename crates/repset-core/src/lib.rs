//! RepSet Core Library
//!
//! This crate provides the core functionality for RepSet, a local-first
//! workout tracker: workouts, exercises, logged sets and notes, all in a
//! single SQLite file.
//!
//! # Architecture
//!
//! - **SQLite**: Single file, single connection, transactional writes
//! - **Soft deletes**: Removed records become tombstones and are swept
//!   out after 30 days, so a recent delete can be revived by an import
//! - **Write queue**: Session saves go through a FIFO queue, keeping
//!   racing saves in submission order
//!
//! All queries are served from the live (non-tombstoned) rows.
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//!
//! // Set up a workout
//! let workout = store.create_workout("Push Day")?;
//! let bench = store.ensure_exercise(None, "Bench Press", "weight_reps", &units)?;
//! store.add_exercise_to_workout(&workout.id, &bench)?;
//!
//! // Log today's sets
//! let input = SessionInput {
//!     notes: "felt strong".into(),
//!     sets: vec![SetEntry::new().with_quantity(80.0, "kg").with_count(8.0, "")],
//! };
//! store.save_session(&bench, &today_day_key(), &input)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Data structures for workouts, exercises, sessions and sets
//! - `document`: JSON export and additive import
//! - `storage`: SQLite schema, row operations, write queue, purge
//! - `ids`: Record id generation
//! - `config`: Application configuration

pub mod config;
pub mod document;
pub mod ids;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use document::{ExportDocument, ImportError, ImportSummary};
pub use ids::new_id;
pub use models::{
    day_key_for, normalize_name, today_day_key, DaySession, Exercise, ExerciseType, ExerciseUnits,
    LinkedExercise, SessionInput, SetEntry, UnitsUpdate, Workout,
};
pub use store::Store;
