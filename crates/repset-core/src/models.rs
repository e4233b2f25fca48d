//! Data models for RepSet
//!
//! Defines the core data structures: workouts, exercises, the links
//! between them, and per-day sessions of logged sets. Rows deleted in the
//! UI become tombstones (`deleted_at` set) rather than disappearing, so
//! the types here carry that state too.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::new_id;

/// A named workout: an ordered collection of exercises
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    /// Unique identifier
    pub id: String,
    /// Display name (stored trimmed)
    pub name: String,
    /// Manual sort position; new workouts append at the end
    pub position: i64,
    /// When this workout was last updated
    pub updated_at: DateTime<Utc>,
    /// Tombstone timestamp; `None` while the workout is live
    pub deleted_at: Option<DateTime<Utc>>,
    /// Whether this row has local changes since the last export
    pub dirty: bool,
}

/// An exercise definition, shared across workouts
///
/// The same exercise appears in any number of workouts; its logged
/// history belongs to the exercise, not to a workout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    /// Measurement shape; see [`ExerciseType`] for the known values.
    /// Stored as an opaque string so imports from newer app versions
    /// survive untouched.
    #[serde(rename = "type")]
    pub kind: String,
    /// Unit for the primary measure (e.g. "kg", "km"); empty when unused
    pub quantity_unit: String,
    /// Unit for the secondary measure (e.g. "min"); empty when unused
    pub count_unit: String,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub dirty: bool,
}

/// An exercise as it appears inside a workout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedExercise {
    /// Position within the workout (listing order is position descending)
    pub position: i64,
    /// The linked exercise
    pub exercise: Exercise,
}

/// One day of logged work for an exercise
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaySession {
    /// Free-form notes for the day; empty when none were written
    pub notes: String,
    /// Logged sets in display order
    pub sets: Vec<SetEntry>,
}

/// A single logged set
///
/// Both measures are optional: a "reps only" exercise fills only
/// `quantity`, a "distance × time" exercise fills both. Units are
/// recorded per set so changing an exercise's units later does not
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetEntry {
    pub id: String,
    pub quantity: Option<f64>,
    pub quantity_unit_used: Option<String>,
    pub count: Option<f64>,
    pub count_unit_used: Option<String>,
}

impl SetEntry {
    /// Create an empty set with a fresh id
    pub fn new() -> Self {
        Self {
            id: new_id(),
            quantity: None,
            quantity_unit_used: None,
            count: None,
            count_unit_used: None,
        }
    }

    /// Set the primary measure and the unit it was logged in
    pub fn with_quantity(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.quantity = Some(value);
        self.quantity_unit_used = Some(unit.into());
        self
    }

    /// Set the secondary measure and the unit it was logged in
    pub fn with_count(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.count = Some(value);
        self.count_unit_used = Some(unit.into());
        self
    }
}

impl Default for SetEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Replacement payload for one (exercise, day) session
///
/// Saving replaces the whole day. An input with no sets and blank notes
/// deletes the day instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionInput {
    /// Notes as typed; whitespace-only counts as empty
    pub notes: String,
    /// The full set list for the day, in display order
    pub sets: Vec<SetEntry>,
}

/// Display units for an exercise
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExerciseUnits {
    pub quantity_unit: String,
    pub count_unit: String,
}

/// Partial update for an exercise's units
///
/// `None` leaves the corresponding unit untouched; `Some("")` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitsUpdate {
    pub quantity_unit: Option<String>,
    pub count_unit: Option<String>,
}

/// The measurement shapes the app knows how to render
///
/// [`Exercise::kind`] stays a plain string in storage; this enum is the
/// catalog offered when creating an exercise. `parse` returns `None` for
/// kinds recorded by a newer version of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    WeightReps,
    WeightOnly,
    RepsOnly,
    Time,
    Distance,
    DistanceTime,
    QuantityOnly,
    QuantityCount,
}

impl ExerciseType {
    /// Every known type, in menu order
    pub const ALL: [ExerciseType; 8] = [
        ExerciseType::WeightReps,
        ExerciseType::WeightOnly,
        ExerciseType::RepsOnly,
        ExerciseType::Time,
        ExerciseType::Distance,
        ExerciseType::DistanceTime,
        ExerciseType::QuantityOnly,
        ExerciseType::QuantityCount,
    ];

    /// The string stored in the database and in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::WeightReps => "weight_reps",
            ExerciseType::WeightOnly => "weight_only",
            ExerciseType::RepsOnly => "reps_only",
            ExerciseType::Time => "time",
            ExerciseType::Distance => "distance",
            ExerciseType::DistanceTime => "distance_time",
            ExerciseType::QuantityOnly => "quantity_only",
            ExerciseType::QuantityCount => "quantity_count",
        }
    }

    /// Parse a stored kind string
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }

    /// Human-readable name for menus
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseType::WeightReps => "Weight × Reps",
            ExerciseType::WeightOnly => "Weight",
            ExerciseType::RepsOnly => "Reps",
            ExerciseType::Time => "Time",
            ExerciseType::Distance => "Distance",
            ExerciseType::DistanceTime => "Distance × Time",
            ExerciseType::QuantityOnly => "Quantity (generic)",
            ExerciseType::QuantityCount => "Quantity × Count (generic)",
        }
    }

    /// Units a freshly created exercise of this type starts with
    pub fn default_units(&self) -> ExerciseUnits {
        let (quantity, count) = match self {
            ExerciseType::WeightReps | ExerciseType::WeightOnly => ("kg", ""),
            ExerciseType::RepsOnly => ("", ""),
            ExerciseType::Time => ("s", ""),
            ExerciseType::Distance => ("km", ""),
            ExerciseType::DistanceTime => ("km", "min"),
            ExerciseType::QuantityOnly => ("qty", ""),
            ExerciseType::QuantityCount => ("qty", "ct"),
        };
        ExerciseUnits {
            quantity_unit: quantity.to_string(),
            count_unit: count.to_string(),
        }
    }
}

impl Default for ExerciseType {
    fn default() -> Self {
        ExerciseType::WeightReps
    }
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize an exercise name for identity comparison
///
/// Matching is case-insensitive and ignores leading, trailing and
/// repeated whitespace: "Bench Press", " bench  press " and
/// "BENCH PRESS" are all the same exercise.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Format a date as a day key ("YYYY-MM-DD")
///
/// Day keys sort lexicographically in date order, which the store relies
/// on for range deletes.
pub fn day_key_for(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Day key for the current date
///
/// Sessions group under the calendar day the user saw while logging, so
/// this uses local time rather than UTC.
pub fn today_day_key() -> String {
    day_key_for(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Bench Press"), "bench press");
        assert_eq!(normalize_name("  bench   press  "), "bench press");
        assert_eq!(normalize_name("BENCH\tPRESS"), "bench press");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_exercise_type_round_trip() {
        for kind in ExerciseType::ALL {
            assert_eq!(ExerciseType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ExerciseType::parse("hover_board"), None);
    }

    #[test]
    fn test_exercise_type_default() {
        assert_eq!(ExerciseType::default(), ExerciseType::WeightReps);
        assert_eq!(ExerciseType::default().as_str(), "weight_reps");
    }

    #[test]
    fn test_exercise_type_default_units() {
        let units = ExerciseType::WeightReps.default_units();
        assert_eq!(units.quantity_unit, "kg");
        assert_eq!(units.count_unit, "");

        let units = ExerciseType::DistanceTime.default_units();
        assert_eq!(units.quantity_unit, "km");
        assert_eq!(units.count_unit, "min");

        let units = ExerciseType::RepsOnly.default_units();
        assert_eq!(units.quantity_unit, "");
        assert_eq!(units.count_unit, "");
    }

    #[test]
    fn test_exercise_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&ExerciseType::DistanceTime).unwrap();
        assert_eq!(json, "\"distance_time\"");
        let parsed: ExerciseType = serde_json::from_str("\"weight_only\"").unwrap();
        assert_eq!(parsed, ExerciseType::WeightOnly);
    }

    #[test]
    fn test_set_entry_builders() {
        let set = SetEntry::new().with_quantity(80.0, "kg").with_count(8.0, "");
        assert!(!set.id.is_empty());
        assert_eq!(set.quantity, Some(80.0));
        assert_eq!(set.quantity_unit_used.as_deref(), Some("kg"));
        assert_eq!(set.count, Some(8.0));
    }

    #[test]
    fn test_set_entries_get_distinct_ids() {
        assert_ne!(SetEntry::new().id, SetEntry::new().id);
    }

    #[test]
    fn test_day_key_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(day_key_for(date), "2025-03-07");
    }

    #[test]
    fn test_day_keys_sort_chronologically() {
        let earlier = day_key_for(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());
        let later = day_key_for(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn test_exercise_serializes_kind_as_type() {
        let exercise = Exercise {
            id: "e1".to_string(),
            name: "Bench Press".to_string(),
            kind: "weight_reps".to_string(),
            quantity_unit: "kg".to_string(),
            count_unit: String::new(),
            updated_at: Utc::now(),
            deleted_at: None,
            dirty: true,
        };

        let json = serde_json::to_string(&exercise).unwrap();
        assert!(json.contains("\"type\":\"weight_reps\""));
        assert!(!json.contains("\"kind\""));

        let parsed: Exercise = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, exercise);
    }

    #[test]
    fn test_session_input_default_is_empty() {
        let input = SessionInput::default();
        assert!(input.notes.is_empty());
        assert!(input.sets.is_empty());
    }
}
