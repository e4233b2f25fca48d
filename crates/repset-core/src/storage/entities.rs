//! Workout and exercise records
//!
//! CRUD over the three catalog tables: `workouts`, `exercises` and the
//! `workout_exercises` junction. Deletes here are tombstones (`deleted_at`
//! gets set) so a later import can still reconcile against removed rows;
//! physical removal happens in the purge sweep.
//!
//! Functions that issue several statements take a [`Transaction`] and
//! rely on the caller to commit; single-statement operations take a plain
//! [`Connection`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result, Row, Transaction};

use crate::ids::new_id;
use crate::models::{normalize_name, Exercise, ExerciseUnits, LinkedExercise, UnitsUpdate, Workout};

// ==================== Workout Operations ====================

/// Insert a workout at the end of the manual order
///
/// The new position is one past the highest live position, so deleted
/// workouts do not leave gaps that new ones avoid.
pub fn create_workout(tx: &Transaction, name: &str, now: i64) -> Result<Workout> {
    let position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM workouts WHERE deleted_at IS NULL",
        [],
        |row| row.get(0),
    )?;

    let workout = Workout {
        id: new_id(),
        name: name.trim().to_string(),
        position,
        updated_at: datetime_from_millis(now),
        deleted_at: None,
        dirty: true,
    };

    tx.execute(
        "INSERT INTO workouts (id, name, position, updated_at, deleted_at, dirty)
         VALUES (?, ?, ?, ?, NULL, 1)",
        params![workout.id, workout.name, workout.position, now],
    )?;

    Ok(workout)
}

/// All live workouts in manual order
pub fn list_workouts(conn: &Connection) -> Result<Vec<Workout>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, position, updated_at, deleted_at, dirty
         FROM workouts WHERE deleted_at IS NULL ORDER BY position ASC",
    )?;

    let rows = stmt.query_map([], workout_from_row)?;
    rows.collect()
}

/// Rename a live workout; unknown or deleted ids are a no-op
pub fn rename_workout(conn: &Connection, id: &str, name: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE workouts SET name = ?, updated_at = ?, dirty = 1
         WHERE id = ? AND deleted_at IS NULL",
        params![name.trim(), now, id],
    )?;
    Ok(())
}

/// Tombstone a workout
pub fn soft_delete_workout(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE workouts SET deleted_at = ?1, updated_at = ?1, dirty = 1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

/// Swap the manual positions of two live workouts
///
/// If either id is unknown or tombstoned, neither row changes.
pub fn swap_workout_positions(tx: &Transaction, first: &str, second: &str, now: i64) -> Result<()> {
    let first_pos = live_workout_position(tx, first)?;
    let second_pos = live_workout_position(tx, second)?;

    let (first_pos, second_pos) = match (first_pos, second_pos) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(()),
    };

    tx.execute(
        "UPDATE workouts SET position = ?, updated_at = ?, dirty = 1 WHERE id = ?",
        params![second_pos, now, first],
    )?;
    tx.execute(
        "UPDATE workouts SET position = ?, updated_at = ?, dirty = 1 WHERE id = ?",
        params![first_pos, now, second],
    )?;
    Ok(())
}

fn live_workout_position(conn: &Connection, id: &str) -> Result<Option<i64>> {
    maybe_row(conn.query_row(
        "SELECT position FROM workouts WHERE id = ? AND deleted_at IS NULL",
        params![id],
        |row| row.get(0),
    ))
}

// ==================== Exercise Operations ====================

/// Find-or-create an exercise, returning its canonical id
///
/// Resolution order:
/// 1. `id`, when given, matched against every row including tombstones
/// 2. normalized name, again including tombstones
/// 3. insert a new row (under `id` when given, else a fresh one)
///
/// A match is overwritten in place with the given name, kind and units,
/// and revived if it was tombstoned. This is what makes imports converge:
/// "bench press" on two devices ends up as one exercise.
pub fn ensure_exercise(
    tx: &Transaction,
    id: Option<&str>,
    name: &str,
    kind: &str,
    units: &ExerciseUnits,
    now: i64,
) -> Result<String> {
    let display_name = name.trim();
    let name_key = normalize_name(name);

    let wanted = id.map(str::trim).filter(|value| !value.is_empty());
    if let Some(wanted) = wanted {
        let found = maybe_row(tx.query_row(
            "SELECT id FROM exercises WHERE id = ?",
            params![wanted],
            |row| row.get::<_, String>(0),
        ))?;
        if let Some(found) = found {
            overwrite_exercise(tx, &found, display_name, kind, units, now)?;
            return Ok(found);
        }
    }

    for (candidate_id, candidate_name) in all_exercise_names(tx)? {
        if normalize_name(&candidate_name) == name_key {
            overwrite_exercise(tx, &candidate_id, display_name, kind, units, now)?;
            return Ok(candidate_id);
        }
    }

    let fresh = wanted.map(str::to_string).unwrap_or_else(new_id);
    tx.execute(
        "INSERT INTO exercises (id, name, type, quantity_unit, count_unit, updated_at, deleted_at, dirty)
         VALUES (?, ?, ?, ?, ?, ?, NULL, 1)",
        params![fresh, display_name, kind, units.quantity_unit, units.count_unit, now],
    )?;
    Ok(fresh)
}

/// Overwrite an exercise row and clear its tombstone
fn overwrite_exercise(
    tx: &Transaction,
    id: &str,
    name: &str,
    kind: &str,
    units: &ExerciseUnits,
    now: i64,
) -> Result<()> {
    tx.execute(
        "UPDATE exercises
         SET name = ?, type = ?, quantity_unit = ?, count_unit = ?,
             deleted_at = NULL, updated_at = ?, dirty = 1
         WHERE id = ?",
        params![name, kind, units.quantity_unit, units.count_unit, now, id],
    )?;
    Ok(())
}

/// Every exercise id and name, tombstones included
///
/// Name matching must see deleted rows, otherwise re-creating a deleted
/// exercise would mint a second id for the same name.
pub(crate) fn all_exercise_names(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT id, name FROM exercises")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// All live exercises, sorted by name (case-insensitive)
pub fn list_exercises(conn: &Connection) -> Result<Vec<Exercise>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type, quantity_unit, count_unit, updated_at, deleted_at, dirty
         FROM exercises WHERE deleted_at IS NULL ORDER BY name COLLATE NOCASE ASC",
    )?;

    let rows = stmt.query_map([], exercise_from_row)?;
    rows.collect()
}

/// Rename a live exercise; unknown or deleted ids are a no-op
pub fn rename_exercise(conn: &Connection, id: &str, name: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE exercises SET name = ?, updated_at = ?, dirty = 1
         WHERE id = ? AND deleted_at IS NULL",
        params![name.trim(), now, id],
    )?;
    Ok(())
}

/// Update one or both units of a live exercise
///
/// `None` fields keep their current value; logged sets are untouched
/// because they carry the unit they were recorded in.
pub fn update_exercise_units(
    conn: &Connection,
    id: &str,
    update: &UnitsUpdate,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE exercises
         SET quantity_unit = COALESCE(?2, quantity_unit),
             count_unit = COALESCE(?3, count_unit),
             updated_at = ?4, dirty = 1
         WHERE id = ?1 AND deleted_at IS NULL",
        params![id, update.quantity_unit, update.count_unit, now],
    )?;
    Ok(())
}

// ==================== Workout Membership ====================

/// Link an exercise into a workout at the end of its order
///
/// Unknown or tombstoned workout/exercise ids are silently skipped.
/// Re-adding a removed link revives it at a fresh end position.
pub fn add_exercise_to_workout(
    tx: &Transaction,
    workout_id: &str,
    exercise_id: &str,
    now: i64,
) -> Result<()> {
    if !workout_is_live(tx, workout_id)? || !exercise_is_live(tx, exercise_id)? {
        return Ok(());
    }

    let position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM workout_exercises
         WHERE workout_id = ? AND deleted_at IS NULL",
        params![workout_id],
        |row| row.get(0),
    )?;

    tx.execute(
        "INSERT INTO workout_exercises (workout_id, exercise_id, position, updated_at, deleted_at, dirty)
         VALUES (?, ?, ?, ?, NULL, 1)
         ON CONFLICT(workout_id, exercise_id) DO UPDATE SET
             position = excluded.position,
             deleted_at = NULL,
             updated_at = excluded.updated_at,
             dirty = 1",
        params![workout_id, exercise_id, position, now],
    )?;
    Ok(())
}

/// Tombstone a link; the exercise and its history stay
pub fn remove_exercise_from_workout(
    conn: &Connection,
    workout_id: &str,
    exercise_id: &str,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE workout_exercises SET deleted_at = ?1, updated_at = ?1, dirty = 1
         WHERE workout_id = ?2 AND exercise_id = ?3",
        params![now, workout_id, exercise_id],
    )?;
    Ok(())
}

/// Swap the positions of two live links within a workout
///
/// If either link is missing or tombstoned, neither row changes.
pub fn swap_link_positions(
    tx: &Transaction,
    workout_id: &str,
    first: &str,
    second: &str,
    now: i64,
) -> Result<()> {
    let first_pos = live_link_position(tx, workout_id, first)?;
    let second_pos = live_link_position(tx, workout_id, second)?;

    let (first_pos, second_pos) = match (first_pos, second_pos) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(()),
    };

    tx.execute(
        "UPDATE workout_exercises SET position = ?, updated_at = ?, dirty = 1
         WHERE workout_id = ? AND exercise_id = ?",
        params![second_pos, now, workout_id, first],
    )?;
    tx.execute(
        "UPDATE workout_exercises SET position = ?, updated_at = ?, dirty = 1
         WHERE workout_id = ? AND exercise_id = ?",
        params![first_pos, now, workout_id, second],
    )?;
    Ok(())
}

fn live_link_position(conn: &Connection, workout_id: &str, exercise_id: &str) -> Result<Option<i64>> {
    maybe_row(conn.query_row(
        "SELECT position FROM workout_exercises
         WHERE workout_id = ? AND exercise_id = ? AND deleted_at IS NULL",
        params![workout_id, exercise_id],
        |row| row.get(0),
    ))
}

/// Live exercises of a workout with their link positions
pub fn list_workout_exercises(conn: &Connection, workout_id: &str) -> Result<Vec<LinkedExercise>> {
    // Position DESC is what the workout screen expects: the most recently
    // added exercise sits on top until the user reorders. Do not "fix"
    // this to ASC.
    let mut stmt = conn.prepare(
        "SELECT we.position, e.id, e.name, e.type, e.quantity_unit, e.count_unit,
                e.updated_at, e.deleted_at, e.dirty
         FROM workout_exercises we
         JOIN exercises e ON e.id = we.exercise_id
         WHERE we.workout_id = ? AND we.deleted_at IS NULL AND e.deleted_at IS NULL
         ORDER BY we.position DESC",
    )?;

    let rows = stmt.query_map(params![workout_id], |row| {
        let updated_at: i64 = row.get(6)?;
        let deleted_at: Option<i64> = row.get(7)?;
        let dirty: i64 = row.get(8)?;
        Ok(LinkedExercise {
            position: row.get(0)?,
            exercise: Exercise {
                id: row.get(1)?,
                name: row.get(2)?,
                kind: row.get(3)?,
                quantity_unit: row.get(4)?,
                count_unit: row.get(5)?,
                updated_at: datetime_from_millis(updated_at),
                deleted_at: deleted_at.map(datetime_from_millis),
                dirty: dirty != 0,
            },
        })
    })?;
    rows.collect()
}

fn workout_is_live(conn: &Connection, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM workouts WHERE id = ? AND deleted_at IS NULL")?;
    stmt.exists(params![id])
}

fn exercise_is_live(conn: &Connection, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM exercises WHERE id = ? AND deleted_at IS NULL")?;
    stmt.exists(params![id])
}

// ==================== Row mapping ====================

fn workout_from_row(row: &Row<'_>) -> Result<Workout> {
    let updated_at: i64 = row.get(3)?;
    let deleted_at: Option<i64> = row.get(4)?;
    let dirty: i64 = row.get(5)?;
    Ok(Workout {
        id: row.get(0)?,
        name: row.get(1)?,
        position: row.get(2)?,
        updated_at: datetime_from_millis(updated_at),
        deleted_at: deleted_at.map(datetime_from_millis),
        dirty: dirty != 0,
    })
}

fn exercise_from_row(row: &Row<'_>) -> Result<Exercise> {
    let updated_at: i64 = row.get(5)?;
    let deleted_at: Option<i64> = row.get(6)?;
    let dirty: i64 = row.get(7)?;
    Ok(Exercise {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        quantity_unit: row.get(3)?,
        count_unit: row.get(4)?,
        updated_at: datetime_from_millis(updated_at),
        deleted_at: deleted_at.map(datetime_from_millis),
        dirty: dirty != 0,
    })
}

fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

/// Map "no rows" to `None`, keep every other error
fn maybe_row<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
