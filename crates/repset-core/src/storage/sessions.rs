//! Per-day session and set records
//!
//! A session is one (exercise, day) pair: free-form notes plus an
//! ordered list of sets. Saving replaces the whole day: the previous set
//! list is tombstoned and the incoming list written with fresh order
//! indexes. Replaying the same payload therefore lands in the same
//! state, and a set that keeps its id across edits keeps its row.
//!
//! Days are keyed by "YYYY-MM-DD" strings, which sort in date order; the
//! range delete leans on that for its BETWEEN bounds.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, params_from_iter, Connection, Result, Transaction};

use crate::models::{DaySession, SessionInput, SetEntry};

/// Replace the logged day for an exercise
///
/// An input with no sets and blank notes deletes the day instead:
/// the live sets and the session row are tombstoned. Otherwise the
/// session row is upserted (reviving a tombstoned one), the old set
/// list is tombstoned, and the new sets are written in order. A set id
/// that already exists is revived and moved rather than duplicated.
///
/// The exercise row must exist, tombstoned or not; unknown ids fail the
/// foreign key.
pub fn save_session(
    tx: &Transaction,
    exercise_id: &str,
    day_key: &str,
    input: &SessionInput,
    now: i64,
) -> Result<()> {
    if input.sets.is_empty() && input.notes.trim().is_empty() {
        tx.execute(
            "UPDATE sets SET deleted_at = ?1, updated_at = ?1, dirty = 1
             WHERE exercise_id = ?2 AND day_key = ?3 AND deleted_at IS NULL",
            params![now, exercise_id, day_key],
        )?;
        tx.execute(
            "UPDATE sessions SET deleted_at = ?1, updated_at = ?1, dirty = 1
             WHERE exercise_id = ?2 AND day_key = ?3 AND deleted_at IS NULL",
            params![now, exercise_id, day_key],
        )?;
        return Ok(());
    }

    // Notes are stored as typed; only the emptiness check trims
    tx.execute(
        "INSERT INTO sessions (exercise_id, day_key, notes, updated_at, deleted_at, dirty)
         VALUES (?, ?, ?, ?, NULL, 1)
         ON CONFLICT(exercise_id, day_key) DO UPDATE SET
             notes = excluded.notes,
             updated_at = excluded.updated_at,
             deleted_at = NULL,
             dirty = 1",
        params![exercise_id, day_key, input.notes, now],
    )?;

    tx.execute(
        "UPDATE sets SET deleted_at = ?1, updated_at = ?1, dirty = 1
         WHERE exercise_id = ?2 AND day_key = ?3 AND deleted_at IS NULL",
        params![now, exercise_id, day_key],
    )?;

    for (index, set) in input.sets.iter().enumerate() {
        tx.execute(
            "INSERT INTO sets (id, exercise_id, day_key, quantity, quantity_unit_used,
                               count, count_unit_used, order_index, updated_at, deleted_at, dirty)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 1)
             ON CONFLICT(id) DO UPDATE SET
                 exercise_id = excluded.exercise_id,
                 day_key = excluded.day_key,
                 quantity = excluded.quantity,
                 quantity_unit_used = excluded.quantity_unit_used,
                 count = excluded.count,
                 count_unit_used = excluded.count_unit_used,
                 order_index = excluded.order_index,
                 updated_at = excluded.updated_at,
                 deleted_at = NULL,
                 dirty = 1",
            params![
                set.id,
                exercise_id,
                day_key,
                set.quantity,
                set.quantity_unit_used,
                set.count,
                set.count_unit_used,
                index as i64,
                now
            ],
        )?;
    }

    Ok(())
}

/// Every live day for an exercise, keyed by day
///
/// A day appears when it has a live session row, live sets, or both.
/// A day whose session row was tombstoned but whose sets survive shows
/// up with empty notes.
pub fn sessions_for_exercise(
    conn: &Connection,
    exercise_id: &str,
) -> Result<BTreeMap<String, DaySession>> {
    let mut days: BTreeMap<String, DaySession> = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT day_key, notes FROM sessions
         WHERE exercise_id = ? AND deleted_at IS NULL",
    )?;
    let rows = stmt.query_map(params![exercise_id], |row| {
        let day: String = row.get(0)?;
        let notes: Option<String> = row.get(1)?;
        Ok((day, notes))
    })?;
    for row in rows {
        let (day, notes) = row?;
        days.entry(day).or_default().notes = notes.unwrap_or_default();
    }

    let mut stmt = conn.prepare(
        "SELECT day_key, id, quantity, quantity_unit_used, count, count_unit_used
         FROM sets
         WHERE exercise_id = ? AND deleted_at IS NULL
         ORDER BY day_key ASC, order_index ASC",
    )?;
    let rows = stmt.query_map(params![exercise_id], |row| {
        let day: String = row.get(0)?;
        let set = SetEntry {
            id: row.get(1)?,
            quantity: row.get(2)?,
            quantity_unit_used: row.get(3)?,
            count: row.get(4)?,
            count_unit_used: row.get(5)?,
        };
        Ok((day, set))
    })?;
    for row in rows {
        let (day, set) = row?;
        days.entry(day).or_default().sets.push(set);
    }

    Ok(days)
}

/// Tombstone an exercise and everything hanging off it
///
/// Sets, sessions and workout links go first, the exercise row last, all
/// stamped with the same timestamp so the purge sweep removes them
/// together.
pub fn delete_exercise_everywhere(tx: &Transaction, exercise_id: &str, now: i64) -> Result<()> {
    tx.execute(
        "UPDATE sets SET deleted_at = ?1, updated_at = ?1, dirty = 1 WHERE exercise_id = ?2",
        params![now, exercise_id],
    )?;
    tx.execute(
        "UPDATE sessions SET deleted_at = ?1, updated_at = ?1, dirty = 1 WHERE exercise_id = ?2",
        params![now, exercise_id],
    )?;
    tx.execute(
        "UPDATE workout_exercises SET deleted_at = ?1, updated_at = ?1, dirty = 1
         WHERE exercise_id = ?2",
        params![now, exercise_id],
    )?;
    tx.execute(
        "UPDATE exercises SET deleted_at = ?1, updated_at = ?1, dirty = 1 WHERE id = ?2",
        params![now, exercise_id],
    )?;
    Ok(())
}

/// Tombstone an exercise's history between two day keys, inclusive
///
/// Sets in the range go first; then any session in the range without
/// surviving live sets, notes or not.
pub fn delete_history_in_range(
    tx: &Transaction,
    exercise_id: &str,
    from_day: &str,
    to_day: &str,
    now: i64,
) -> Result<()> {
    tx.execute(
        "UPDATE sets SET deleted_at = ?1, updated_at = ?1, dirty = 1
         WHERE exercise_id = ?2 AND day_key BETWEEN ?3 AND ?4 AND deleted_at IS NULL",
        params![now, exercise_id, from_day, to_day],
    )?;
    tx.execute(
        "UPDATE sessions SET deleted_at = ?1, updated_at = ?1, dirty = 1
         WHERE exercise_id = ?2 AND day_key BETWEEN ?3 AND ?4 AND deleted_at IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM sets
               WHERE sets.exercise_id = sessions.exercise_id
                 AND sets.day_key = sessions.day_key
                 AND sets.deleted_at IS NULL
           )",
        params![now, exercise_id, from_day, to_day],
    )?;
    Ok(())
}

/// Notes of the live session for (exercise, day); `None` when there is
/// no live session row
pub(crate) fn live_session_notes(
    conn: &Connection,
    exercise_id: &str,
    day_key: &str,
) -> Result<Option<String>> {
    let result: Result<Option<String>> = conn.query_row(
        "SELECT notes FROM sessions
         WHERE exercise_id = ? AND day_key = ? AND deleted_at IS NULL",
        params![exercise_id, day_key],
        |row| row.get(0),
    );

    match result {
        Ok(notes) => Ok(Some(notes.unwrap_or_default())),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether (exercise, day) has any live sets
pub(crate) fn has_live_sets(conn: &Connection, exercise_id: &str, day_key: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM sets WHERE exercise_id = ? AND day_key = ? AND deleted_at IS NULL",
    )?;
    stmt.exists(params![exercise_id, day_key])
}

/// Which of `ids` already exist as set rows, tombstoned or not
pub(crate) fn existing_set_ids(conn: &Connection, ids: &[String]) -> Result<HashSet<String>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id FROM sets WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids), |row| row.get::<_, String>(0))?;
    rows.collect()
}
