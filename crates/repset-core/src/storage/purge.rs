//! Tombstone expiry and full reset
//!
//! Soft-deleted rows stick around so a recently removed record can be
//! revived by an import. After a retention window they are swept out
//! for real. The sweep runs once per store open.

use chrono::Duration;
use rusqlite::{params, Connection, Result};

/// How long tombstoned rows are kept before the sweep removes them
pub const TOMBSTONE_RETENTION_DAYS: i64 = 30;

/// Hard-delete tombstones older than the retention window
///
/// Returns the number of rows removed. Rows deleted_at exactly on the
/// cutoff are kept for one more sweep.
pub fn purge_deleted(conn: &mut Connection, retention: Duration, now: i64) -> Result<usize> {
    let cutoff = now - retention.num_milliseconds();
    let mut removed = 0;

    let tx = conn.transaction()?;
    // Children before parents so ON DELETE CASCADE never fires mid-sweep
    for table in [
        "sets",
        "sessions",
        "workout_exercises",
        "exercises",
        "workouts",
    ] {
        let sql = format!("DELETE FROM {table} WHERE deleted_at IS NOT NULL AND deleted_at < ?");
        removed += tx.execute(&sql, params![cutoff])?;
    }
    tx.commit()?;

    Ok(removed)
}

/// Wipe every record, live and tombstoned, keeping the schema
pub fn reset_all(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    for table in ["workout_exercises", "workouts", "sets", "sessions", "exercises"] {
        let sql = format!("DELETE FROM {table}");
        tx.execute(&sql, [])?;
    }
    tx.commit()?;
    Ok(())
}
