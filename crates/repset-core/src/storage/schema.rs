//! SQLite schema and migrations
//!
//! Every data table carries the same bookkeeping columns: `updated_at`
//! (ms since epoch), `deleted_at` (tombstone timestamp, `NULL` while
//! live) and `dirty` (local changes since the last export). Reads filter
//! on `deleted_at IS NULL`; hard deletion is left to the purge sweep.
//!
//! The recorded schema version lives in the `meta` table and only moves
//! forward: opening a database from an older build runs the missing
//! migrations, opening one from a newer build changes nothing.

use rusqlite::{Connection, Result, Transaction};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize or upgrade the database schema
///
/// Safe to call on every open; does nothing once the recorded version
/// matches [`SCHEMA_VERSION`]. Each migration commits together with the
/// version bump, so a failure leaves the previous version intact.
pub fn initialize(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;

    let mut version = schema_version(conn)?.unwrap_or(0);
    while version < SCHEMA_VERSION {
        let next = version + 1;
        let tx = conn.transaction()?;
        apply_migration(&tx, next)?;
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            [next.to_string()],
        )?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Get the recorded schema version, or `None` for a fresh database
pub fn schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = 'schema_version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if the schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

fn apply_migration(tx: &Transaction, version: i32) -> Result<()> {
    match version {
        1 => migrate_to_v1(tx),
        other => unreachable!("no migration defined for schema version {other}"),
    }
}

/// v1: the initial schema
fn migrate_to_v1(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        r#"
        -- Workouts: named, manually ordered
        CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            position INTEGER,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            dirty INTEGER NOT NULL DEFAULT 1
        );

        -- Exercise catalog, shared across workouts
        CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            quantity_unit TEXT DEFAULT '',
            count_unit TEXT DEFAULT '',
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            dirty INTEGER NOT NULL DEFAULT 1
        );

        -- Workout membership with per-workout ordering
        CREATE TABLE IF NOT EXISTS workout_exercises (
            workout_id TEXT NOT NULL,
            exercise_id TEXT NOT NULL,
            position INTEGER,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            dirty INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (workout_id, exercise_id),
            FOREIGN KEY (workout_id) REFERENCES workouts(id) ON DELETE CASCADE,
            FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE
        );

        -- One row per (exercise, day): notes plus session bookkeeping
        CREATE TABLE IF NOT EXISTS sessions (
            exercise_id TEXT NOT NULL,
            day_key TEXT NOT NULL,
            notes TEXT DEFAULT '',
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            dirty INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (exercise_id, day_key),
            FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE
        );

        -- Individual sets; every set belongs to a session row
        CREATE TABLE IF NOT EXISTS sets (
            id TEXT PRIMARY KEY,
            exercise_id TEXT NOT NULL,
            day_key TEXT NOT NULL,
            quantity REAL,
            quantity_unit_used TEXT,
            count REAL,
            count_unit_used TEXT,
            order_index INTEGER,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            dirty INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE,
            FOREIGN KEY (exercise_id, day_key)
                REFERENCES sessions(exercise_id, day_key) ON DELETE CASCADE
        );

        -- Indexes for the common lookups

        -- Exercises of a workout, in manual order
        CREATE INDEX IF NOT EXISTS idx_workout_exercises_workout
            ON workout_exercises(workout_id, position);

        -- Sets of one (exercise, day), in display order
        CREATE INDEX IF NOT EXISTS idx_sets_exercise_day
            ON sets(exercise_id, day_key, order_index);

        -- Session history of an exercise
        CREATE INDEX IF NOT EXISTS idx_sessions_exercise
            ON sessions(exercise_id);
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_initialize_creates_tables() {
        let conn = open();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"meta".to_string()));
        assert!(tables.contains(&"workouts".to_string()));
        assert!(tables.contains(&"exercises".to_string()));
        assert!(tables.contains(&"workout_exercises".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
        assert!(tables.contains(&"sets".to_string()));
    }

    #[test]
    fn test_schema_version_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).ok(), None);

        initialize(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_needs_init() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Before init, needs init
        assert!(needs_init(&conn));

        initialize(&mut conn).unwrap();

        // After init, the recorded version is current
        assert!(!needs_init(&conn));

        // An older recorded version needs migration again
        conn.execute(
            "UPDATE meta SET value = '0' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
        assert!(needs_init(&conn));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut conn = open();

        conn.execute(
            "INSERT INTO workouts (id, name, position, updated_at) VALUES ('w1', 'Push', 1, 0)",
            [],
        )
        .unwrap();

        // A second run must neither fail nor touch existing data
        initialize(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM workouts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_indexes_exist() {
        let conn = open();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_workout_exercises_workout".to_string()));
        assert!(indexes.contains(&"idx_sets_exercise_day".to_string()));
        assert!(indexes.contains(&"idx_sessions_exercise".to_string()));
    }

    #[test]
    fn test_set_requires_session_row() {
        let conn = open();

        conn.execute(
            "INSERT INTO exercises (id, name, type, updated_at) VALUES ('e1', 'Bench', 'weight_reps', 0)",
            [],
        )
        .unwrap();

        // No session row for (e1, day) yet, so the composite FK fails
        let result = conn.execute(
            "INSERT INTO sets (id, exercise_id, day_key, order_index, updated_at)
             VALUES ('s1', 'e1', '2025-01-01', 0, 0)",
            [],
        );
        assert!(result.is_err());

        conn.execute(
            "INSERT INTO sessions (exercise_id, day_key, notes, updated_at) VALUES ('e1', '2025-01-01', '', 0)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO sets (id, exercise_id, day_key, order_index, updated_at)
             VALUES ('s1', 'e1', '2025-01-01', 0, 0)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_set_requires_exercise_row() {
        let conn = open();

        let result = conn.execute(
            "INSERT INTO sessions (exercise_id, day_key, notes, updated_at) VALUES ('ghost', '2025-01-01', '', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
