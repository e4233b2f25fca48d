//! JSON export and import
//!
//! The export document is a plain snapshot of all live rows, with
//! human-friendly name fields stitched in so the file is readable on its
//! own. Import goes the other way but is additive: local data is never
//! overwritten.
//!
//! ## Merge rules
//!
//! Imported exercises are matched by id first, then by normalized name,
//! so the same exercise logged on two devices lands in one local row.
//! Then, per imported (exercise, day):
//! - unknown locally: created from the import;
//! - known locally with live sets: skipped, local data wins;
//! - known locally without live sets: filled from the import, with
//!   non-empty local notes winning over imported ones.
//!
//! Sets ride along with their session; a set whose (exercise, day) has
//! no session entry in the file is dropped. Workouts and their exercise
//! lists are exported for readability but never imported.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::ids::new_id;
use crate::models::{normalize_name, ExerciseType, ExerciseUnits, SessionInput, SetEntry};
use crate::storage::schema::SCHEMA_VERSION;
use crate::storage::{entities, sessions};
use crate::store::Store;

/// Why an import payload was rejected before touching the database
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Import payload must be a JSON object")]
    NotAnObject,
}

/// What an import did, per record kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Imported exercises matched or created
    pub exercises: usize,
    /// Days that did not exist locally
    pub sessions_created: usize,
    /// Locally empty days filled from the import
    pub sessions_merged: usize,
    /// Days skipped because local sets exist
    pub sessions_skipped: usize,
}

// ==================== Export ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub schema_version: i32,
    /// RFC 3339 timestamp of the snapshot
    pub exported_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRow {
    #[serde(alias = "id")]
    pub workout_id: String,
    pub name: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRow {
    #[serde(alias = "id")]
    pub exercise_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity_unit: String,
    pub count_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRow {
    pub workout_name: Option<String>,
    pub exercise_name: Option<String>,
    pub workout_id: String,
    pub exercise_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub exercise_name: Option<String>,
    pub exercise_id: String,
    #[serde(alias = "utcKey")]
    pub day_key: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRow {
    pub exercise_name: Option<String>,
    #[serde(alias = "id")]
    pub set_id: String,
    pub exercise_id: String,
    #[serde(alias = "utcKey")]
    pub day_key: String,
    pub quantity: Option<f64>,
    pub quantity_unit_used: Option<String>,
    pub count: Option<f64>,
    pub count_unit_used: Option<String>,
    pub order_index: i64,
}

/// Snapshot of all live data, ready to serialize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub meta: ExportMeta,
    pub workouts: Vec<WorkoutRow>,
    pub exercises: Vec<ExerciseRow>,
    pub workout_exercises: Vec<LinkRow>,
    pub sessions: Vec<SessionRow>,
    pub sets: Vec<SetRow>,
}

pub(crate) fn export_all(conn: &Connection) -> rusqlite::Result<ExportDocument> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type, quantity_unit, count_unit
         FROM exercises WHERE deleted_at IS NULL
         ORDER BY name COLLATE NOCASE ASC",
    )?;
    let exercises: Vec<ExerciseRow> = stmt
        .query_map([], |row| {
            Ok(ExerciseRow {
                exercise_id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
                quantity_unit: row.get(3)?,
                count_unit: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, name, position FROM workouts WHERE deleted_at IS NULL
         ORDER BY position ASC, id ASC",
    )?;
    let workouts: Vec<WorkoutRow> = stmt
        .query_map([], |row| {
            Ok(WorkoutRow {
                workout_id: row.get(0)?,
                name: row.get(1)?,
                position: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
        "SELECT workout_id, exercise_id, position
         FROM workout_exercises WHERE deleted_at IS NULL
         ORDER BY workout_id ASC, position ASC",
    )?;
    let mut links: Vec<LinkRow> = stmt
        .query_map([], |row| {
            Ok(LinkRow {
                workout_name: None,
                exercise_name: None,
                workout_id: row.get(0)?,
                exercise_id: row.get(1)?,
                position: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
        "SELECT exercise_id, day_key, notes FROM sessions WHERE deleted_at IS NULL
         ORDER BY exercise_id ASC, day_key ASC",
    )?;
    let mut session_rows: Vec<SessionRow> = stmt
        .query_map([], |row| {
            let notes: Option<String> = row.get(2)?;
            Ok(SessionRow {
                exercise_name: None,
                exercise_id: row.get(0)?,
                day_key: row.get(1)?,
                notes: notes.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, exercise_id, day_key, quantity, quantity_unit_used,
                count, count_unit_used, order_index
         FROM sets WHERE deleted_at IS NULL
         ORDER BY exercise_id ASC, day_key ASC, order_index ASC",
    )?;
    let mut set_rows: Vec<SetRow> = stmt
        .query_map([], |row| {
            Ok(SetRow {
                exercise_name: None,
                set_id: row.get(0)?,
                exercise_id: row.get(1)?,
                day_key: row.get(2)?,
                quantity: row.get(3)?,
                quantity_unit_used: row.get(4)?,
                count: row.get(5)?,
                count_unit_used: row.get(6)?,
                order_index: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    // Name enrichment is a plain post-query pass over the snapshot
    let exercise_names: HashMap<&str, &str> = exercises
        .iter()
        .map(|e| (e.exercise_id.as_str(), e.name.as_str()))
        .collect();
    let workout_names: HashMap<&str, &str> = workouts
        .iter()
        .map(|w| (w.workout_id.as_str(), w.name.as_str()))
        .collect();

    for link in &mut links {
        link.workout_name = workout_names.get(link.workout_id.as_str()).map(|s| s.to_string());
        link.exercise_name = exercise_names.get(link.exercise_id.as_str()).map(|s| s.to_string());
    }
    for session in &mut session_rows {
        session.exercise_name = exercise_names
            .get(session.exercise_id.as_str())
            .map(|s| s.to_string());
    }
    for set in &mut set_rows {
        set.exercise_name = exercise_names.get(set.exercise_id.as_str()).map(|s| s.to_string());
    }

    Ok(ExportDocument {
        meta: ExportMeta {
            schema_version: SCHEMA_VERSION,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        },
        workouts,
        exercises,
        workout_exercises: links,
        sessions: session_rows,
        sets: set_rows,
    })
}

// ==================== Import ====================

/// Parsed, cleaned import payload
///
/// Every record that survives parsing has a non-empty name (exercises)
/// or a non-empty exercise id and day key (sessions, sets). Ids here
/// are still the import file's ids, not local ones.
#[derive(Debug, Default)]
struct ImportDocument {
    exercises: Vec<ImportedExercise>,
    sessions: Vec<ImportedSession>,
    sets: Vec<ImportedSet>,
}

#[derive(Debug)]
struct ImportedExercise {
    /// Id from the file; may be empty
    id: String,
    name: String,
    kind: String,
    units: ExerciseUnits,
    name_key: String,
}

#[derive(Debug)]
struct ImportedSession {
    exercise_id: String,
    day_key: String,
    notes: String,
}

#[derive(Debug)]
struct ImportedSet {
    /// Id from the file; may be empty
    id: String,
    exercise_id: String,
    day_key: String,
    quantity: Option<f64>,
    quantity_unit_used: Option<String>,
    count: Option<f64>,
    count_unit_used: Option<String>,
}

fn array_field<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match root.get(key) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// First usable string under `keys`: a non-empty string, or a number
/// rendered as text
fn string_at(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First usable number under `keys`, accepting numeric strings
fn number_at(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(parsed) = s.trim().parse::<f64>() {
                    return Some(parsed);
                }
            }
            _ => {}
        }
    }
    None
}

fn trimmed_at(obj: &Map<String, Value>, keys: &[&str]) -> String {
    string_at(obj, keys)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Validate and clean a raw payload without touching the database
///
/// Only malformed JSON or a non-object root is an error. Missing or
/// non-array sections are empty, unknown fields are ignored, and rows
/// missing their required keys are silently dropped.
fn parse_import(raw: &str) -> Result<ImportDocument, ImportError> {
    let value: Value = serde_json::from_str(raw)?;
    let root = match value.as_object() {
        Some(obj) => obj,
        None => return Err(ImportError::NotAnObject),
    };

    let mut doc = ImportDocument::default();

    for item in array_field(root, "exercises") {
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        let name = trimmed_at(obj, &["name"]);
        if name.is_empty() {
            continue;
        }
        doc.exercises.push(ImportedExercise {
            id: trimmed_at(obj, &["exerciseId", "id"]),
            name_key: normalize_name(&name),
            name,
            kind: string_at(obj, &["type"])
                .unwrap_or_else(|| ExerciseType::default().as_str().to_string()),
            units: ExerciseUnits {
                quantity_unit: string_at(obj, &["quantityUnit"]).unwrap_or_default(),
                count_unit: string_at(obj, &["countUnit"]).unwrap_or_default(),
            },
        });
    }

    for item in array_field(root, "sessions") {
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        let exercise_id = trimmed_at(obj, &["exerciseId", "id"]);
        let day_key = trimmed_at(obj, &["dayKey", "utcKey"]);
        if exercise_id.is_empty() || day_key.is_empty() {
            continue;
        }
        doc.sessions.push(ImportedSession {
            exercise_id,
            day_key,
            notes: string_at(obj, &["notes"]).unwrap_or_default(),
        });
    }

    for item in array_field(root, "sets") {
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        let exercise_id = trimmed_at(obj, &["exerciseId"]);
        let day_key = trimmed_at(obj, &["dayKey", "utcKey"]);
        if exercise_id.is_empty() || day_key.is_empty() {
            continue;
        }
        doc.sets.push(ImportedSet {
            id: trimmed_at(obj, &["setId", "id"]),
            exercise_id,
            day_key,
            quantity: number_at(obj, &["quantity"]),
            quantity_unit_used: string_at(obj, &["quantityUnitUsed"]),
            count: number_at(obj, &["count"]),
            count_unit_used: string_at(obj, &["countUnitUsed"]),
        });
    }

    Ok(doc)
}

/// An imported set rewritten onto local ids
#[derive(Debug)]
struct ResolvedSet {
    exercise_id: String,
    day_key: String,
    entry: SetEntry,
}

fn merge_import(store: &Store, doc: ImportDocument) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    // Tombstoned exercises stay in the name map so a recently deleted
    // exercise is revived instead of duplicated
    let mut local_id_by_name: HashMap<String, String> = {
        let conn = store.connection();
        entities::all_exercise_names(&conn)?
            .into_iter()
            .map(|(id, name)| (normalize_name(&name), id))
            .collect()
    };

    let mut name_key_by_import_id: HashMap<String, String> = HashMap::new();
    for exercise in &doc.exercises {
        let id_hint = if exercise.id.is_empty() {
            None
        } else {
            Some(exercise.id.as_str())
        };
        let local_id =
            store.ensure_exercise(id_hint, &exercise.name, &exercise.kind, &exercise.units)?;
        local_id_by_name.insert(exercise.name_key.clone(), local_id);
        if !exercise.id.is_empty() {
            name_key_by_import_id.insert(exercise.id.clone(), exercise.name_key.clone());
        }
        summary.exercises += 1;
    }

    // Sessions and sets resolve strictly through the file's exercise
    // list; rows pointing at exercises the file does not declare are
    // orphans and get dropped
    let resolve = |import_id: &str| {
        let name_key = name_key_by_import_id.get(import_id)?;
        local_id_by_name.get(name_key)
    };

    let mut resolved_sets: Vec<ResolvedSet> = Vec::new();
    for set in &doc.sets {
        let exercise_id = match resolve(&set.exercise_id) {
            Some(id) => id.clone(),
            None => continue,
        };
        resolved_sets.push(ResolvedSet {
            exercise_id,
            day_key: set.day_key.clone(),
            entry: SetEntry {
                id: set.id.clone(),
                quantity: set.quantity,
                quantity_unit_used: set.quantity_unit_used.clone(),
                count: set.count,
                count_unit_used: set.count_unit_used.clone(),
            },
        });
    }

    // Fresh ids for blanks, for ids already present locally, and for
    // duplicates within the file itself
    let candidates: Vec<String> = resolved_sets
        .iter()
        .map(|s| s.entry.id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    let taken = {
        let conn = store.connection();
        sessions::existing_set_ids(&conn, &candidates)?
    };
    let mut seen: HashSet<String> = HashSet::new();
    for set in &mut resolved_sets {
        let id = &set.entry.id;
        if id.is_empty() || taken.contains(id) || !seen.insert(id.clone()) {
            set.entry.id = new_id();
        }
    }

    for session in &doc.sessions {
        let exercise_id = match resolve(&session.exercise_id) {
            Some(id) => id.clone(),
            None => continue,
        };

        let day_sets: Vec<SetEntry> = resolved_sets
            .iter()
            .filter(|s| s.exercise_id == exercise_id && s.day_key == session.day_key)
            .map(|s| s.entry.clone())
            .collect();

        let local_notes = {
            let conn = store.connection();
            sessions::live_session_notes(&conn, &exercise_id, &session.day_key)?
        };

        match local_notes {
            None => {
                let input = SessionInput {
                    notes: session.notes.clone(),
                    sets: day_sets,
                };
                store.save_session(&exercise_id, &session.day_key, &input)?;
                summary.sessions_created += 1;
            }
            Some(local_notes) => {
                let day_has_sets = {
                    let conn = store.connection();
                    sessions::has_live_sets(&conn, &exercise_id, &session.day_key)?
                };
                if day_has_sets {
                    summary.sessions_skipped += 1;
                } else {
                    let notes = if local_notes.is_empty() {
                        session.notes.clone()
                    } else {
                        local_notes
                    };
                    let input = SessionInput {
                        notes,
                        sets: day_sets,
                    };
                    store.save_session(&exercise_id, &session.day_key, &input)?;
                    summary.sessions_merged += 1;
                }
            }
        }
    }

    info!(
        "Import merged {} exercises; sessions: {} created, {} merged, {} skipped",
        summary.exercises,
        summary.sessions_created,
        summary.sessions_merged,
        summary.sessions_skipped
    );
    Ok(summary)
}

pub(crate) fn import_all(store: &Store, raw: &str) -> Result<ImportSummary> {
    let doc = parse_import(raw)?;
    merge_import(store, doc)
}
