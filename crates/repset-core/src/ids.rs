//! Identifier generation
//!
//! Every row in the store (workouts, exercises, sets) carries an opaque
//! string id assigned at creation. UUID v4 keeps ids unique without
//! coordination, which matters for import: ids minted on another device
//! must never collide with local ones.

use uuid::Uuid;

/// Generate a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
