//! SQLite persistence layer
//!
//! Schema management, row-level operations on the workout tables, the
//! write queue that serializes session saves, and the tombstone sweep.
//! Everything here works on plain connections and transactions; the
//! [`Store`](crate::store::Store) facade owns the connection and wraps
//! these into its public API.

pub mod entities;
pub mod purge;
pub mod queue;
pub mod schema;
pub mod sessions;

pub use queue::WriteQueue;
pub use schema::{initialize, needs_init, schema_version, SCHEMA_VERSION};
