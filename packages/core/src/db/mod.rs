//! Database Layer
//!
//! Storage for Trellis nodes, built on libsql (embedded SQLite):
//!
//! - `NodeStore` - the persistence trait the service layer depends on
//! - `SqliteStore` - the local-file implementation
//! - `DatabaseError` - typed storage errors
//!
//! # Architecture
//!
//! The store is deliberately thin: one table, one unique index, no
//! hierarchy knowledge. Cycle prevention, child guards and parent
//! existence checks live in the service layer, where they run against an
//! in-memory snapshot instead of per-row queries.

mod error;
mod node_store;
mod sqlite_store;

pub use error::DatabaseError;
pub use node_store::NodeStore;
pub use sqlite_store::SqliteStore;
