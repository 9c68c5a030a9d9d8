//! NodeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts node
//! persistence. The service layer talks only to this trait, so a
//! different backend can be swapped in without touching hierarchy logic.
//!
//! # Design Decisions
//!
//! 1. **Async-first**: the embedded libsql backend is async, and the
//!    seam stays async so a networked backend fits behind the same trait
//! 2. **Nullable reads**: `get_*` methods return `Ok(None)` for missing
//!    rows; absence is data, not an error
//! 3. **Typed errors**: methods return `DatabaseError` so the service
//!    can react to unique-constraint rejections and missing rows without
//!    string matching
//! 4. **Invariant-agnostic**: the store never enforces hierarchy rules
//!    (cycles, child guards, parent existence); the single storage-level
//!    arbiter is the `(kind, slug)` unique index
//!
//! # Examples
//!
//! ```rust,no_run
//! use trellis_core::db::{NodeStore, SqliteStore};
//! use trellis_core::models::{Node, NodeKind};
//! use std::sync::Arc;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn NodeStore> =
//!         Arc::new(SqliteStore::new("data/trellis.db").await?);
//!
//!     let node = Node::new(
//!         NodeKind::Category,
//!         "Technology".to_string(),
//!         "technology".to_string(),
//!         None,
//!         json!({}),
//!     );
//!     let created = store.insert_node(node).await?;
//!     println!("created {}", created.id);
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use super::error::DatabaseError;
use crate::models::{Node, NodeKind, NodePatch};

/// Abstraction layer for node persistence operations
///
/// Implementations must be `Send + Sync` so the service can hold the
/// store as `Arc<dyn NodeStore>` across await points.
///
/// Every read that lists nodes returns them in sibling presentation
/// order: `sort_order` ascending, then `created_at` descending, then id
/// as a deterministic tiebreak.
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // READS
    //

    /// Fetch a node by id.
    ///
    /// Returns `Ok(None)` when the id is unknown.
    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError>;

    /// Fetch a node by slug within a kind namespace.
    ///
    /// Returns `Ok(None)` when no node of that kind carries the slug.
    async fn get_node_by_slug(
        &self,
        kind: NodeKind,
        slug: &str,
    ) -> Result<Option<Node>, DatabaseError>;

    /// List every node of a kind.
    async fn list_nodes(&self, kind: NodeKind) -> Result<Vec<Node>, DatabaseError>;

    /// List the direct children of a parent, or the roots of the kind
    /// when `parent_id` is `None`.
    async fn list_children(
        &self,
        kind: NodeKind,
        parent_id: Option<&str>,
    ) -> Result<Vec<Node>, DatabaseError>;

    /// Count the direct children of a node.
    async fn count_children(&self, id: &str) -> Result<i64, DatabaseError>;

    //
    // WRITES
    //

    /// Insert a fully-constructed node.
    ///
    /// # Errors
    ///
    /// `UniqueViolation` when the `(kind, slug)` pair is already taken.
    async fn insert_node(&self, node: Node) -> Result<Node, DatabaseError>;

    /// Apply a partial update and return the stored result.
    ///
    /// Bumps `version` and refreshes `updated_at` on every call.
    ///
    /// # Errors
    ///
    /// `RowNotFound` when the id does not exist; `UniqueViolation` when a
    /// slug change collides within the kind.
    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node, DatabaseError>;

    /// Delete a node by id.
    ///
    /// # Errors
    ///
    /// `RowNotFound` when the id does not exist.
    async fn delete_node(&self, id: &str) -> Result<(), DatabaseError>;

    /// Delete several nodes in one transaction.
    ///
    /// Returns the number of rows removed. Ids that do not exist are
    /// skipped silently; callers wanting all-or-nothing semantics
    /// validate first.
    async fn delete_nodes(&self, ids: &[String]) -> Result<u64, DatabaseError>;
}
