//! SQLite-backed Node Store
//!
//! libsql implementation of [`NodeStore`] for a single local database
//! file.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any file path; the parent directory is
//!   created on demand
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Per-operation connections**: every operation opens its own
//!   connection with a 5-second busy timeout, so concurrent operations
//!   wait instead of failing with `SQLITE_BUSY`
//! - **Explicit timestamps**: rows are written with fixed-precision
//!   RFC 3339 UTC strings; `CURRENT_TIMESTAMP` only has one-second
//!   granularity, too coarse for the `created_at` sibling tiebreak
//!
//! The schema carries exactly one constraint beyond the primary key: the
//! unique `(kind, slug)` index. Hierarchy rules are enforced a layer up,
//! in the service.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{Builder, Database, Row};
use tracing::{debug, info};

use super::error::DatabaseError;
use super::node_store::NodeStore;
use crate::models::{Node, NodeKind, NodePatch};

/// Column list shared by every SELECT so row decoding stays positional.
const NODE_COLUMNS: &str =
    "id, kind, name, slug, parent_id, sort_order, description, properties, version, created_at, updated_at";

/// Sibling presentation order; the ordering contract documented on
/// [`NodeStore`].
const SIBLING_ORDER: &str = "ORDER BY sort_order ASC, created_at DESC, id ASC";

/// Node store backed by a local libsql database
///
/// # Examples
///
/// ```no_run
/// use trellis_core::db::SqliteStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::new("./data/trellis.db").await?;
///     # let _ = store;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// libsql database handle (wrapped in Arc for sharing)
    db: Arc<Database>,

    /// Path to the database file
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and initialize the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - the parent directory cannot be created
    /// - the database connection fails
    /// - schema initialization fails
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db_path = db_path.as_ref().to_path_buf();

        // Whether the file exists decides if a WAL checkpoint is needed
        // after schema creation.
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let store = Self {
            db: Arc::new(db),
            db_path,
        };

        store.initialize_schema(is_new_database).await?;

        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get a connection handle.
    ///
    /// Prefer [`Self::connect_with_timeout`] in async contexts; the busy
    /// timeout makes concurrent operations serialize instead of failing.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with a 5-second busy timeout configured.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so query() must be used instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the `nodes` table and its indexes.
    ///
    /// Idempotent (CREATE ... IF NOT EXISTS), safe to run on every open.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Wait up to 5s on locks instead of failing immediately
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL,
                parent_id TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                properties JSON NOT NULL DEFAULT '{}',
                version INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create nodes table: {}", e))
        })?;

        // The one storage-level arbiter: slugs are unique within a kind
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_kind_slug ON nodes(kind, slug)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_nodes_kind_slug': {}",
                e
            ))
        })?;

        // Index on (kind, parent_id) for children listings
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_kind_parent ON nodes(kind, parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_nodes_kind_parent': {}",
                e
            ))
        })?;

        // Index on parent_id alone for child counting
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_nodes_parent': {}",
                e
            ))
        })?;

        // Flush the WAL for newly created databases so rapid open/close
        // cycles in tests never observe a missing table.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        info!(path = %self.db_path.display(), "node store initialized");

        Ok(())
    }

    /// Render a timestamp the way rows store it.
    ///
    /// Fixed-precision RFC 3339 keeps lexicographic string order equal to
    /// chronological order, which `ORDER BY created_at` relies on.
    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a timestamp column - handles both SQLite and RFC 3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP produces "YYYY-MM-DD HH:MM:SS"; rows
    /// written by this store use RFC 3339.
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(DatabaseError::row_decode(format!(
            "unable to parse timestamp '{}' as SQLite or RFC 3339 format",
            s
        )))
    }

    /// Convert a libsql Row (in [`NODE_COLUMNS`] order) into a Node.
    fn row_to_node(row: &Row) -> Result<Node, DatabaseError> {
        let id: String = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(format!("id: {}", e)))?;
        let kind_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::row_decode(format!("kind: {}", e)))?;
        let name: String = row
            .get(2)
            .map_err(|e| DatabaseError::row_decode(format!("name: {}", e)))?;
        let slug: String = row
            .get(3)
            .map_err(|e| DatabaseError::row_decode(format!("slug: {}", e)))?;
        let parent_id: Option<String> = row
            .get(4)
            .map_err(|e| DatabaseError::row_decode(format!("parent_id: {}", e)))?;
        let sort_order: i64 = row
            .get(5)
            .map_err(|e| DatabaseError::row_decode(format!("sort_order: {}", e)))?;
        let description: Option<String> = row
            .get(6)
            .map_err(|e| DatabaseError::row_decode(format!("description: {}", e)))?;
        let properties_json: String = row
            .get(7)
            .map_err(|e| DatabaseError::row_decode(format!("properties: {}", e)))?;
        let version: i64 = row
            .get(8)
            .map_err(|e| DatabaseError::row_decode(format!("version: {}", e)))?;
        let created_at_str: String = row
            .get(9)
            .map_err(|e| DatabaseError::row_decode(format!("created_at: {}", e)))?;
        let updated_at_str: String = row
            .get(10)
            .map_err(|e| DatabaseError::row_decode(format!("updated_at: {}", e)))?;

        let kind = NodeKind::from_str(&kind_str)
            .map_err(|e| DatabaseError::row_decode(e.to_string()))?;

        let created_at = Self::parse_timestamp(&created_at_str)?;
        let updated_at = Self::parse_timestamp(&updated_at_str)?;

        let properties: serde_json::Value = serde_json::from_str(&properties_json)
            .map_err(|e| DatabaseError::row_decode(format!("properties JSON: {}", e)))?;

        Ok(Node {
            id,
            kind,
            name,
            slug,
            parent_id,
            sort_order,
            description,
            properties,
            version,
            created_at,
            updated_at,
        })
    }

    /// Run a SELECT returning many nodes and collect them.
    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>, DatabaseError> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl NodeStore for SqliteStore {
    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM nodes WHERE id = ?", NODE_COLUMNS))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_node query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_node query: {}", e))
        })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_node_by_slug(
        &self,
        kind: NodeKind,
        slug: &str,
    ) -> Result<Option<Node>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes WHERE kind = ? AND slug = ?",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare slug query: {}", e))
            })?;

        let mut rows = stmt.query((kind.as_str(), slug)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute slug query: {}", e))
        })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_nodes(&self, kind: NodeKind) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes WHERE kind = ? {}",
                NODE_COLUMNS, SIBLING_ORDER
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare list query: {}", e))
            })?;

        let rows = stmt.query([kind.as_str()]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute list query: {}", e))
        })?;

        Self::collect_nodes(rows).await
    }

    async fn list_children(
        &self,
        kind: NodeKind,
        parent_id: Option<&str>,
    ) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows = match parent_id {
            Some(parent) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM nodes WHERE kind = ? AND parent_id = ? {}",
                        NODE_COLUMNS, SIBLING_ORDER
                    ))
                    .await
                    .map_err(|e| {
                        DatabaseError::sql_execution(format!(
                            "Failed to prepare children query: {}",
                            e
                        ))
                    })?;

                stmt.query((kind.as_str(), parent)).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to execute children query: {}", e))
                })?
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM nodes WHERE kind = ? AND parent_id IS NULL {}",
                        NODE_COLUMNS, SIBLING_ORDER
                    ))
                    .await
                    .map_err(|e| {
                        DatabaseError::sql_execution(format!("Failed to prepare roots query: {}", e))
                    })?;

                stmt.query([kind.as_str()]).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to execute roots query: {}", e))
                })?
            }
        };

        Self::collect_nodes(rows).await
    }

    async fn count_children(&self, id: &str) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM nodes WHERE parent_id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare count query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute count query: {}", e))
        })?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .ok_or_else(|| {
                DatabaseError::sql_execution("COUNT query returned no rows".to_string())
            })?;

        row.get(0)
            .map_err(|e| DatabaseError::row_decode(format!("child count: {}", e)))
    }

    async fn insert_node(&self, node: Node) -> Result<Node, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let properties_json = serde_json::to_string(&node.properties).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to serialize properties: {}", e))
        })?;

        conn.execute(
            "INSERT INTO nodes (id, kind, name, slug, parent_id, sort_order, description, properties, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                node.id.as_str(),
                node.kind.as_str(),
                node.name.as_str(),
                node.slug.as_str(),
                node.parent_id.as_deref(),
                node.sort_order,
                node.description.as_deref(),
                properties_json.as_str(),
                node.version,
                Self::format_timestamp(&node.created_at),
                Self::format_timestamp(&node.updated_at),
            ),
        )
        .await
        .map_err(|e| DatabaseError::statement("Failed to insert node", e))?;

        debug!(node_id = %node.id, kind = %node.kind, slug = %node.slug, "inserted node");

        Ok(node)
    }

    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node, DatabaseError> {
        let current = self
            .get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::row_not_found(id))?;

        let mut updated = current;
        patch.apply_to(&mut updated);
        updated.version += 1;

        let properties_json = serde_json::to_string(&updated.properties).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to serialize properties: {}", e))
        })?;

        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute(
                "UPDATE nodes SET name = ?, slug = ?, parent_id = ?, sort_order = ?, description = ?, properties = ?, version = ?, updated_at = ? WHERE id = ?",
                (
                    updated.name.as_str(),
                    updated.slug.as_str(),
                    updated.parent_id.as_deref(),
                    updated.sort_order,
                    updated.description.as_deref(),
                    properties_json.as_str(),
                    updated.version,
                    Self::format_timestamp(&updated.updated_at),
                    id,
                ),
            )
            .await
            .map_err(|e| DatabaseError::statement("Failed to update node", e))?;

        // Row vanished between the read and the write
        if rows_affected == 0 {
            return Err(DatabaseError::row_not_found(id));
        }

        debug!(node_id = %id, version = updated.version, "updated node");

        Ok(updated)
    }

    async fn delete_node(&self, id: &str) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute("DELETE FROM nodes WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;

        if rows_affected == 0 {
            return Err(DatabaseError::row_not_found(id));
        }

        debug!(node_id = %id, "deleted node");

        Ok(())
    }

    async fn delete_nodes(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let mut removed = 0u64;
        for id in ids {
            match conn
                .execute("DELETE FROM nodes WHERE id = ?", [id.as_str()])
                .await
            {
                Ok(rows_affected) => removed += rows_affected,
                Err(e) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to delete node {}: {}",
                        id, e
                    )));
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        debug!(removed, "batch deleted nodes");

        Ok(removed)
    }
}
