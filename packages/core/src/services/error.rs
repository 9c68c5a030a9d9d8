//! Service Layer Error Types
//!
//! Error types for hierarchy operations, plus the coarse classification
//! a transport needs to map them onto status codes. Every variant names
//! the offending node, so messages are actionable without extra lookups.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::{NodeKind, ValidationError};

/// Coarse error classification.
///
/// Transports map these mechanically (HTTP: 404 / 409 / 400 / 500); the
/// library itself stays transport-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    NotFound,
    Conflict,
    InvalidArgument,
    Internal,
}

/// One node that blocked a batch delete, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub id: String,
    /// Name when the node exists; `None` when the id is unknown
    pub name: Option<String>,
    pub reason: String,
}

/// Service operation errors
///
/// Hierarchy rule violations carry the ids (and names where known) of
/// the nodes involved. Storage-level failures pass through as
/// `DatabaseError`.
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by id within the requested kind
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Referenced parent does not exist within the requested kind
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// Validation failed for node
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Delete refused because the node still has children
    #[error("Cannot delete '{name}' ({id}): it still has {child_count} child node(s)")]
    HasChildren {
        id: String,
        name: String,
        child_count: i64,
    },

    /// Slug collision that allocation could not resolve
    #[error("Slug '{slug}' is already in use for {kind} nodes")]
    SlugConflict { kind: NodeKind, slug: String },

    /// Slug change attempted on a kind whose slugs are immutable
    #[error("The slug of {kind} nodes cannot be changed ({id})")]
    SlugImmutable { kind: NodeKind, id: String },

    /// Node referenced itself as parent
    #[error("Node {id} cannot be its own parent")]
    SelfParent { id: String },

    /// Reparent target lies inside the node's own subtree
    #[error("Cannot move {id} under {parent_id}: the new parent is inside the node's own subtree")]
    WouldCreateCycle { id: String, parent_id: String },

    /// A request field failed validation
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Version conflict (optimistic concurrency control)
    #[error("Version conflict for node {id}: expected version {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    /// Batch delete pre-validation failed; nothing was deleted
    #[error("Batch delete aborted: {} of {total} node(s) failed validation", failures.len())]
    BatchDeleteBlocked {
        total: usize,
        failures: Vec<BatchFailure>,
    },

    /// Public projection requested for a kind without one
    #[error("{kind} nodes have no public view")]
    NoPublicView { kind: NodeKind },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a parent not found error
    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    /// Create a has-children conflict error
    pub fn has_children(id: impl Into<String>, name: impl Into<String>, child_count: i64) -> Self {
        Self::HasChildren {
            id: id.into(),
            name: name.into(),
            child_count,
        }
    }

    /// Create a slug conflict error
    pub fn slug_conflict(kind: NodeKind, slug: impl Into<String>) -> Self {
        Self::SlugConflict {
            kind,
            slug: slug.into(),
        }
    }

    /// Create a slug immutable error
    pub fn slug_immutable(kind: NodeKind, id: impl Into<String>) -> Self {
        Self::SlugImmutable { kind, id: id.into() }
    }

    /// Create a self-parent error
    pub fn self_parent(id: impl Into<String>) -> Self {
        Self::SelfParent { id: id.into() }
    }

    /// Create a cycle rejection error
    pub fn would_create_cycle(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::WouldCreateCycle {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Create a version conflict error
    pub fn version_conflict(id: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::VersionConflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Create a batch delete blocked error
    pub fn batch_delete_blocked(total: usize, failures: Vec<BatchFailure>) -> Self {
        Self::BatchDeleteBlocked { total, failures }
    }

    /// Create a no-public-view error
    pub fn no_public_view(kind: NodeKind) -> Self {
        Self::NoPublicView { kind }
    }

    /// Classify this error for transport mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NodeNotFound { .. } | Self::ParentNotFound { .. } => ErrorClass::NotFound,

            Self::HasChildren { .. }
            | Self::SlugConflict { .. }
            | Self::SlugImmutable { .. }
            | Self::VersionConflict { .. }
            | Self::BatchDeleteBlocked { .. } => ErrorClass::Conflict,

            Self::ValidationFailed(_)
            | Self::SelfParent { .. }
            | Self::WouldCreateCycle { .. }
            | Self::InvalidField { .. }
            | Self::NoPublicView { .. } => ErrorClass::InvalidArgument,

            Self::DatabaseError(_) => ErrorClass::Internal,
        }
    }
}
