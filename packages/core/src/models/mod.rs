//! Data Models
//!
//! Core data structures shared across the crate:
//!
//! - `Node` - the single entity for categories and menus
//! - `NodeKind` / `KindPolicy` - the kind parameterization (slug policy,
//!   public exposure)
//! - Carrier types for partial updates, tree-shaped results and the
//!   public projection
//!
//! Kind-specific payloads live in the `properties` JSON field of the one
//! `nodes` table; the models never interpret them.

mod kind;
mod node;

pub use kind::{KindPolicy, NodeKind, SlugSource, UnknownKindError};
pub use node::{
    CreateNodeRequest, Node, NodePatch, OrderUpdate, ParentOption, PublicNode, ReorderFailure,
    ReorderReport, TreeNode, ValidationError, MAX_NAME_LEN,
};
