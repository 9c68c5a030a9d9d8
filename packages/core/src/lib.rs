//! Trellis Core Hierarchy Layer
//!
//! This crate provides the data management, hierarchy rules, and service
//! orchestration behind Trellis category taxonomies and navigation menus.
//!
//! # Architecture
//!
//! - **One schema, two kinds**: categories and menus share the `nodes`
//!   table and the whole service layer; a per-kind policy carries the
//!   few rules that differ (slug source, mutability, public view)
//! - **Opaque payloads**: kind-specific data lives in the JSON
//!   `properties` field, so new payload keys never need a migration
//! - **libsql**: embedded SQLite-compatible database, one file per
//!   deployment
//! - **Invariants in one place**: parent existence, cycle refusal,
//!   delete guards and slug uniqueness are enforced by the service,
//!   not scattered across callers
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, TreeNode, NodePatch, etc.)
//! - [`db`] - Database layer with libsql integration
//! - [`tree`] - Pure tree assembly and ancestry indexing
//! - [`services`] - Business services (NodeService, slug allocation)

pub mod db;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use models::*;
pub use services::*;
