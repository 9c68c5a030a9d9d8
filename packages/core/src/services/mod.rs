//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `NodeService` - CRUD operations and hierarchy management for
//!   categories and navigation menus
//! - `slug` - slug derivation and per-kind uniqueness allocation
//!
//! Services coordinate between the database layer and application logic,
//! implementing the hierarchy rules and orchestrating multi-step
//! operations.

pub mod error;
pub mod node_service;
pub mod slug;

pub use error::{BatchFailure, ErrorClass, NodeServiceError};
pub use node_service::NodeService;
