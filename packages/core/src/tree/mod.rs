//! Tree Assembly and Ancestry
//!
//! Pure, synchronous hierarchy helpers. Callers snapshot nodes from the
//! store once, then assemble or validate in memory; nothing here touches
//! the database.

mod ancestry;
mod assembler;

pub use ancestry::AncestryMap;
pub use assembler::{build_tree, sibling_cmp};
