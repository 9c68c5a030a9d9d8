//! Ancestry checks over a node snapshot.
//!
//! Reparent validation and parent-picker exclusion both need to answer
//! "is X somewhere under Y". Walking parents with one store query per
//! step gets slow and has no natural bound, so callers snapshot the kind
//! once (`list_nodes`) and build an [`AncestryMap`] to answer any number
//! of questions in memory.

use std::collections::{HashMap, HashSet};

use crate::models::Node;

/// Parent and child indexes over one snapshot of nodes.
///
/// The map reflects the snapshot it was built from; rebuild after
/// mutations.
#[derive(Debug)]
pub struct AncestryMap {
    parents: HashMap<String, Option<String>>,
    children: HashMap<String, Vec<String>>,
}

impl AncestryMap {
    /// Index a snapshot.
    pub fn build(nodes: &[Node]) -> Self {
        let mut parents = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for node in nodes {
            parents.insert(node.id.clone(), node.parent_id.clone());
            if let Some(parent) = &node.parent_id {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }

        Self { parents, children }
    }

    /// Number of nodes in the snapshot.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether the snapshot contains this id.
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Whether `ancestor_id` appears on the parent chain of
    /// `candidate_id`.
    ///
    /// A node counts as reachable from itself, so
    /// `is_descendant(x, x)` is true; callers that need to treat the
    /// self case differently screen it before asking.
    ///
    /// The walk is bounded by the snapshot size. A valid chain can never
    /// be longer than that; hitting the bound means the stored data
    /// contains a cycle, and the answer degrades to `false` instead of
    /// looping.
    pub fn is_descendant(&self, candidate_id: &str, ancestor_id: &str) -> bool {
        let mut current = candidate_id;

        for _ in 0..=self.parents.len() {
            if current == ancestor_id {
                return true;
            }
            match self.parents.get(current) {
                Some(Some(parent)) => current = parent,
                _ => return false,
            }
        }

        false
    }

    /// The id itself plus every node below it.
    ///
    /// This is the exclusion set for parent pickers: choosing any member
    /// as the new parent of `id` would create a cycle.
    pub fn exclude_self_and_descendants<'a>(&'a self, id: &'a str) -> HashSet<String> {
        let mut excluded = HashSet::new();
        excluded.insert(id.to_string());

        let mut stack: Vec<&'a str> = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.get(current) {
                for kid in kids {
                    if excluded.insert(kid.clone()) {
                        stack.push(kid.as_str());
                    }
                }
            }
        }

        excluded
    }
}
