//! Flat-list to forest assembly.
//!
//! Builds nested trees from a flat node list in a single pass: one
//! grouping pass over the input, then recursive attachment that drains
//! the group index. No per-node filtering of the full list.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::{Node, TreeNode};

/// Sibling presentation order: `sort_order` ascending, then `created_at`
/// descending (newest first among ties).
///
/// Used with stable sorts, so fully tied nodes keep their input order.
pub fn sibling_cmp(a: &Node, b: &Node) -> Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Assemble a forest from a flat node list.
///
/// Roots are nodes without a parent, plus nodes whose parent is absent
/// from the input (orphans surface at top level instead of vanishing).
/// Every sibling group is sorted with [`sibling_cmp`].
///
/// Every input node appears in the output exactly once, whatever the
/// input looks like. Cyclic parent chains cannot occur in data that went
/// through the service, but if corrupt rows contain one, the members are
/// promoted to roots in deterministic order rather than dropped.
pub fn build_tree(nodes: Vec<Node>) -> Vec<TreeNode> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();

    let mut roots: Vec<Node> = Vec::new();
    let mut children_of: HashMap<String, Vec<Node>> = HashMap::new();

    for node in nodes {
        match &node.parent_id {
            Some(parent) if ids.contains(parent) && parent != &node.id => {
                children_of.entry(parent.clone()).or_default().push(node);
            }
            // Root, orphan, or self-referencing row
            _ => roots.push(node),
        }
    }

    roots.sort_by(sibling_cmp);
    for bucket in children_of.values_mut() {
        bucket.sort_by(sibling_cmp);
    }

    let mut forest: Vec<TreeNode> = roots
        .into_iter()
        .map(|node| attach_children(node, &mut children_of))
        .collect();

    // Leftover buckets mean the input contained a cycle. Promote those
    // nodes to roots, smallest bucket key first, so nothing is lost.
    while !children_of.is_empty() {
        let mut keys: Vec<String> = children_of.keys().cloned().collect();
        keys.sort();
        if let Some(bucket) = children_of.remove(&keys[0]) {
            for node in bucket {
                forest.push(attach_children(node, &mut children_of));
            }
        }
    }

    forest
}

fn attach_children(node: Node, children_of: &mut HashMap<String, Vec<Node>>) -> TreeNode {
    let children = match children_of.remove(&node.id) {
        Some(bucket) => bucket
            .into_iter()
            .map(|child| attach_children(child, children_of))
            .collect(),
        None => Vec::new(),
    };

    TreeNode { node, children }
}
