//! Node Service - Hierarchy Coordination
//!
//! The business logic layer over the node store:
//!
//! - CRUD with per-kind slug policy and parent validation
//! - Hierarchy reads (flat, one level deep, fully nested, parent options)
//! - Batch delete with all-or-nothing semantics
//! - Sibling reordering with per-item independence
//! - Public projection of visitor-facing menu trees
//!
//! Every hierarchy rule lives here; the store stays a plain repository.
//! All operations are scoped to a single [`NodeKind`] per call, so
//! category and menu trees never observe each other.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{DatabaseError, NodeStore};
use crate::models::{
    CreateNodeRequest, KindPolicy, Node, NodeKind, NodePatch, OrderUpdate, ParentOption,
    PublicNode, ReorderFailure, ReorderReport, SlugSource, TreeNode, MAX_NAME_LEN,
};
use crate::services::error::{BatchFailure, NodeServiceError};
use crate::services::slug;
use crate::tree::{build_tree, AncestryMap};

/// Coordinator for hierarchy reads and mutations.
///
/// Holds no state beyond the store handle; clones are cheap and share
/// the same underlying database.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use trellis_core::db::SqliteStore;
/// # use trellis_core::models::{CreateNodeRequest, NodeKind};
/// # use trellis_core::services::NodeService;
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let store = Arc::new(SqliteStore::new("data/trellis.db").await?);
/// let service = NodeService::new(store);
///
/// let created = service
///     .create(NodeKind::Category, CreateNodeRequest::new("Breaking News"))
///     .await?;
/// assert_eq!(created.node.slug, "breaking-news");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,
}

impl NodeService {
    /// Create a service over any node store.
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    ///
    /// Useful for maintenance paths that need raw repository access.
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    //
    // READS
    //

    /// Fetch a node by id within a kind.
    ///
    /// An id that exists under a different kind is [`NodeNotFound`]: ids
    /// from a foreign namespace do not exist in this one.
    ///
    /// [`NodeNotFound`]: NodeServiceError::NodeNotFound
    pub async fn node(&self, kind: NodeKind, id: &str) -> Result<Node, NodeServiceError> {
        self.store
            .get_node(id)
            .await?
            .filter(|node| node.kind == kind)
            .ok_or_else(|| NodeServiceError::node_not_found(id))
    }

    /// Fetch a node by slug within a kind. Same contract as [`node`],
    /// keyed by slug.
    ///
    /// [`node`]: NodeService::node
    pub async fn node_by_slug(&self, kind: NodeKind, slug: &str) -> Result<Node, NodeServiceError> {
        self.store
            .get_node_by_slug(kind, slug)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(slug))
    }

    /// List every node of a kind, flat, in repository order.
    pub async fn list(&self, kind: NodeKind) -> Result<Vec<Node>, NodeServiceError> {
        Ok(self.store.list_nodes(kind).await?)
    }

    /// List the direct children of a parent, or the kind's roots when
    /// `parent_id` is `None`.
    ///
    /// # Errors
    ///
    /// `ParentNotFound` when a parent id is given and no node of this
    /// kind carries it.
    pub async fn list_children(
        &self,
        kind: NodeKind,
        parent_id: Option<&str>,
    ) -> Result<Vec<Node>, NodeServiceError> {
        if let Some(parent_id) = parent_id {
            self.require_parent(kind, parent_id).await?;
        }

        Ok(self.store.list_children(kind, parent_id).await?)
    }

    /// Like [`list_children`], but each returned node also carries its
    /// own direct children, one level deep.
    ///
    /// [`list_children`]: NodeService::list_children
    pub async fn list_with_children(
        &self,
        kind: NodeKind,
        parent_id: Option<&str>,
    ) -> Result<Vec<TreeNode>, NodeServiceError> {
        let nodes = self.list_children(kind, parent_id).await?;

        let mut result = Vec::with_capacity(nodes.len());
        for node in nodes {
            let children = self.store.list_children(kind, Some(&node.id)).await?;
            result.push(TreeNode::with_children(
                node,
                children.into_iter().map(TreeNode::leaf).collect(),
            ));
        }

        Ok(result)
    }

    /// Assemble the full nested tree for a kind.
    ///
    /// Single snapshot query, in-memory assembly. Rows with unresolvable
    /// parents are promoted to roots rather than dropped.
    pub async fn tree(&self, kind: NodeKind) -> Result<Vec<TreeNode>, NodeServiceError> {
        let nodes = self.store.list_nodes(kind).await?;
        Ok(build_tree(nodes))
    }

    /// Candidate parents for a picker, as `(value, label)` pairs sorted
    /// by label (case-insensitive), then id.
    ///
    /// When `exclude_id` is given, that node and its entire subtree are
    /// left out, so the picker cannot offer a cycle-inducing choice.
    pub async fn parent_options(
        &self,
        kind: NodeKind,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ParentOption>, NodeServiceError> {
        let nodes = self.store.list_nodes(kind).await?;

        let mut options: Vec<ParentOption> = match exclude_id {
            Some(exclude_id) => {
                let excluded = AncestryMap::build(&nodes).exclude_self_and_descendants(exclude_id);
                nodes
                    .iter()
                    .filter(|node| !excluded.contains(node.id.as_str()))
                    .map(ParentOption::from)
                    .collect()
            }
            None => nodes.iter().map(ParentOption::from).collect(),
        };

        options.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.value.cmp(&b.value))
        });

        Ok(options)
    }

    /// The visitor-facing tree for a kind with a public view.
    ///
    /// Builds the full tree, prunes every subtree whose root is flagged
    /// hidden, then projects to [`PublicNode`], stripping the kind's
    /// internal payload keys. A node without the visibility flag counts
    /// as visible.
    ///
    /// # Errors
    ///
    /// `NoPublicView` for kinds without a public projection (categories).
    pub async fn public_tree(&self, kind: NodeKind) -> Result<Vec<PublicNode>, NodeServiceError> {
        let policy = kind.policy();
        if !policy.public_view {
            return Err(NodeServiceError::no_public_view(kind));
        }

        let full = self.tree(kind).await?;
        Ok(project_public(full, policy))
    }

    //
    // WRITES
    //

    /// Create a node.
    ///
    /// Validates the name, checks the parent (same kind), resolves the
    /// slug per the kind's policy and inserts. A slug race lost to a
    /// concurrent create is retried once against fresh state; a second
    /// collision surfaces as `SlugConflict`.
    ///
    /// # Errors
    ///
    /// - `InvalidField` for a blank/oversized name, a malformed explicit
    ///   slug, or a missing slug on kinds that require one
    /// - `ParentNotFound` when `parent_id` does not exist within the kind
    /// - `SlugConflict` when allocation cannot find a free slug
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use trellis_core::db::SqliteStore;
    /// # use trellis_core::models::{CreateNodeRequest, NodeKind};
    /// # use trellis_core::services::NodeService;
    /// # use serde_json::json;
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// # let service = NodeService::new(Arc::new(SqliteStore::new("data/trellis.db").await?));
    /// let request = CreateNodeRequest::new("Home")
    ///     .with_slug("home")
    ///     .with_properties(json!({"url": "/", "isVisible": true}));
    ///
    /// let created = service.create(NodeKind::Menu, request).await?;
    /// assert!(created.children.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(
        &self,
        kind: NodeKind,
        request: CreateNodeRequest,
    ) -> Result<TreeNode, NodeServiceError> {
        let name = validate_name(&request.name)?;

        // Parents must exist within the same kind
        if let Some(parent_id) = &request.parent_id {
            self.require_parent(kind, parent_id).await?;
        }

        let base = resolve_slug_base(kind, &name, request.slug.as_deref())?;
        let allocated = slug::ensure_unique(self.store.as_ref(), kind, &base, None).await?;

        let mut node = Node::new(
            kind,
            name,
            allocated,
            request.parent_id.clone(),
            request.properties.clone(),
        )
        .with_sort_order(request.sort_order);
        if let Some(description) = &request.description {
            node = node.with_description(description.clone());
        }
        node.validate()?;

        let created = match self.store.insert_node(node.clone()).await {
            Ok(created) => created,
            Err(e) if e.is_unique_violation() => {
                // Lost the slug to a concurrent create between the
                // uniqueness probe and the insert. Re-resolve once
                // against fresh state and retry.
                tracing::warn!(
                    kind = %kind,
                    slug = %node.slug,
                    "slug taken concurrently, reallocating"
                );
                let retry = slug::ensure_unique(self.store.as_ref(), kind, &base, None).await?;
                node.slug = retry;

                match self.store.insert_node(node.clone()).await {
                    Ok(created) => created,
                    Err(e) if e.is_unique_violation() => {
                        return Err(NodeServiceError::slug_conflict(kind, node.slug));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(kind = %kind, id = %created.id, slug = %created.slug, "node created");

        Ok(TreeNode::leaf(created))
    }

    /// Apply a partial update to a node.
    ///
    /// Field semantics:
    ///
    /// - `name` is validated like on create
    /// - `slug` changes go through the kind's mutability policy, format
    ///   check and uniqueness allocation (self excluded); re-sending the
    ///   current slug is a no-op
    /// - `parent_id` moves are checked for self-parenting, parent
    ///   existence in-kind, and cycles; `Some(None)` moves to root
    /// - `properties` replaces the payload wholesale
    ///
    /// Returns the updated node with its direct children one level deep.
    pub async fn update(
        &self,
        kind: NodeKind,
        id: &str,
        patch: NodePatch,
    ) -> Result<TreeNode, NodeServiceError> {
        self.apply_update(kind, id, patch, None).await
    }

    /// Like [`update`], but guarded by optimistic concurrency control.
    ///
    /// The patch is rejected with `VersionConflict` when the stored
    /// version no longer matches `expected_version`, so two editors
    /// cannot silently overwrite each other.
    ///
    /// [`update`]: NodeService::update
    pub async fn update_with_version(
        &self,
        kind: NodeKind,
        id: &str,
        patch: NodePatch,
        expected_version: i64,
    ) -> Result<TreeNode, NodeServiceError> {
        self.apply_update(kind, id, patch, Some(expected_version))
            .await
    }

    /// Delete a node.
    ///
    /// Refused with `HasChildren` while any child remains; deletion
    /// never cascades and never reparents orphans silently.
    pub async fn delete(&self, kind: NodeKind, id: &str) -> Result<(), NodeServiceError> {
        let node = self.node(kind, id).await?;

        let child_count = self.store.count_children(&node.id).await?;
        if child_count > 0 {
            return Err(NodeServiceError::has_children(
                node.id.as_str(),
                node.name.as_str(),
                child_count,
            ));
        }

        self.store
            .delete_node(&node.id)
            .await
            .map_err(|e| missing_row(e, &node.id))?;

        tracing::debug!(kind = %kind, id = %node.id, "node deleted");

        Ok(())
    }

    /// Delete several nodes, all or nothing.
    ///
    /// Every id is validated up front: it must exist within the kind and
    /// have no children. All failures are collected into one
    /// `BatchDeleteBlocked` before anything is touched; only a fully
    /// valid batch reaches the store's transactional delete.
    ///
    /// Each id must be deletable on its own: a parent is blocked even
    /// when all of its children are in the same batch.
    ///
    /// Duplicate ids are deduplicated; an empty batch is `Ok(0)`.
    pub async fn batch_delete(
        &self,
        kind: NodeKind,
        ids: &[String],
    ) -> Result<u64, NodeServiceError> {
        let mut seen = HashSet::new();
        let targets: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        if targets.is_empty() {
            return Ok(0);
        }

        let mut failures = Vec::new();
        for id in &targets {
            match self.node(kind, id).await {
                Err(NodeServiceError::NodeNotFound { .. }) => failures.push(BatchFailure {
                    id: id.clone(),
                    name: None,
                    reason: "not found".to_string(),
                }),
                Err(e) => return Err(e),
                Ok(node) => {
                    let child_count = self.store.count_children(&node.id).await?;
                    if child_count > 0 {
                        failures.push(BatchFailure {
                            id: id.clone(),
                            name: Some(node.name),
                            reason: format!("has {child_count} child node(s)"),
                        });
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(NodeServiceError::batch_delete_blocked(
                targets.len(),
                failures,
            ));
        }

        let deleted = self.store.delete_nodes(&targets).await?;
        tracing::debug!(kind = %kind, deleted, "batch delete committed");

        Ok(deleted)
    }

    /// Apply sibling ordering weights, item by item.
    ///
    /// Items are independent: a missing id is recorded as a failure and
    /// the remaining items still apply. Only storage-level trouble
    /// (beyond a vanished row) aborts the whole call.
    pub async fn update_order(
        &self,
        kind: NodeKind,
        updates: Vec<OrderUpdate>,
    ) -> Result<ReorderReport, NodeServiceError> {
        let mut applied = 0;
        let mut failures = Vec::new();

        for update in updates {
            match self.node(kind, &update.id).await {
                Err(NodeServiceError::NodeNotFound { .. }) => {
                    tracing::warn!(kind = %kind, id = %update.id, "reorder target missing, skipping");
                    failures.push(ReorderFailure {
                        id: update.id,
                        reason: "not found".to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
                Ok(_) => {}
            }

            let patch = NodePatch::new().with_sort_order(update.sort_order);
            match self.store.update_node(&update.id, patch).await {
                Ok(_) => applied += 1,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(kind = %kind, id = %update.id, "reorder target vanished, skipping");
                    failures.push(ReorderFailure {
                        id: update.id,
                        reason: "not found".to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ReorderReport { applied, failures })
    }

    //
    // INTERNALS
    //

    /// Resolve a parent id within the kind, mapping a miss to
    /// `ParentNotFound`.
    async fn require_parent(
        &self,
        kind: NodeKind,
        parent_id: &str,
    ) -> Result<Node, NodeServiceError> {
        match self.node(kind, parent_id).await {
            Ok(parent) => Ok(parent),
            Err(NodeServiceError::NodeNotFound { .. }) => {
                Err(NodeServiceError::parent_not_found(parent_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Shared update path; `expected_version` is the OCC gate.
    async fn apply_update(
        &self,
        kind: NodeKind,
        id: &str,
        patch: NodePatch,
        expected_version: Option<i64>,
    ) -> Result<TreeNode, NodeServiceError> {
        let current = self.node(kind, id).await?;

        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(NodeServiceError::version_conflict(
                    id,
                    expected,
                    current.version,
                ));
            }
        }

        let patch = self.validate_patch(kind, &current, patch).await?;

        let updated = self
            .store
            .update_node(id, patch)
            .await
            .map_err(|e| missing_row(e, id))?;
        let children = self.store.list_children(kind, Some(id)).await?;

        tracing::debug!(kind = %kind, id = %updated.id, version = updated.version, "node updated");

        Ok(TreeNode::with_children(
            updated,
            children.into_iter().map(TreeNode::leaf).collect(),
        ))
    }

    /// Check every patched field against the hierarchy rules, returning
    /// the normalized patch the store may apply verbatim.
    async fn validate_patch(
        &self,
        kind: NodeKind,
        current: &Node,
        mut patch: NodePatch,
    ) -> Result<NodePatch, NodeServiceError> {
        if let Some(name) = patch.name.take() {
            patch.name = Some(validate_name(&name)?);
        }

        // Re-sending the current slug is a no-op, not a policy violation
        if patch.slug.as_deref() == Some(current.slug.as_str()) {
            patch.slug = None;
        }
        if let Some(requested) = patch.slug.take() {
            if !kind.policy().slug_mutable {
                return Err(NodeServiceError::slug_immutable(kind, current.id.as_str()));
            }
            if !slug::is_valid_slug(&requested) {
                return Err(malformed_slug(&requested));
            }

            let resolved = slug::ensure_unique(
                self.store.as_ref(),
                kind,
                &requested,
                Some(current.id.as_str()),
            )
            .await?;
            patch.slug = Some(resolved);
        }

        if let Some(Some(parent_id)) = &patch.parent_id {
            if parent_id == &current.id {
                return Err(NodeServiceError::self_parent(current.id.as_str()));
            }
            self.require_parent(kind, parent_id).await?;

            // A parent inside the node's own subtree would close a cycle
            let snapshot = self.store.list_nodes(kind).await?;
            let ancestry = AncestryMap::build(&snapshot);
            if ancestry.is_descendant(parent_id, &current.id) {
                return Err(NodeServiceError::would_create_cycle(
                    current.id.as_str(),
                    parent_id.as_str(),
                ));
            }
        }

        Ok(patch)
    }
}

/// Trim and bound a display name.
fn validate_name(name: &str) -> Result<String, NodeServiceError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(NodeServiceError::invalid_field("name", "must not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(NodeServiceError::invalid_field(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }

    Ok(trimmed.to_string())
}

/// Pick the slug base for a create, per the kind's policy.
///
/// Explicit slugs must already be canonical on either kind; they are
/// never silently rewritten. Without one, derived kinds slugify the
/// name and explicit-input kinds fail.
fn resolve_slug_base(
    kind: NodeKind,
    name: &str,
    explicit: Option<&str>,
) -> Result<String, NodeServiceError> {
    match explicit {
        Some(requested) => {
            if !slug::is_valid_slug(requested) {
                return Err(malformed_slug(requested));
            }
            Ok(requested.to_string())
        }
        None => match kind.policy().slug_source {
            SlugSource::DerivedFromName => Ok(slug::slugify(name, kind)),
            SlugSource::RequiredInput => Err(NodeServiceError::invalid_field(
                "slug",
                format!("{kind} nodes require an explicit slug"),
            )),
        },
    }
}

fn malformed_slug(requested: &str) -> NodeServiceError {
    NodeServiceError::invalid_field(
        "slug",
        format!("'{requested}' must be lowercase letters and digits separated by single hyphens"),
    )
}

/// Map a row that vanished between the service's read and the store's
/// write onto the same `NodeNotFound` the read would have given.
fn missing_row(err: DatabaseError, id: &str) -> NodeServiceError {
    if err.is_not_found() {
        NodeServiceError::node_not_found(id)
    } else {
        NodeServiceError::from(err)
    }
}

/// Visibility gate for the public projection. Only an explicit boolean
/// `false` hides a node; a missing or non-boolean flag counts as visible.
fn is_publicly_visible(node: &Node, policy: &KindPolicy) -> bool {
    match policy.visibility_property {
        Some(key) => node
            .properties
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true),
        None => true,
    }
}

/// Project a tree level to its public form.
///
/// A hidden node takes its whole subtree with it; children of a hidden
/// branch never resurface as public roots.
fn project_public(trees: Vec<TreeNode>, policy: &KindPolicy) -> Vec<PublicNode> {
    trees
        .into_iter()
        .filter(|tree| is_publicly_visible(&tree.node, policy))
        .map(|tree| {
            let mut public = PublicNode::project(&tree.node, policy.internal_properties);
            public.children = project_public(tree.children, policy);
            public
        })
        .collect()
}
