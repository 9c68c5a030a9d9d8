//! Node data structures.
//!
//! This module defines the single `Node` entity Trellis uses for every
//! hierarchy it manages, plus the carrier types for partial updates and
//! tree-shaped results.
//!
//! # Architecture
//!
//! - **One entity**: categories and menus are the same struct, told apart
//!   by [`NodeKind`]
//! - **Opaque payload**: kind-specific data (menu URLs, icons, visibility
//!   flags) lives in the `properties` JSON object and is never
//!   interpreted by storage or hierarchy logic
//! - **Versioned rows**: `version` is bumped on every update so callers
//!   can detect lost-update races
//!
//! # Examples
//!
//! ```rust
//! use trellis_core::models::{Node, NodeKind};
//! use serde_json::json;
//!
//! let node = Node::new(
//!     NodeKind::Category,
//!     "Technology".to_string(),
//!     "technology".to_string(),
//!     None,
//!     json!({}),
//! );
//! assert!(node.is_root());
//! assert!(node.validate().is_ok());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::kind::NodeKind;

/// Maximum accepted length of a node name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Default version value for serde deserialization (version 1)
fn default_version() -> i64 {
    1
}

fn default_properties() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Validation errors for Node construction and updates.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),
}

/// A named, sluggable, orderable entry in a hierarchy.
///
/// # Fields
///
/// - `id`: UUID, generated at construction
/// - `kind`: namespace the node belongs to (category or menu)
/// - `name`: display name, 1 to 255 characters
/// - `slug`: URL-safe identifier, unique within the kind
/// - `parent_id`: optional reference to the parent node; `None` is a root
/// - `sort_order`: sibling position, ascending; duplicates allowed
/// - `description`: optional free text
/// - `properties`: kind-specific JSON payload, opaque to the core
/// - `version`: bumped on every update, for optimistic concurrency
/// - `created_at` / `updated_at`: timestamps
///
/// Sibling presentation order is `sort_order` ascending, then
/// `created_at` descending (newest first among ties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Namespace the node lives in
    pub kind: NodeKind,

    /// Display name
    pub name: String,

    /// URL-safe identifier, unique per kind
    pub slug: String,

    /// Parent node ID; `None` means this node is a root
    pub parent_id: Option<String>,

    /// Sibling ordering weight (ascending)
    #[serde(default)]
    pub sort_order: i64,

    /// Optional free-text description
    pub description: Option<String>,

    /// Kind-specific payload (JSON object). Menus carry keys like
    /// `url`, `icon`, `isVisible`, `requiresAuth` here; the core never
    /// interprets them outside the public projection.
    #[serde(default = "default_properties")]
    pub properties: serde_json::Value,

    /// Optimistic concurrency version (incremented on each update)
    #[serde(default = "default_version")]
    pub version: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node with a generated UUID, version 1 and current
    /// timestamps. `sort_order` starts at 0; use the builder helpers for
    /// the optional fields.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use trellis_core::models::{Node, NodeKind};
    /// # use serde_json::json;
    /// let child = Node::new(
    ///     NodeKind::Menu,
    ///     "Blog".to_string(),
    ///     "blog".to_string(),
    ///     Some("parent-id".to_string()),
    ///     json!({"url": "/blog", "isVisible": true}),
    /// )
    /// .with_sort_order(2);
    ///
    /// assert_eq!(child.sort_order, 2);
    /// assert!(!child.is_root());
    /// ```
    pub fn new(
        kind: NodeKind,
        name: String,
        slug: String,
        parent_id: Option<String>,
        properties: serde_json::Value,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            name,
            slug,
            parent_id,
            sort_order: 0,
            description: None,
            properties,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the sibling ordering weight.
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Validate node structure and required fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty
    /// - `name` is blank or longer than [`MAX_NAME_LEN`] characters
    /// - `properties` is not a JSON object
    /// - the node references itself as parent
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }

        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::InvalidName(format!(
                "name exceeds {} characters",
                MAX_NAME_LEN
            )));
        }

        if !self.properties.is_object() {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }

        if let Some(parent_id) = &self.parent_id {
            if parent_id == &self.id {
                return Err(ValidationError::InvalidParent(
                    "node cannot be its own parent".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Check if this node is a root (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Custom deserializer for optional fields that accepts both plain values
/// and null.
///
/// Maps the JSON input onto the double-Option pattern:
/// - Missing field → None (don't update; via `#[serde(default)]`)
/// - null → Some(None) (set to NULL)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update for PATCH-style operations.
///
/// Only the fields that are set are written; everything else keeps its
/// stored value.
///
/// # Double-Option pattern for nullable fields
///
/// `parent_id` and `description` are nullable columns, so they need three
/// states:
///
/// - `None`: don't change the field
/// - `Some(None)`: set the field to NULL (e.g. move the node to root)
/// - `Some(Some(value))`: set the field to the value
///
/// # Examples
///
/// ```rust
/// # use trellis_core::models::NodePatch;
/// // Rename only
/// let patch = NodePatch::new().with_name("Archive".to_string());
///
/// // Move to root (clear the parent)
/// let patch = NodePatch::new().with_parent(None);
///
/// // Reparent under a specific node
/// let patch = NodePatch::new().with_parent(Some("new-parent-id".to_string()));
/// assert!(!patch.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    /// Update the display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Update the slug (rejected for kinds with immutable slugs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    /// Update the parent reference
    ///
    /// - `None`: don't change parent_id
    /// - `Some(None)`: set parent_id to NULL (move to root)
    /// - `Some(Some(id))`: reparent under the given node
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,

    /// Update the sibling ordering weight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,

    /// Update the description
    ///
    /// - `None`: don't change description
    /// - `Some(None)`: clear the description
    /// - `Some(Some(text))`: set the description
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub description: Option<Option<String>>,

    /// Replace the whole payload object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl NodePatch {
    /// Create a new empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a name update
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set a slug update
    pub fn with_slug(mut self, slug: String) -> Self {
        self.slug = Some(slug);
        self
    }

    /// Set a parent update (`None` moves the node to root)
    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set a sort order update
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Set a description update (`None` clears it)
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Set a payload replacement
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Check if the patch contains any changes
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.parent_id.is_none()
            && self.sort_order.is_none()
            && self.description.is_none()
            && self.properties.is_none()
    }

    /// Merge this patch into a node, refreshing `updated_at`.
    ///
    /// The version bump is the store's responsibility, not the patch's.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(slug) = &self.slug {
            node.slug = slug.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            node.parent_id = parent_id.clone();
        }
        if let Some(sort_order) = self.sort_order {
            node.sort_order = sort_order;
        }
        if let Some(description) = &self.description {
            node.description = description.clone();
        }
        if let Some(properties) = &self.properties {
            node.properties = properties.clone();
        }
        node.updated_at = Utc::now();
    }
}

/// A node with its children attached, as produced by tree assembly.
///
/// Serializes flat: the node's own fields and a `children` array side by
/// side, which is the shape tree UIs consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Wrap a node with no children.
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Wrap a node with the given children.
    pub fn with_children(node: Node, children: Vec<TreeNode>) -> Self {
        Self { node, children }
    }
}

/// Request payload for creating a node.
///
/// `slug` is required for kinds with explicit slugs (menus) and an
/// optional override for kinds that derive it from the name (categories).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub sort_order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_properties")]
    pub properties: serde_json::Value,
}

impl CreateNodeRequest {
    /// Start a request with just a name; everything else defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            parent_id: None,
            sort_order: 0,
            description: None,
            properties: default_properties(),
        }
    }

    /// Set an explicit slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Set the parent node.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the sibling ordering weight.
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the payload object.
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

/// One entry of a reorder request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub id: String,
    pub sort_order: i64,
}

/// Outcome of a reorder call: how many items were applied and which
/// failed. Items are independent, so a partial result is normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReport {
    pub applied: usize,
    pub failures: Vec<ReorderFailure>,
}

impl ReorderReport {
    pub fn all_applied(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A reorder item that could not be applied, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderFailure {
    pub id: String,
    pub reason: String,
}

/// An `(id, name)` pair for parent-picker dropdowns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentOption {
    pub value: String,
    pub label: String,
}

impl From<&Node> for ParentOption {
    fn from(node: &Node) -> Self {
        Self {
            value: node.id.clone(),
            label: node.name.clone(),
        }
    }
}

/// Visitor-facing projection of a menu node.
///
/// Carries only what a public frontend needs: internal payload keys,
/// timestamps, versions and parent linkage are structurally absent
/// rather than filtered at serialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicNode {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub properties: serde_json::Value,
    #[serde(default)]
    pub children: Vec<PublicNode>,
}

impl PublicNode {
    /// Project a node, dropping the given payload keys. Children start
    /// empty; the caller attaches them.
    pub fn project(node: &Node, internal_keys: &[&str]) -> Self {
        let properties = match node.properties.as_object() {
            Some(map) => {
                let filtered: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .filter(|(key, _)| !internal_keys.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                serde_json::Value::Object(filtered)
            }
            None => default_properties(),
        };

        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            slug: node.slug.clone(),
            properties,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;
    use serde_json::json;

    fn category(name: &str, slug: &str) -> Node {
        Node::new(
            NodeKind::Category,
            name.to_string(),
            slug.to_string(),
            None,
            json!({}),
        )
    }

    #[test]
    fn test_node_creation() {
        let node = category("Technology", "technology");

        assert!(!node.id.is_empty());
        assert_eq!(node.kind, NodeKind::Category);
        assert_eq!(node.name, "Technology");
        assert_eq!(node.slug, "technology");
        assert_eq!(node.sort_order, 0);
        assert_eq!(node.version, 1);
        assert!(node.parent_id.is_none());
        assert!(node.is_root());
    }

    #[test]
    fn test_node_builders() {
        let node = category("Science", "science")
            .with_sort_order(5)
            .with_description("Research and discoveries".to_string());

        assert_eq!(node.sort_order, 5);
        assert_eq!(
            node.description,
            Some("Research and discoveries".to_string())
        );
    }

    #[test]
    fn test_node_validation() {
        assert!(category("Valid", "valid").validate().is_ok());
    }

    #[test]
    fn test_node_validation_rejects_blank_name() {
        let mut node = category("Valid", "valid");
        node.name = "   ".to_string();

        assert!(matches!(
            node.validate(),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_node_validation_rejects_oversized_name() {
        let mut node = category("Valid", "valid");
        node.name = "x".repeat(MAX_NAME_LEN + 1);

        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidName(_))
        ));

        node.name = "x".repeat(MAX_NAME_LEN);
        assert!(node.validate().is_ok());
    }

    #[test]
    fn test_node_validation_rejects_self_parent() {
        let mut node = category("Loop", "loop");
        node.parent_id = Some(node.id.clone());

        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_node_validation_rejects_non_object_properties() {
        let mut node = category("Valid", "valid");
        node.properties = json!("not an object");

        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidProperties(_))
        ));
    }

    #[test]
    fn test_patch_builder_and_is_empty() {
        assert!(NodePatch::new().is_empty());

        let patch = NodePatch::new()
            .with_name("Renamed".to_string())
            .with_sort_order(3);

        assert!(!patch.is_empty());
        assert_eq!(patch.name, Some("Renamed".to_string()));
        assert_eq!(patch.sort_order, Some(3));
    }

    #[test]
    fn test_patch_apply_to_merges_fields() {
        let mut node = category("Before", "before").with_description("old".to_string());

        NodePatch::new()
            .with_name("After".to_string())
            .with_parent(Some("parent-1".to_string()))
            .apply_to(&mut node);

        assert_eq!(node.name, "After");
        assert_eq!(node.parent_id, Some("parent-1".to_string()));
        // Untouched fields survive
        assert_eq!(node.slug, "before");
        assert_eq!(node.description, Some("old".to_string()));
    }

    #[test]
    fn test_patch_apply_to_clears_nullable_fields() {
        let mut node = category("Child", "child").with_description("text".to_string());
        node.parent_id = Some("parent-1".to_string());

        NodePatch::new()
            .with_parent(None)
            .with_description(None)
            .apply_to(&mut node);

        assert!(node.parent_id.is_none());
        assert!(node.description.is_none());
    }

    #[test]
    fn test_patch_deserialization_three_states() {
        // Missing field: don't touch the parent
        let patch: NodePatch = serde_json::from_str(r#"{"name": "A"}"#).unwrap();
        assert!(patch.parent_id.is_none());

        // Explicit null: move to root
        let patch: NodePatch = serde_json::from_str(r#"{"parentId": null}"#).unwrap();
        assert_eq!(patch.parent_id, Some(None));

        // Value: reparent
        let patch: NodePatch = serde_json::from_str(r#"{"parentId": "p1"}"#).unwrap();
        assert_eq!(patch.parent_id, Some(Some("p1".to_string())));
    }

    #[test]
    fn test_tree_node_serializes_flat() {
        let tree = TreeNode::with_children(
            category("Root", "root"),
            vec![TreeNode::leaf(category("Leaf", "leaf"))],
        );

        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["name"], "Root");
        assert_eq!(value["slug"], "root");
        assert_eq!(value["children"][0]["name"], "Leaf");
        assert!(value.get("node").is_none());
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateNodeRequest = serde_json::from_str(r#"{"name": "News"}"#).unwrap();

        assert_eq!(request.name, "News");
        assert!(request.slug.is_none());
        assert!(request.parent_id.is_none());
        assert_eq!(request.sort_order, 0);
        assert_eq!(request.properties, json!({}));
    }

    #[test]
    fn test_parent_option_from_node() {
        let node = category("Culture", "culture");
        let option = ParentOption::from(&node);

        assert_eq!(option.value, node.id);
        assert_eq!(option.label, "Culture");
    }

    #[test]
    fn test_public_node_projection_strips_internal_keys() {
        let node = Node::new(
            NodeKind::Menu,
            "Admin".to_string(),
            "admin".to_string(),
            None,
            json!({"url": "/admin", "isVisible": true, "requiresAuth": true}),
        );

        let public = PublicNode::project(&node, &["isVisible", "requiresAuth"]);

        assert_eq!(public.slug, "admin");
        assert_eq!(public.properties, json!({"url": "/admin"}));
        assert!(public.children.is_empty());
    }

    #[test]
    fn test_node_serialization_round_trip() {
        let node = category("Media", "media").with_sort_order(7);

        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();

        assert_eq!(node, back);
        assert!(json.contains("\"sortOrder\":7"));
    }
}
