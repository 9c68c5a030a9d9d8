//! Node kinds and per-kind behavior policies.
//!
//! Trellis manages two families of hierarchy with one schema and one
//! service: category taxonomies and navigation menus. The kind is the
//! namespace for slug uniqueness and selects the policy that governs
//! slug handling and public exposure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a kind discriminator string is not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown node kind: {0}")]
pub struct UnknownKindError(pub String);

/// The two node namespaces.
///
/// Slugs are unique within a kind, parents must share their child's kind,
/// and every service operation is scoped to a single kind per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Taxonomy entries. Slug is derived from the name and stays editable.
    Category,
    /// Navigation entries. Slug is supplied explicitly, immutable after
    /// creation, and the kind carries a visitor-facing tree projection.
    Menu,
}

impl NodeKind {
    /// Discriminator stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Category => "category",
            NodeKind::Menu => "menu",
        }
    }

    /// Behavior descriptor for this kind.
    pub fn policy(&self) -> &'static KindPolicy {
        match self {
            NodeKind::Category => &CATEGORY_POLICY,
            NodeKind::Menu => &MENU_POLICY,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(NodeKind::Category),
            "menu" => Ok(NodeKind::Menu),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// Where a node's slug comes from at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugSource {
    /// Slugified from the name unless the caller supplies an override.
    DerivedFromName,
    /// Must be supplied by the caller.
    RequiredInput,
}

/// Static behavior table for a kind.
///
/// Policies keep kind-specific rules out of the service's control flow:
/// the coordinator reads the policy instead of matching on the kind.
#[derive(Debug)]
pub struct KindPolicy {
    /// Human label; doubles as the fallback slug stem when a name
    /// slugifies to nothing.
    pub label: &'static str,
    /// How the slug is obtained on create.
    pub slug_source: SlugSource,
    /// Whether the slug may change after creation.
    pub slug_mutable: bool,
    /// Whether the kind has a public (visitor-facing) projection.
    pub public_view: bool,
    /// Payload key gating public visibility. A missing key counts as
    /// visible.
    pub visibility_property: Option<&'static str>,
    /// Payload keys stripped from the public projection.
    pub internal_properties: &'static [&'static str],
}

static CATEGORY_POLICY: KindPolicy = KindPolicy {
    label: "category",
    slug_source: SlugSource::DerivedFromName,
    slug_mutable: true,
    public_view: false,
    visibility_property: None,
    internal_properties: &[],
};

static MENU_POLICY: KindPolicy = KindPolicy {
    label: "menu",
    slug_source: SlugSource::RequiredInput,
    slug_mutable: false,
    public_view: true,
    visibility_property: Some("isVisible"),
    internal_properties: &["isVisible", "requiresAuth"],
};
