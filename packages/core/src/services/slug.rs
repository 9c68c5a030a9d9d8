//! Slug Derivation and Allocation
//!
//! Converts display names into URL-safe slugs and resolves collisions by
//! probing numeric suffixes against the store. Uniqueness is scoped per
//! kind; under concurrent writers the storage unique index stays the
//! final arbiter, allocation here only keeps the common path clean.

use std::sync::OnceLock;

use regex::Regex;

use crate::db::NodeStore;
use crate::models::NodeKind;

use super::error::NodeServiceError;

// Canonical slug shape: lowercase alphanumeric runs joined by single hyphens
const SLUG_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";

// Characters dropped before hyphenation (everything outside letters,
// digits, whitespace, underscores and hyphens)
const STRIP_PATTERN: &str = r"[^a-z0-9\s_-]+";

// Separator runs collapsed into a single hyphen
const SEPARATOR_PATTERN: &str = r"[\s_-]+";

/// Suffix probes tried per base before giving up with a conflict.
pub const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Check whether a string is already in canonical slug form.
///
/// # Examples
///
/// ```
/// # use trellis_core::services::slug::is_valid_slug;
/// assert!(is_valid_slug("summer-sale-2024"));
/// assert!(!is_valid_slug("Summer Sale"));
/// assert!(!is_valid_slug("-leading"));
/// assert!(!is_valid_slug(""));
/// ```
pub fn is_valid_slug(slug: &str) -> bool {
    static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
    let slug_regex = SLUG_REGEX.get_or_init(|| Regex::new(SLUG_PATTERN).unwrap());

    slug_regex.is_match(slug)
}

/// Derive a canonical slug from a display name.
///
/// Lowercases, strips characters outside `[a-z0-9 _-]`, collapses
/// whitespace/underscore/hyphen runs into single hyphens, and trims
/// leading/trailing hyphens. Names that reduce to nothing fall back to
/// the kind's label so the caller always gets a probe-able stem.
///
/// # Examples
///
/// ```
/// # use trellis_core::models::NodeKind;
/// # use trellis_core::services::slug::slugify;
/// assert_eq!(slugify("Breaking News!", NodeKind::Category), "breaking-news");
/// assert_eq!(slugify("  Tech__&__Science  ", NodeKind::Category), "tech-science");
/// assert_eq!(slugify("!!!", NodeKind::Category), "category");
/// ```
pub fn slugify(name: &str, kind: NodeKind) -> String {
    static STRIP_REGEX: OnceLock<Regex> = OnceLock::new();
    let strip_regex = STRIP_REGEX.get_or_init(|| Regex::new(STRIP_PATTERN).unwrap());

    static SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();
    let separator_regex = SEPARATOR_REGEX.get_or_init(|| Regex::new(SEPARATOR_PATTERN).unwrap());

    let lowered = name.to_lowercase();
    let stripped = strip_regex.replace_all(&lowered, "");
    let hyphenated = separator_regex.replace_all(&stripped, "-");
    let slug = hyphenated.trim_matches('-').to_string();

    if slug.is_empty() {
        kind.policy().label.to_string()
    } else {
        slug
    }
}

/// Resolve a base slug to one that is free within the kind.
///
/// Probes `base`, then `base-1` through `base-{MAX_SLUG_ATTEMPTS - 1}`,
/// returning the first candidate with no owner. A candidate owned by
/// `exclude_id` counts as free, so a node keeping its own slug through
/// an update does not get a pointless suffix.
pub async fn ensure_unique(
    store: &dyn NodeStore,
    kind: NodeKind,
    base: &str,
    exclude_id: Option<&str>,
) -> Result<String, NodeServiceError> {
    for attempt in 0..MAX_SLUG_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{base}-{attempt}")
        };

        match store.get_node_by_slug(kind, &candidate).await? {
            None => return Ok(candidate),
            Some(owner) if exclude_id == Some(owner.id.as_str()) => return Ok(candidate),
            Some(_) => continue,
        }
    }

    Err(NodeServiceError::slug_conflict(kind, base))
}
