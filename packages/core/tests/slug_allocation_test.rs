//! Slug Allocation Tests
//!
//! Integration tests for slug derivation, per-kind uniqueness and the
//! per-kind slug policies against a real temp-file store.
//!
//! ## Test Coverage
//! - Derivation from display names, including symbol-only fallback
//! - Suffix allocation under collisions (create and update)
//! - Explicit slug handling: category override, menu requirement,
//!   format validation, menu immutability
//! - Per-kind (not global) uniqueness scope

#[cfg(test)]
mod slug_allocation_tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::TempDir;
    use trellis_core::db::SqliteStore;
    use trellis_core::models::{CreateNodeRequest, Node, NodeKind, NodePatch};
    use trellis_core::services::{ErrorClass, NodeService, NodeServiceError};

    /// Helper to create a service over a fresh on-disk database
    async fn create_test_service() -> Result<(NodeService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let store = Arc::new(SqliteStore::new(db_path).await?);
        Ok((NodeService::new(store), temp_dir))
    }

    async fn create_category(service: &NodeService, name: &str) -> Result<Node> {
        let created = service
            .create(NodeKind::Category, CreateNodeRequest::new(name))
            .await?;
        Ok(created.node)
    }

    async fn create_menu(service: &NodeService, name: &str, slug: &str) -> Result<Node> {
        let created = service
            .create(
                NodeKind::Menu,
                CreateNodeRequest::new(name)
                    .with_slug(slug)
                    .with_properties(json!({"url": format!("/{slug}")})),
            )
            .await?;
        Ok(created.node)
    }

    #[tokio::test]
    async fn test_slug_derived_from_name() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(
            create_category(&service, "Breaking News!").await?.slug,
            "breaking-news"
        );
        assert_eq!(
            create_category(&service, "  Rust_&_Go  ").await?.slug,
            "rust-go"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_names_get_numeric_suffixes() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(create_category(&service, "News").await?.slug, "news");
        assert_eq!(create_category(&service, "News").await?.slug, "news-1");
        assert_eq!(create_category(&service, "News").await?.slug, "news-2");

        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_category_slug_override() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let node = service
            .create(
                NodeKind::Category,
                CreateNodeRequest::new("World News").with_slug("world"),
            )
            .await?;
        assert_eq!(node.node.slug, "world");

        // A colliding explicit slug is suffixed like a derived one
        let second = service
            .create(
                NodeKind::Category,
                CreateNodeRequest::new("Another World").with_slug("world"),
            )
            .await?;
        assert_eq!(second.node.slug, "world-1");

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_explicit_slug_rejected() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        for bad in ["Not A Slug", "UPPER", "double--hyphen", "-edge", ""] {
            let err = service
                .create(
                    NodeKind::Category,
                    CreateNodeRequest::new("News").with_slug(bad),
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, NodeServiceError::InvalidField { field: "slug", .. }),
                "slug {bad:?} should be rejected, got {err:?}"
            );
            assert_eq!(err.class(), ErrorClass::InvalidArgument);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_menu_requires_explicit_slug() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let err = service
            .create(NodeKind::Menu, CreateNodeRequest::new("Home"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NodeServiceError::InvalidField { field: "slug", .. }
        ));
        assert_eq!(err.class(), ErrorClass::InvalidArgument);

        Ok(())
    }

    #[tokio::test]
    async fn test_menu_slug_is_immutable() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let home = create_menu(&service, "Home", "home").await?;

        let err = service
            .update(
                NodeKind::Menu,
                &home.id,
                NodePatch::new().with_slug("start".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::SlugImmutable { .. }));
        assert_eq!(err.class(), ErrorClass::Conflict);

        // Re-sending the current slug is a no-op, not a violation
        let updated = service
            .update(
                NodeKind::Menu,
                &home.id,
                NodePatch::new()
                    .with_slug("home".to_string())
                    .with_name("Start".to_string()),
            )
            .await?;
        assert_eq!(updated.node.slug, "home");
        assert_eq!(updated.node.name, "Start");

        Ok(())
    }

    #[tokio::test]
    async fn test_category_slug_update_reallocates() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        create_category(&service, "News").await?;
        let tech = create_category(&service, "Tech").await?;

        // Moving onto an occupied slug gets the next free suffix
        let updated = service
            .update(
                NodeKind::Category,
                &tech.id,
                NodePatch::new().with_slug("news".to_string()),
            )
            .await?;
        assert_eq!(updated.node.slug, "news-1");

        // Keeping one's own slug never suffixes
        let kept = service
            .update(
                NodeKind::Category,
                &tech.id,
                NodePatch::new().with_slug("news-1".to_string()),
            )
            .await?;
        assert_eq!(kept.node.slug, "news-1");

        Ok(())
    }

    #[tokio::test]
    async fn test_symbol_only_name_falls_back_to_kind_label() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(create_category(&service, "!!!").await?.slug, "category");
        assert_eq!(create_category(&service, "???").await?.slug, "category-1");

        Ok(())
    }

    #[tokio::test]
    async fn test_uniqueness_is_scoped_per_kind() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let category = create_category(&service, "Home").await?;
        assert_eq!(category.slug, "home");

        // The same slug is free in the menu namespace
        let menu = create_menu(&service, "Home", "home").await?;
        assert_eq!(menu.slug, "home");

        assert_eq!(
            service.node_by_slug(NodeKind::Category, "home").await?.id,
            category.id
        );
        assert_eq!(
            service.node_by_slug(NodeKind::Menu, "home").await?.id,
            menu.id
        );

        Ok(())
    }
}
