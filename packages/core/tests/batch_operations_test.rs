//! Batch Operation Tests
//!
//! Integration tests for all-or-nothing batch deletes and per-item
//! reordering against a real temp-file store.
//!
//! ## Test Coverage
//! - Batch delete: pre-validation, collected failure reports, strict
//!   per-id child checks, dedup, empty batches, kind scoping
//! - Reorder: partial application, failure reporting, ordering effect

#[cfg(test)]
mod batch_operations_tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::TempDir;
    use trellis_core::db::SqliteStore;
    use trellis_core::models::{CreateNodeRequest, Node, NodeKind, OrderUpdate};
    use trellis_core::services::{ErrorClass, NodeService, NodeServiceError};

    /// Helper to create a service over a fresh on-disk database
    async fn create_test_service() -> Result<(NodeService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let store = Arc::new(SqliteStore::new(db_path).await?);
        Ok((NodeService::new(store), temp_dir))
    }

    async fn create_category(
        service: &NodeService,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Node> {
        let mut request = CreateNodeRequest::new(name);
        if let Some(parent_id) = parent_id {
            request = request.with_parent(parent_id);
        }
        let created = service.create(NodeKind::Category, request).await?;
        Ok(created.node)
    }

    #[tokio::test]
    async fn test_batch_delete_is_all_or_nothing() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let x = create_category(&service, "X", None).await?;
        let y = create_category(&service, "Y", None).await?;
        create_category(&service, "Z", Some(&y.id)).await?;

        let err = service
            .batch_delete(NodeKind::Category, &[x.id.clone(), y.id.clone()])
            .await
            .unwrap_err();

        match &err {
            NodeServiceError::BatchDeleteBlocked { total, failures } => {
                assert_eq!(*total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].id, y.id);
                assert_eq!(failures[0].name.as_deref(), Some("Y"));
                assert!(failures[0].reason.contains("child"));
            }
            other => panic!("expected BatchDeleteBlocked, got {other:?}"),
        }
        assert_eq!(err.class(), ErrorClass::Conflict);

        // Nothing was deleted, including the valid target
        assert!(service.node(NodeKind::Category, &x.id).await.is_ok());
        assert!(service.node(NodeKind::Category, &y.id).await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_delete_reports_every_failure() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let parent = create_category(&service, "Parent", None).await?;
        create_category(&service, "Child", Some(&parent.id)).await?;
        let leaf = create_category(&service, "Leaf", None).await?;

        let err = service
            .batch_delete(
                NodeKind::Category,
                &[
                    parent.id.clone(),
                    "no-such-id".to_string(),
                    leaf.id.clone(),
                ],
            )
            .await
            .unwrap_err();

        match err {
            NodeServiceError::BatchDeleteBlocked { total, failures } => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 2);

                let missing = failures.iter().find(|f| f.id == "no-such-id").unwrap();
                assert!(missing.name.is_none());
                assert_eq!(missing.reason, "not found");

                let blocked = failures.iter().find(|f| f.id == parent.id).unwrap();
                assert_eq!(blocked.name.as_deref(), Some("Parent"));
            }
            other => panic!("expected BatchDeleteBlocked, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_parent_blocked_even_when_children_share_the_batch() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let parent = create_category(&service, "Parent", None).await?;
        let child = create_category(&service, "Child", Some(&parent.id)).await?;

        // Each id must be deletable on its own; batch order does not help
        let err = service
            .batch_delete(NodeKind::Category, &[child.id.clone(), parent.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::BatchDeleteBlocked { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_delete_success_returns_count() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let a = create_category(&service, "A", None).await?;
        let b = create_category(&service, "B", None).await?;
        let c = create_category(&service, "C", None).await?;

        let deleted = service
            .batch_delete(NodeKind::Category, &[a.id.clone(), b.id.clone(), c.id.clone()])
            .await?;
        assert_eq!(deleted, 3);

        for id in [&a.id, &b.id, &c.id] {
            assert!(service.node(NodeKind::Category, id).await.is_err());
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_delete_dedupes_and_handles_empty() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(service.batch_delete(NodeKind::Category, &[]).await?, 0);

        let a = create_category(&service, "A", None).await?;
        let deleted = service
            .batch_delete(NodeKind::Category, &[a.id.clone(), a.id.clone()])
            .await?;
        assert_eq!(deleted, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_delete_is_kind_scoped() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let menu = service
            .create(
                NodeKind::Menu,
                CreateNodeRequest::new("Home")
                    .with_slug("home")
                    .with_properties(json!({"url": "/"})),
            )
            .await?;

        // A menu id does not exist in the category namespace
        let err = service
            .batch_delete(NodeKind::Category, &[menu.node.id.clone()])
            .await
            .unwrap_err();
        match err {
            NodeServiceError::BatchDeleteBlocked { failures, .. } => {
                assert_eq!(failures[0].reason, "not found");
            }
            other => panic!("expected BatchDeleteBlocked, got {other:?}"),
        }

        assert!(service.node(NodeKind::Menu, &menu.node.id).await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_applies_items_independently() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let a = create_category(&service, "A", None).await?;
        let b = create_category(&service, "B", None).await?;

        let report = service
            .update_order(
                NodeKind::Category,
                vec![
                    OrderUpdate {
                        id: a.id.clone(),
                        sort_order: 10,
                    },
                    OrderUpdate {
                        id: "bogus".to_string(),
                        sort_order: 5,
                    },
                    OrderUpdate {
                        id: b.id.clone(),
                        sort_order: 0,
                    },
                ],
            )
            .await?;

        assert_eq!(report.applied, 2);
        assert!(!report.all_applied());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "bogus");

        // The two applied weights took effect
        let roots = service.list_children(NodeKind::Category, None).await?;
        let ids: Vec<&str> = roots.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);

        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_is_kind_scoped_per_item() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let a = create_category(&service, "A", None).await?;
        let menu = service
            .create(
                NodeKind::Menu,
                CreateNodeRequest::new("Home")
                    .with_slug("home")
                    .with_properties(json!({"url": "/"})),
            )
            .await?;

        let report = service
            .update_order(
                NodeKind::Category,
                vec![
                    OrderUpdate {
                        id: menu.node.id.clone(),
                        sort_order: 1,
                    },
                    OrderUpdate {
                        id: a.id.clone(),
                        sort_order: 7,
                    },
                ],
            )
            .await?;

        assert_eq!(report.applied, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, menu.node.id);

        // The foreign-kind node was not touched
        let menu_now = service.node(NodeKind::Menu, &menu.node.id).await?;
        assert_eq!(menu_now.sort_order, 0);
        assert_eq!(menu_now.version, 1);

        let a_now = service.node(NodeKind::Category, &a.id).await?;
        assert_eq!(a_now.sort_order, 7);

        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_empty_input() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let report = service.update_order(NodeKind::Category, vec![]).await?;
        assert_eq!(report.applied, 0);
        assert!(report.all_applied());

        Ok(())
    }
}
