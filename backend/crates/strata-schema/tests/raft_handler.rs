//! Handler over a single-node Raft group
//!
//! Same request path as production: records go through openraft, are applied
//! by the meta state machine and read back linearizably.

use std::sync::Arc;
use std::time::Duration;

use strata_commons::config::SchemaSettings;
use strata_commons::models::{Class, Property, Tenant};
use strata_raft::{RaftExecutor, RaftManager, RaftManagerConfig};
use strata_schema::{AllowAll, DefaultValidator, Handler, MemberDirectory, SchemaError};

async fn single_node() -> (Arc<RaftManager>, Handler) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut config = RaftManagerConfig::for_single_node("node1", "127.0.0.1:0");
    config.heartbeat_interval_ms = 50;
    config.election_timeout_ms = (150, 300);
    let manager = Arc::new(RaftManager::new(config));
    manager.start().await.unwrap();
    manager.initialize_cluster().await.unwrap();

    for _ in 0..100 {
        if manager.is_leader() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(manager.is_leader(), "single node never became leader");

    let handler = Handler::new(
        Arc::new(RaftExecutor::new(manager.clone())),
        Arc::new(AllowAll),
        Arc::new(DefaultValidator),
        Arc::new(MemberDirectory::new("node1", "127.0.0.1:8080")),
        SchemaSettings::default(),
    );
    (manager, handler)
}

#[tokio::test]
async fn test_committed_write_is_visible_to_next_read() {
    let (manager, handler) = single_node().await;

    let article = Class::new("Article").with_property(Property::new("tags", vec!["text"]));
    let version = handler.add_class(None, article).await.unwrap();
    let info = handler.class_info("Article").await.unwrap();
    assert!(info.exists);
    assert_eq!(info.class_version, version);

    handler
        .update_property_add_data_type(None, "Article", "tags", "text[]")
        .await
        .unwrap();
    let class = handler.read_only_class("Article").await.unwrap().unwrap();
    assert_eq!(class.property("tags").unwrap().data_type, vec!["text", "text[]"]);

    let duplicate = handler.add_class(None, Class::new("article")).await;
    assert!(matches!(duplicate, Err(SchemaError::AlreadyExists(_))));

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shard_count_never_shrinks() {
    let (manager, handler) = single_node().await;

    handler
        .add_class(None, Class::new("Shop").with_multi_tenancy(true))
        .await
        .unwrap();
    let mut counts = vec![];
    for batch in [vec!["a", "b"], vec!["b", "c"], vec!["c"]] {
        let tenants = batch.into_iter().map(Tenant::new).collect();
        handler.add_tenants(None, "Shop", tenants).await.unwrap();
        counts.push(handler.class_info("Shop").await.unwrap().tenants);
    }
    assert_eq!(counts, vec![2, 3, 3]);

    let stats = handler.stats();
    assert_eq!(stats["state"], "leader");
    assert_eq!(stats["tenants"], "3");
    assert_eq!(stats["cluster_mode"], "true");

    manager.shutdown().await.unwrap();
}
