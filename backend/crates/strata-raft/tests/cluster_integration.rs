//! Cluster Integration Tests
//!
//! Real openraft instances talking over the gRPC transport on loopback:
//! - single-node bootstrap, propose and linearizable read
//! - two-node cluster with proposals and reads issued on the follower

use std::sync::Arc;
use std::time::Duration;

use strata_commons::models::{Class, NodeId};
use strata_raft::{
    network::start_rpc_server, CommandExecutor, MetaCommand, MetaResponse, RaftExecutor,
    RaftManager, RaftManagerConfig, RejectionKind,
};
use strata_sharding::ShardingState;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("bind ephemeral port")
}

fn add_class(name: &str) -> MetaCommand {
    MetaCommand::AddClass {
        class: Class::new(name),
        state: ShardingState::partitioned(name, 1),
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// A test node in the cluster
struct TestNode {
    name: String,
    manager: Arc<RaftManager>,
    executor: RaftExecutor,
    rpc_addr: String,
    api_addr: String,
}

impl TestNode {
    fn new(name: &str) -> Self {
        let rpc_addr = format!("127.0.0.1:{}", free_port());
        let api_addr = format!("127.0.0.1:{}", free_port());
        let config = RaftManagerConfig {
            node_id: NodeId::new(name),
            rpc_addr: rpc_addr.clone(),
            api_addr: api_addr.clone(),
            peers: vec![],
            heartbeat_interval_ms: 50,
            election_timeout_ms: (150, 300),
            ..Default::default()
        };

        let manager = Arc::new(RaftManager::new(config));
        let executor = RaftExecutor::new(manager.clone());

        Self {
            name: name.to_string(),
            manager,
            executor,
            rpc_addr,
            api_addr,
        }
    }

    async fn start(&self) {
        self.manager.start().await.expect("start raft");
        start_rpc_server(
            self.manager.clone(),
            &self.rpc_addr,
            std::future::pending::<()>(),
        )
        .await
        .expect("start rpc server");
    }
}

#[tokio::test]
async fn test_single_node_propose_and_read() {
    init_logging();
    let node = TestNode::new("node1");
    node.start().await;
    node.manager.initialize_cluster().await.unwrap();
    wait_until("leadership", || node.manager.is_leader()).await;

    let response = node.executor.execute_meta(add_class("Article")).await.unwrap();
    assert!(matches!(response, MetaResponse::Applied { .. }));

    let state = node.executor.linearizable_state().await.unwrap();
    assert!(state.class("Article").is_some());
    assert!(state.member("node1").map(|m| m.voter).unwrap_or(false));

    let duplicate = node.executor.execute_meta(add_class("article")).await.unwrap();
    assert!(matches!(
        duplicate,
        MetaResponse::Rejected {
            kind: RejectionKind::AlreadyExists,
            ..
        }
    ));

    // bootstrapping twice leaves the cluster alone
    node.manager.initialize_cluster().await.unwrap();
    assert!(node.manager.stats().is_leader());

    node.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_follower_forwards_writes_and_reads_linearizably() {
    init_logging();
    let leader = TestNode::new("node1");
    let follower = TestNode::new("node2");
    leader.start().await;
    follower.start().await;

    leader.manager.initialize_cluster().await.unwrap();
    wait_until("leadership", || leader.manager.is_leader()).await;

    leader
        .manager
        .add_node(&follower.name, &follower.rpc_addr, &follower.api_addr, true)
        .await
        .unwrap();

    let leader_id = leader.manager.raft_id();
    wait_until("follower to see the leader", || {
        follower.manager.current_leader() == Some(leader_id)
    })
    .await;

    // Written through the follower, committed by the leader
    let response = follower
        .executor
        .execute_meta(add_class("Widget"))
        .await
        .unwrap();
    let version = response.version().unwrap();
    assert!(follower.executor.local_state().applied_index() >= version);

    let on_leader = leader.executor.linearizable_state().await.unwrap();
    assert!(on_leader.class("Widget").is_some());

    // Written on the leader, read linearizably on the follower
    let gadget = leader
        .executor
        .execute_meta(add_class("Gadget"))
        .await
        .unwrap()
        .version()
        .unwrap();
    // The follower's local projection may still lag this commit, so only
    // the linearizable read is asserted to include it.
    let local = follower.executor.local_state();
    let on_follower = follower.executor.linearizable_state().await.unwrap();
    assert!(on_follower.applied_index() >= gadget);
    assert!(on_follower.applied_index() >= local.applied_index());
    assert!(on_follower.class("Gadget").is_some());

    let members = on_follower.members().filter(|m| m.voter).count();
    assert_eq!(members, 2);
    assert!(!follower.executor.is_leader());
}
