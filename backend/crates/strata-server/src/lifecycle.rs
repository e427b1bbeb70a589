//! Server lifecycle
//!
//! Brings up the consensus layer and the schema handler, then coordinates
//! graceful shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use strata_commons::config::ServerConfig;
use strata_raft::{start_rpc_server, RaftExecutor, RaftManager};
use strata_schema::{authorizer, DefaultValidator, Handler, MemberDirectory};

/// Running node
pub struct Components {
    pub manager: Arc<RaftManager>,
    pub handler: Arc<Handler>,
    rpc: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl Components {
    /// Stop the RPC server, then the Raft group
    pub async fn shutdown(self) -> anyhow::Result<()> {
        if let Some((stop, task)) = self.rpc {
            let _ = stop.send(());
            if let Err(e) = task.await {
                warn!("RPC server task ended abnormally: {}", e);
            }
        }
        self.manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to shutdown Raft: {}", e))
    }
}

/// Start consensus and build the handler.
///
/// Cluster mode (peers configured or `bootstrap = true`) serves the Raft RPC
/// transport and initializes the group only on the bootstrap node; other
/// nodes wait to be joined. Otherwise a single-node group is initialized
/// and nothing is exposed to peers.
pub async fn bootstrap(config: &ServerConfig) -> anyhow::Result<Components> {
    let phase_start = Instant::now();
    let manager = Arc::new(RaftManager::new(config.into()));

    manager
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start Raft: {}", e))?;

    let rpc = if config.is_cluster_mode() {
        let cluster = &config.cluster;
        debug!(
            "Cluster: {} | Node: {} | Peers: {}",
            cluster.cluster_id,
            config.node.name,
            cluster.peers.len()
        );
        debug!(
            "Heartbeat: {}ms | Election timeout: {:?}ms",
            cluster.heartbeat_interval_ms, cluster.election_timeout_ms
        );

        let (stop, stopped) = oneshot::channel::<()>();
        let task = start_rpc_server(manager.clone(), &cluster.rpc_addr, async move {
            let _ = stopped.await;
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start RPC server: {}", e))?;

        if cluster.bootstrap {
            info!("Node {} is bootstrap node - initializing cluster", config.node.name);
            manager
                .initialize_cluster()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cluster: {}", e))?;
        } else {
            info!("Node {} waiting to be joined by the leader", config.node.name);
        }
        Some((stop, task))
    } else {
        debug!("Single-node mode");
        manager
            .initialize_cluster()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize single-node Raft: {}", e))?;
        wait_for_leader(&manager, leader_deadline(config)).await;
        None
    };

    let handler = Arc::new(Handler::new(
        Arc::new(RaftExecutor::new(manager.clone())),
        authorizer::from_settings(&config.authorization),
        Arc::new(DefaultValidator),
        Arc::new(MemberDirectory::from_config(config)),
        config.schema.clone(),
    ));

    info!(
        "✓ Node {} ready ({:.2}ms)",
        config.node.name,
        phase_start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(Components {
        manager,
        handler,
        rpc,
    })
}

/// Serve until Ctrl+C, then shut down
pub async fn run(components: Components) -> anyhow::Result<()> {
    for (key, value) in components.handler.stats() {
        debug!("  {}: {}", key, value);
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown...");

    components.shutdown().await?;
    info!("Server shutdown complete");
    Ok(())
}

fn leader_deadline(config: &ServerConfig) -> Duration {
    Duration::from_millis(config.cluster.election_timeout_ms.1 * 10)
}

async fn wait_for_leader(manager: &RaftManager, deadline: Duration) {
    let started = Instant::now();
    while manager.current_leader().is_none() {
        if started.elapsed() >= deadline {
            warn!("No leader elected after {:?}", deadline);
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::models::Class;

    #[tokio::test]
    async fn test_standalone_bootstrap_serves_schema() {
        let mut config = ServerConfig::default();
        config.cluster.heartbeat_interval_ms = 50;
        config.cluster.election_timeout_ms = (150, 300);
        config.finalize().unwrap();
        assert!(!config.is_cluster_mode());

        let components = bootstrap(&config).await.unwrap();
        assert!(components.manager.is_leader());

        components
            .handler
            .add_class(None, Class::new("Article"))
            .await
            .unwrap();
        let schema = components.handler.read_only_schema().await.unwrap();
        assert!(schema.class("Article").is_some());

        components.shutdown().await.unwrap();
    }
}
