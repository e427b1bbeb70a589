//! Raft gRPC Service
//!
//! A single unary method carries every intra-cluster RPC. The request names
//! the RPC kind and carries a bincode payload; failures come back in-band so
//! the caller can rebuild a typed [`RaftError`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use crate::manager::RaftManager;
use crate::network::RpcType;
use crate::RaftError;

/// Raft RPC request message
#[derive(Clone, PartialEq, prost::Message)]
pub struct RaftRpcRequest {
    /// RPC kind, see [`RpcType`]
    #[prost(string, tag = "1")]
    pub rpc_type: String,

    /// Serialized RPC payload
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

/// Raft RPC response message
#[derive(Clone, PartialEq, prost::Message)]
pub struct RaftRpcResponse {
    /// Serialized response payload
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,

    /// Error message if any
    #[prost(string, tag = "2")]
    pub error: String,

    /// Machine-readable error class, empty on success
    #[prost(string, tag = "3")]
    pub error_kind: String,

    /// Leader known to the responder, set with `not_leader`
    #[prost(uint64, optional, tag = "4")]
    pub leader_hint: Option<u64>,
}

impl RaftRpcResponse {
    fn ok(payload: Vec<u8>) -> Self {
        Self {
            payload,
            error: String::new(),
            error_kind: String::new(),
            leader_hint: None,
        }
    }

    fn from_error(err: &RaftError) -> Self {
        let kind = match err {
            RaftError::NotLeader { .. } => "not_leader",
            RaftError::Timeout(_) => "timeout",
            RaftError::Shutdown => "shutdown",
            RaftError::NotStarted(_) => "not_started",
            RaftError::Membership(_) => "membership",
            RaftError::InvalidState(_) => "invalid_state",
            _ => "internal",
        };
        Self {
            payload: Vec::new(),
            error: err.to_string(),
            error_kind: kind.to_string(),
            leader_hint: err.leader_hint(),
        }
    }

    /// Rebuild the responder's error. `timeout` is reported for remote
    /// timeouts since the remote deadline is not carried on the wire.
    fn into_error(self, timeout: Duration) -> RaftError {
        match self.error_kind.as_str() {
            "not_leader" => RaftError::NotLeader {
                leader: self.leader_hint,
            },
            "timeout" => RaftError::Timeout(timeout),
            "shutdown" => RaftError::Shutdown,
            "not_started" => RaftError::NotStarted(self.error),
            "membership" => RaftError::Membership(self.error),
            "invalid_state" => RaftError::InvalidState(self.error),
            _ => RaftError::Proposal(self.error),
        }
    }
}

/// Send one RPC to a peer and unwrap its in-band result
pub async fn call_remote(
    channel: Channel,
    rpc_type: RpcType,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>, RaftError> {
    let mut client = raft_client::RaftClient::new(channel);
    let request = tonic::Request::new(RaftRpcRequest {
        rpc_type: rpc_type.to_string(),
        payload,
    });

    let response = tokio::time::timeout(timeout, client.raft_rpc(request))
        .await
        .map_err(|_| RaftError::Timeout(timeout))?
        .map_err(|status| RaftError::Network(format!("{} RPC failed: {}", rpc_type, status)))?;

    let inner = response.into_inner();
    if !inner.error.is_empty() {
        return Err(inner.into_error(timeout));
    }
    Ok(inner.payload)
}

/// Generated gRPC client module
pub mod raft_client {
    use super::*;
    use tonic::codegen::*;

    /// Raft RPC client
    #[derive(Debug, Clone)]
    pub struct RaftClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl RaftClient<tonic::transport::Channel> {
        /// Create a new client from a channel
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> RaftClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError> + std::fmt::Debug,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Send a Raft RPC
        pub async fn raft_rpc(
            &mut self,
            request: impl tonic::IntoRequest<RaftRpcRequest>,
        ) -> std::result::Result<tonic::Response<RaftRpcResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unavailable,
                    format!("Service not ready: {:?}", e),
                )
            })?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/strata.raft.Raft/RaftRpc");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("strata.raft.Raft", "RaftRpc"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Generated gRPC server module
pub mod raft_server {
    use super::*;
    use tonic::codegen::*;

    /// Raft service trait
    #[async_trait::async_trait]
    pub trait Raft: std::marker::Send + std::marker::Sync + 'static {
        /// Handle a Raft RPC
        async fn raft_rpc(
            &self,
            request: tonic::Request<RaftRpcRequest>,
        ) -> std::result::Result<tonic::Response<RaftRpcResponse>, tonic::Status>;
    }

    /// Raft service server
    #[derive(Debug)]
    pub struct RaftServer<T: Raft> {
        inner: Arc<T>,
    }

    impl<T: Raft> Clone for RaftServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }

    impl<T: Raft> RaftServer<T> {
        pub fn new(inner: T) -> Self {
            Self {
                inner: Arc::new(inner),
            }
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T: Raft> tonic::server::NamedService for RaftServer<T> {
        const NAME: &'static str = "strata.raft.Raft";
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for RaftServer<T>
    where
        T: Raft,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();

            match req.uri().path() {
                "/strata.raft.Raft/RaftRpc" => {
                    let fut = async move {
                        let mut grpc =
                            tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        let method = RaftRpcSvc(inner);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    // grpc-status 12: UNIMPLEMENTED
                    let mut response = http::Response::new(tonic::body::empty_body());
                    let headers = response.headers_mut();
                    headers.insert("grpc-status", http::HeaderValue::from_static("12"));
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }

    struct RaftRpcSvc<T: Raft>(Arc<T>);

    impl<T: Raft> tonic::server::UnaryService<RaftRpcRequest> for RaftRpcSvc<T> {
        type Response = RaftRpcResponse;
        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<RaftRpcRequest>) -> Self::Future {
            let inner = self.0.clone();
            let fut = async move { inner.raft_rpc(request).await };
            Box::pin(fut)
        }
    }
}

/// Raft gRPC service implementation
pub struct RaftService {
    manager: Arc<RaftManager>,
}

impl RaftService {
    pub fn new(manager: Arc<RaftManager>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl raft_server::Raft for RaftService {
    async fn raft_rpc(
        &self,
        request: Request<RaftRpcRequest>,
    ) -> Result<Response<RaftRpcResponse>, Status> {
        let req = request.into_inner();

        let rpc_type = req
            .rpc_type
            .parse::<RpcType>()
            .map_err(Status::invalid_argument)?;

        let result = match rpc_type {
            RpcType::Vote => self.manager.handle_vote(&req.payload).await,
            RpcType::AppendEntries => self.manager.handle_append_entries(&req.payload).await,
            RpcType::InstallSnapshot => self.manager.handle_install_snapshot(&req.payload).await,
            RpcType::ClientWrite => self.manager.handle_client_write(&req.payload).await,
            RpcType::ReadIndex => self.manager.handle_read_index().await,
            RpcType::AddNode => self.manager.handle_add_node(&req.payload).await,
            RpcType::RemoveNode => self.manager.handle_remove_node(&req.payload).await,
        };

        match result {
            Ok(payload) => Ok(Response::new(RaftRpcResponse::ok(payload))),
            Err(e) => {
                log::debug!("{} RPC failed: {}", rpc_type, e);
                Ok(Response::new(RaftRpcResponse::from_error(&e)))
            }
        }
    }
}

/// Bind the RPC listener and serve until `shutdown` resolves.
///
/// Binding happens before this returns, so an unusable address is reported
/// to the caller rather than from inside the server task.
pub async fn start_rpc_server<F>(
    manager: Arc<RaftManager>,
    listen_addr: &str,
    shutdown: F,
) -> Result<tokio::task::JoinHandle<()>, RaftError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| RaftError::Config(format!("Invalid rpc_addr '{}': {}", listen_addr, e)))?;

    let incoming = tonic::transport::server::TcpIncoming::new(addr, true, None)
        .map_err(|e| RaftError::Network(format!("Failed to bind {}: {}", addr, e)))?;

    let service = raft_server::RaftServer::new(RaftService::new(manager));
    log::info!("Raft RPC server listening on {}", addr);

    Ok(tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(incoming, shutdown)
            .await;
        match result {
            Ok(()) => log::info!("Raft RPC server on {} stopped", addr),
            Err(e) => log::error!("Raft RPC server on {} failed: {}", addr, e),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_leader_survives_the_wire() {
        let response = RaftRpcResponse::from_error(&RaftError::not_leader(Some(42)));
        assert_eq!(response.error_kind, "not_leader");

        let err = response.into_error(Duration::from_secs(1));
        assert_eq!(err.leader_hint(), Some(42));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_remote_timeout_maps_to_timeout() {
        let response = RaftRpcResponse::from_error(&RaftError::Timeout(Duration::from_secs(9)));
        let err = response.into_error(Duration::from_secs(2));
        assert!(matches!(err, RaftError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[test]
    fn test_unknown_error_kind_is_a_proposal_error() {
        let response = RaftRpcResponse::from_error(&RaftError::Internal("boom".into()));
        assert!(matches!(
            response.into_error(Duration::from_secs(1)),
            RaftError::Proposal(msg) if msg.contains("boom")
        ));
    }
}
