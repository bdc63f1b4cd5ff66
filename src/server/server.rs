use crate::api::RpcHandle;
use crate::grpc::grpc_raft_server::{GrpcRaft, GrpcRaftServer};
use crate::grpc::{ProtoAppendEntriesReply, ProtoAppendEntriesReq, ProtoRequestVoteReply, ProtoRequestVoteReq};
use crate::replica::ReplicaExited;
use crate::server::RpcServerShutdownSignal;
use crate::transport;
use std::net::SocketAddr;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer is the type that implements the Raft gRPC interface.
pub struct RpcServer {
    logger: slog::Logger,
    local_replica: RpcHandle,
}

impl RpcServer {
    pub fn new(logger: slog::Logger, local_replica: RpcHandle) -> Self {
        RpcServer { logger, local_replica }
    }

    pub async fn run(self, socket_addr: SocketAddr, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcRaftServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_request_vote(&self, rpc_request: ProtoRequestVoteReq) -> Result<ProtoRequestVoteReply, Status> {
        let app_input = transport::request_vote_input(rpc_request)?;
        let app_output = self
            .local_replica
            .request_vote(app_input)
            .await
            .map_err(replica_exited)?;

        Ok(ProtoRequestVoteReply::from(app_output))
    }

    async fn handle_append_entries(
        &self,
        rpc_request: ProtoAppendEntriesReq,
    ) -> Result<ProtoAppendEntriesReply, Status> {
        let app_input = transport::append_entries_input(rpc_request)?;
        let app_output = self
            .local_replica
            .append_entries(app_input)
            .await
            .map_err(replica_exited)?;

        Ok(ProtoAppendEntriesReply::from(app_output))
    }
}

fn replica_exited(e: ReplicaExited) -> Status {
    Status::unavailable(e.to_string())
}

#[async_trait::async_trait]
impl GrpcRaft for RpcServer {
    async fn request_vote(
        &self,
        rpc_request_wrapped: Request<ProtoRequestVoteReq>,
    ) -> Result<Response<ProtoRequestVoteReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_request_vote(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn append_entries(
        &self,
        rpc_request_wrapped: Request<ProtoAppendEntriesReq>,
    ) -> Result<Response<ProtoAppendEntriesReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        // Entries can be large. Log their count only.
        slog::debug!(
            self.logger,
            "ServerWire - AppendEntries term={} leader={} prev=({}, {}) entries={} commit={}",
            rpc_request.term,
            rpc_request.leader_id,
            rpc_request.prev_log_term,
            rpc_request.prev_log_index,
            rpc_request.entries.len(),
            rpc_request.leader_commit
        );
        let rpc_result = self.handle_append_entries(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}
