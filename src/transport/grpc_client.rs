use crate::grpc::grpc_raft_client::GrpcRaftClient;
use crate::grpc::{ProtoAppendEntriesReq, ProtoRequestVoteReq};
use crate::replica::{AppendEntriesInput, AppendEntriesOutput, ReplicaId, RequestVoteInput, RequestVoteOutput};
use crate::transport::api::{PeerClient, TransportError};
use crate::transport::grpc_codec;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// GrpcPeerClient calls a peer's `GrpcRaft` service. It connects on first use, so peers can be
/// created before the rest of the cluster is listening, and reconnects after a failed call.
pub struct GrpcPeerClient {
    logger: slog::Logger,
    peer_id: ReplicaId,
    url: String,
    connect_timeout: Duration,
    connection: Mutex<Option<GrpcRaftClient<Channel>>>,
}

impl GrpcPeerClient {
    pub fn new(logger: slog::Logger, peer_id: ReplicaId, socket_addr: SocketAddr) -> Self {
        let logger = logger.new(slog::o!("Peer" => peer_id.to_string()));
        GrpcPeerClient {
            logger,
            peer_id,
            url: format!("http://{}", socket_addr),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connection: Mutex::new(None),
        }
    }

    /// Should stay below the AppendEntries timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    async fn client(&self) -> Result<GrpcRaftClient<Channel>, TransportError> {
        if let Some(client) = self.connection.lock().await.as_ref() {
            return Ok(client.clone());
        }

        // The lock is not held while connecting. Concurrent callers may each connect once.
        slog::debug!(self.logger, "Connecting to {}", self.url);
        let endpoint = Endpoint::from_shared(self.url.clone()).map_err(|e| TransportError::Connect(e.to_string()))?;
        let channel = match tokio::time::timeout(self.connect_timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(_)) | Err(_) => return Err(TransportError::Unreachable(self.peer_id.clone())),
        };

        let mut connection = self.connection.lock().await;
        Ok(connection.get_or_insert(GrpcRaftClient::new(channel)).clone())
    }

    async fn forget_connection(&self) {
        self.connection.lock().await.take();
    }
}

#[async_trait::async_trait]
impl PeerClient for GrpcPeerClient {
    async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, TransportError> {
        let mut client = self.client().await?;
        let rpc_request = ProtoRequestVoteReq::from(input);

        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        match client.request_vote(rpc_request).await {
            Ok(rpc_reply) => {
                let rpc_reply = rpc_reply.into_inner();
                slog::debug!(self.logger, "ClientWire - {:?}", rpc_reply);
                Ok(RequestVoteOutput::from(rpc_reply))
            }
            Err(status) => {
                self.forget_connection().await;
                Err(status.into())
            }
        }
    }

    async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, TransportError> {
        let mut client = self.client().await?;
        let rpc_request = ProtoAppendEntriesReq::from(input);

        slog::debug!(self.logger, "ClientWire - AppendEntries with {} entries", rpc_request.entries.len());
        match client.append_entries(rpc_request).await {
            Ok(rpc_reply) => {
                let rpc_reply = rpc_reply.into_inner();
                slog::debug!(self.logger, "ClientWire - {:?}", rpc_reply);
                grpc_codec::append_entries_output(rpc_reply).map_err(TransportError::MalformedReply)
            }
            Err(status) => {
                self.forget_connection().await;
                Err(status.into())
            }
        }
    }
}
