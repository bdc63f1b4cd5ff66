use crate::replica::{AppendEntriesInput, AppendEntriesOutput, ReplicaId, RequestVoteInput, RequestVoteOutput};

/// PeerClient is the outbound half of the transport: how this replica calls one other cluster
/// member. Implementations need not bound latency; callers always wrap calls in a timeout.
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync + 'static {
    async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, TransportError>;

    async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, TransportError>;
}

/// TransportError is the "no reply" outcome of a call. None of these say anything about the
/// peer's log or term, so callers treat them all as retryable.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Peer {0} is unreachable")]
    Unreachable(ReplicaId),
    #[error("Message to or from peer {0} was lost")]
    Dropped(ReplicaId),
    #[error("Peer's replica has exited")]
    PeerExited,
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("Malformed reply: {0}")]
    MalformedReply(String),
}
