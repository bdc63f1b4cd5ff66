use crate::actor::WeakActorClient;
use crate::replica::{AppendEntriesInput, AppendEntriesOutput, ReplicaExited, RequestVoteInput, RequestVoteOutput};

/// RpcHandle is how a transport delivers incoming raft RPCs to a peer. It does not keep the peer
/// alive: once the peer is killed or dropped, every call returns [ReplicaExited].
#[derive(Clone)]
pub struct RpcHandle {
    actor_client: WeakActorClient,
}

impl RpcHandle {
    pub(crate) fn new(actor_client: WeakActorClient) -> Self {
        RpcHandle { actor_client }
    }

    pub async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, ReplicaExited> {
        self.actor_client.request_vote(input).await
    }

    pub async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, ReplicaExited> {
        self.actor_client.append_entries(input).await
    }
}
