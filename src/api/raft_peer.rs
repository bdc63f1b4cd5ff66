use crate::actor::{ActorClient, KillSwitch};
use crate::api::RpcHandle;
use crate::replica::{EntryId, RaftState, ReplicaExited, StartError};
use bytes::Bytes;

/// RaftPeer is the host's handle to one raft peer.
///
/// Committed commands arrive on the apply queue given at creation, in log order. A command passed
/// to [RaftPeer::start] is not guaranteed to commit: a leader change can overwrite it, in which
/// case a different command shows up at its index.
pub struct RaftPeer {
    actor_client: ActorClient,
    kill_switch: KillSwitch,
}

impl RaftPeer {
    pub(crate) fn new(actor_client: ActorClient, kill_switch: KillSwitch) -> Self {
        RaftPeer {
            actor_client,
            kill_switch,
        }
    }

    /// Proposes `command` for the replicated log. Only the leader accepts. Returns where the
    /// command will live if it commits; returns immediately, without waiting for the commit.
    pub async fn start(&self, command: Bytes) -> Result<EntryId, StartError> {
        if self.kill_switch.is_killed() {
            return Err(StartError::ReplicaExited);
        }

        self.actor_client.start(command).await
    }

    pub async fn get_state(&self) -> Result<RaftState, ReplicaExited> {
        if self.kill_switch.is_killed() {
            return Err(ReplicaExited);
        }

        self.actor_client.get_state().await
    }

    /// Stops the peer. Idempotent. Background tasks wind down on their own shortly after; the
    /// peer's persisted state is left as is, so a new peer can be created from the same store.
    pub fn kill(&self) {
        self.kill_switch.kill();
        self.actor_client.try_shutdown();
    }

    pub fn is_killed(&self) -> bool {
        self.kill_switch.is_killed()
    }

    /// Handle for transports to deliver incoming RPCs to this peer.
    pub fn rpc_handle(&self) -> RpcHandle {
        RpcHandle::new(self.actor_client.weak())
    }
}

impl Drop for RaftPeer {
    fn drop(&mut self) {
        self.kill();
    }
}
