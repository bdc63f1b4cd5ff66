mod apply_pipeline;
mod election;
mod local_state;
mod peers;
mod replica;
mod replica_api;
mod replication;
mod stop_signal;
mod write_ahead_log;

pub use apply_pipeline::ApplyMsg;
pub use local_state::Term;
pub use peers::PeerEndpoint;
pub use peers::ReplicaId;
pub use replica_api::AppendEntriesInput;
pub use replica_api::AppendEntriesOutput;
pub use replica_api::AppendEntriesRejection;
pub use replica_api::EntryId;
pub use replica_api::RaftState;
pub use replica_api::ReplicaExited;
pub use replica_api::RequestVoteInput;
pub use replica_api::RequestVoteOutput;
pub use replica_api::StartError;
pub use write_ahead_log::Index;
pub use write_ahead_log::LogEntry;

pub(crate) use apply_pipeline::ApplyPipeline;
pub(crate) use election::ElectionConfig;
pub(crate) use replica::create_replica;
pub(crate) use replica::Replica;
pub(crate) use replica::ReplicaConfig;
pub(crate) use replica_api::AppendEntriesReplyFromPeer;
pub(crate) use replica_api::LeaderTimerKind;
pub(crate) use replica_api::LeaderTimerTick;
pub(crate) use replica_api::ReplicationStep;
pub(crate) use replica_api::RequestVoteReplyFromPeer;
pub(crate) use replication::ReplicationConfig;
