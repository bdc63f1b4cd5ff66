mod actor;
mod api;
mod replica;
mod server;
mod storage;
mod transport;
mod grpc {
    include!("../generated/raft.rs");
}

pub use api::create_raft_peer;
pub use api::RaftOptions;
pub use api::RaftPeer;
pub use api::RaftPeerConfig;
pub use api::RaftPeerCreationError;
pub use api::RpcHandle;
pub use replica::AppendEntriesInput;
pub use replica::AppendEntriesOutput;
pub use replica::AppendEntriesRejection;
pub use replica::ApplyMsg;
pub use replica::EntryId;
pub use replica::Index;
pub use replica::LogEntry;
pub use replica::PeerEndpoint;
pub use replica::RaftState;
pub use replica::ReplicaExited;
pub use replica::ReplicaId;
pub use replica::RequestVoteInput;
pub use replica::RequestVoteOutput;
pub use replica::StartError;
pub use replica::Term;
pub use server::shutdown_signal;
pub use server::RpcServer;
pub use server::RpcServerShutdownHandle;
pub use server::RpcServerShutdownSignal;
pub use storage::FileStore;
pub use storage::InMemoryStore;
pub use storage::PersistentState;
pub use storage::PersistentStore;
pub use storage::StorageError;
pub use transport::GrpcPeerClient;
pub use transport::LocalNetwork;
pub use transport::PeerClient;
pub use transport::TransportError;
