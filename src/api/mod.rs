//! This mod is meant to hold most of the code for the library's host-facing API.
mod options;
mod raft_peer;
mod rpc_handle;
mod wiring;

pub use options::RaftOptions;
pub use raft_peer::RaftPeer;
pub use rpc_handle::RpcHandle;
pub use wiring::create_raft_peer;
pub use wiring::RaftPeerConfig;
pub use wiring::RaftPeerCreationError;
