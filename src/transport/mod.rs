mod api;
mod grpc_client;
mod grpc_codec;
mod local;

pub use api::PeerClient;
pub use api::TransportError;
pub use grpc_client::GrpcPeerClient;
pub use local::LocalNetwork;

pub(crate) use grpc_codec::append_entries_input;
pub(crate) use grpc_codec::request_vote_input;
