use crate::transport::PeerClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// ReplicaId names one member of the cluster. It must be unique within the cluster.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ReplicaId(String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        ReplicaId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PeerEndpoint is how the host tells us to reach another cluster member.
#[derive(Clone)]
pub struct PeerEndpoint {
    pub replica_id: ReplicaId,
    pub client: Arc<dyn PeerClient>,
}

/// ClusterTracker holds the static cluster membership from this replica's point of view.
pub(crate) struct ClusterTracker {
    my_replica_id: ReplicaId,
    peers: HashMap<ReplicaId, PeerEndpoint>,
}

impl ClusterTracker {
    pub(crate) fn new(my_replica_id: ReplicaId, peers: Vec<PeerEndpoint>) -> Self {
        let peers = peers
            .into_iter()
            .map(|peer| (peer.replica_id.clone(), peer))
            .collect();

        ClusterTracker { my_replica_id, peers }
    }

    pub(crate) fn my_replica_id(&self) -> &ReplicaId {
        &self.my_replica_id
    }

    pub(crate) fn peer(&self, peer_id: &ReplicaId) -> Option<&PeerEndpoint> {
        self.peers.get(peer_id)
    }

    pub(crate) fn iter_peers(&self) -> impl Iterator<Item = &PeerEndpoint> {
        self.peers.values()
    }

    /// Includes me.
    pub(crate) fn num_voting_replicas(&self) -> usize {
        self.peers.len() + 1
    }

    /// Strict majority of all voting replicas, counting me.
    pub(crate) fn majority(&self) -> usize {
        (self.num_voting_replicas() / 2) + 1
    }
}
