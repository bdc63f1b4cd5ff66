use crate::actor::{ActorClient, KillSwitch, ReplicaActor};
use crate::api::options::RaftOptionsValidated;
use crate::api::{RaftOptions, RaftPeer};
use crate::replica;
use crate::replica::{ApplyMsg, ApplyPipeline, ElectionConfig, PeerEndpoint, ReplicaId, ReplicationConfig};
use crate::storage::{PersistentStore, StorageError};
use std::collections::HashSet;
use std::convert::TryFrom;
use tokio::sync::mpsc;

const ACTOR_QUEUE_SIZE: usize = 128;

pub struct RaftPeerConfig {
    pub logger: slog::Logger,
    pub my_replica_id: ReplicaId,
    /// Every other member of the cluster. The cluster's size is `peers.len() + 1`.
    pub peers: Vec<PeerEndpoint>,
    pub store: Box<dyn PersistentStore>,
    /// Committed commands are delivered here. When the host falls behind, delivery waits.
    pub apply_queue: mpsc::Sender<ApplyMsg>,
    pub options: RaftOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum RaftPeerCreationError {
    #[error("Invalid cluster info: {0}")]
    InvalidClusterInfo(String),
    #[error("Illegal options for configuring peer: {0}")]
    IllegalOptions(String),
    #[error("Failed to restore persisted state")]
    Storage(#[from] StorageError),
}

/// Creates a raft peer and starts its background tasks. Must be called within a tokio runtime.
/// Returns as soon as the peer is running; it starts out as a follower of nobody.
pub fn create_raft_peer(config: RaftPeerConfig) -> Result<RaftPeer, RaftPeerCreationError> {
    validate_cluster(&config.my_replica_id, &config.peers)?;
    let options = RaftOptionsValidated::try_from(config.options)
        .map_err(|e| RaftPeerCreationError::IllegalOptions(e.to_string()))?;

    let logger = config
        .logger
        .new(slog::o!("Replica" => config.my_replica_id.to_string()));

    let (actor_client, actor_queue_rx) = ActorClient::new(ACTOR_QUEUE_SIZE);
    let kill_switch = KillSwitch::default();

    let election_config = ElectionConfig {
        my_replica_id: config.my_replica_id,
        leader_heartbeat_duration: options.leader_heartbeat_duration,
        leader_commit_check_interval: options.leader_commit_check_interval,
        election_min_timeout: options.election_min_timeout,
        election_max_timeout: options.election_max_timeout,
        election_ceiling: options.election_ceiling,
        replication: ReplicationConfig {
            append_entries_timeout: options.leader_append_entries_timeout,
            retry_delay: options.replication_retry_delay,
            idle_poll: options.replication_idle_poll,
        },
    };
    let (replica, commit_index) = replica::create_replica(replica::ReplicaConfig {
        logger: logger.clone(),
        election: election_config,
        peers: config.peers,
        store: config.store,
        actor_client: actor_client.weak(),
    })?;

    ApplyPipeline::spawn(
        logger.new(slog::o!("Task" => "Apply")),
        commit_index,
        actor_client.weak(),
        config.apply_queue,
    );

    let replica_actor = ReplicaActor::new(logger.clone(), actor_queue_rx, replica, kill_switch.clone());
    tokio::spawn(replica_actor.run_event_loop());

    slog::info!(logger, "Raft peer created");
    Ok(RaftPeer::new(actor_client, kill_switch))
}

fn validate_cluster(my_replica_id: &ReplicaId, peers: &[PeerEndpoint]) -> Result<(), RaftPeerCreationError> {
    if my_replica_id.as_str().is_empty() {
        return Err(RaftPeerCreationError::InvalidClusterInfo("Empty replica id".into()));
    }

    let mut seen = HashSet::new();
    for peer in peers {
        if peer.replica_id.as_str().is_empty() {
            return Err(RaftPeerCreationError::InvalidClusterInfo("Empty peer replica id".into()));
        }
        if peer.replica_id == *my_replica_id {
            return Err(RaftPeerCreationError::InvalidClusterInfo(format!(
                "My replica id {} is listed among peers",
                my_replica_id
            )));
        }
        if !seen.insert(&peer.replica_id) {
            return Err(RaftPeerCreationError::InvalidClusterInfo(format!(
                "Duplicate peer {}",
                peer.replica_id
            )));
        }
    }

    Ok(())
}
