use crate::actor::WeakActorClient;
use crate::replica::election::timers::LeaderTimerHandle;
use crate::replica::election::{LeaderStateTracker, PeerState};
use crate::replica::replication::{ReplicationConfig, ReplicationTaskHandle};
use crate::replica::write_ahead_log::IndexWatcher;
use crate::replica::{Index, LeaderTimerKind, PeerEndpoint, ReplicaId, Term};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct ElectionConfig {
    pub(crate) my_replica_id: ReplicaId,
    pub(crate) leader_heartbeat_duration: Duration,
    pub(crate) leader_commit_check_interval: Duration,
    pub(crate) election_min_timeout: Duration,
    pub(crate) election_max_timeout: Duration,
    pub(crate) election_ceiling: Duration,
    pub(crate) replication: ReplicationConfig,
}

/// ElectionState is responsible for holding state specific to the stage in an election. Its
/// methods are responsible for "what" to do. It is NOT responsible for validating anything
/// specific to logs, terms, peers, etc. or knowing "when" to do something.
pub(crate) struct ElectionState {
    logger: slog::Logger,
    state: State,
    config: ElectionConfig,
    actor_client: WeakActorClient,
}

impl ElectionState {
    /// `new_follower()` creates a new ElectionState instance that starts out as a follower.
    pub(crate) fn new_follower(logger: slog::Logger, config: ElectionConfig, actor_client: WeakActorClient) -> Self {
        ElectionState {
            logger,
            state: State::Follower(FollowerState { leader: None }),
            config,
            actor_client,
        }
    }

    pub(crate) fn transition_to_follower(&mut self, new_leader: Option<ReplicaId>) {
        if !matches!(self.state, State::Follower(_)) {
            slog::info!(self.logger, "{:?} -> Follower(Leader={:?})", self, new_leader);
        }
        self.state = State::Follower(FollowerState { leader: new_leader });
    }

    pub(crate) fn transition_to_candidate_and_vote_for_self(&mut self) {
        let mut cs = CandidateState {
            received_votes_from: HashSet::with_capacity(3),
        };

        // Vote for self
        cs.add_received_vote(self.config.my_replica_id.clone());

        slog::info!(self.logger, "{:?} -> Candidate", self);
        self.state = State::Candidate(cs);
    }

    pub(crate) fn transition_to_leader<'a>(
        &mut self,
        term: Term,
        peers: impl Iterator<Item = &'a PeerEndpoint>,
        latest_log_index: Index,
        latest_index_watcher: &IndexWatcher,
    ) {
        slog::info!(self.logger, "{:?} -> Leader", self);
        self.state = State::Leader(LeaderState::new(
            &self.logger,
            &self.config,
            term,
            peers,
            latest_log_index,
            latest_index_watcher,
            self.actor_client.clone(),
        ));
    }

    pub(crate) fn is_leader(&self) -> bool {
        matches!(self.state, State::Leader(_))
    }

    pub(crate) fn is_candidate(&self) -> bool {
        matches!(self.state, State::Candidate(_))
    }

    /// Known leader, if we are a follower that has heard from one this term.
    pub(crate) fn known_leader(&self) -> Option<&ReplicaId> {
        match &self.state {
            State::Follower(FollowerState { leader }) => leader.as_ref(),
            _ => None,
        }
    }

    /// Return number of votes received if candidate, or None if no longer Candidate.
    pub(crate) fn add_vote_if_candidate(&mut self, vote_from: ReplicaId) -> Option<usize> {
        if let State::Candidate(cs) = &mut self.state {
            Some(cs.add_received_vote(vote_from))
        } else {
            None
        }
    }

    pub(crate) fn leader_state(&self) -> Option<&LeaderStateTracker> {
        if let State::Leader(ls) = &self.state {
            Some(&ls.tracker)
        } else {
            None
        }
    }

    pub(crate) fn leader_state_mut(&mut self) -> Option<&mut LeaderStateTracker> {
        if let State::Leader(ls) = &mut self.state {
            Some(&mut ls.tracker)
        } else {
            None
        }
    }
}

impl fmt::Debug for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Leader(_) => write!(f, "Leader"),
            State::Candidate(_) => write!(f, "Candidate"),
            State::Follower(FollowerState { leader: Some(leader) }) => write!(f, "Follower(Leader={:?})", leader),
            State::Follower(FollowerState { leader: None }) => write!(f, "Follower(Leader=None)"),
        }
    }
}

enum State {
    Leader(LeaderState),
    Candidate(CandidateState),
    Follower(FollowerState),
}

struct LeaderState {
    tracker: LeaderStateTracker,
    _heartbeat_timer: LeaderTimerHandle,
    _commit_check_timer: LeaderTimerHandle,
}

struct CandidateState {
    received_votes_from: HashSet<ReplicaId>,
}

struct FollowerState {
    leader: Option<ReplicaId>,
}

impl LeaderState {
    fn new<'a>(
        logger: &slog::Logger,
        config: &ElectionConfig,
        term: Term,
        peers: impl Iterator<Item = &'a PeerEndpoint>,
        latest_log_index: Index,
        latest_index_watcher: &IndexWatcher,
        actor_client: WeakActorClient,
    ) -> Self {
        let mut peer_state = HashMap::new();
        for peer in peers {
            let replication_task = ReplicationTaskHandle::spawn_replication_task(
                logger,
                config.replication.clone(),
                peer.clone(),
                term,
                latest_index_watcher.clone(),
                actor_client.clone(),
            );
            peer_state.insert(
                peer.replica_id.clone(),
                PeerState::new(Some(replication_task), latest_log_index),
            );
        }

        let heartbeat_timer = LeaderTimerHandle::spawn_timer_task(
            config.leader_heartbeat_duration,
            actor_client.clone(),
            term,
            LeaderTimerKind::Heartbeat,
        );
        let commit_check_timer = LeaderTimerHandle::spawn_timer_task(
            config.leader_commit_check_interval,
            actor_client,
            term,
            LeaderTimerKind::CommitCheck,
        );

        LeaderState {
            tracker: LeaderStateTracker::new(peer_state),
            _heartbeat_timer: heartbeat_timer,
            _commit_check_timer: commit_check_timer,
        }
    }
}

impl CandidateState {
    /// `add_received_vote()` returns the number of unique votes we've received after adding the
    /// provided `vote_from`
    fn add_received_vote(&mut self, vote_from: ReplicaId) -> usize {
        self.received_votes_from.insert(vote_from);
        self.received_votes_from.len()
    }
}
