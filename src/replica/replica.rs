use crate::actor::WeakActorClient;
use crate::replica::election::{cluster_commit_index, ElectionConfig, ElectionState, ElectionTimerHandle};
use crate::replica::local_state::{LocalState, Term};
use crate::replica::peers::{ClusterTracker, PeerEndpoint, ReplicaId};
use crate::replica::replica_api::*;
use crate::replica::write_ahead_log::{Index, IndexWatcher, LogEntry, WriteAheadLog};
use crate::storage::{PersistentState, PersistentStore, StorageError};
use bytes::Bytes;
use std::cmp;

// Max entries in a single AppendEntries request. A far-behind follower catches up over several
// round trips.
const MAX_ENTRIES_PER_APPEND: usize = 128;

pub(crate) struct ReplicaConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) election: ElectionConfig,
    pub(crate) peers: Vec<PeerEndpoint>,
    pub(crate) store: Box<dyn PersistentStore>,
    pub(crate) actor_client: WeakActorClient,
}

/// Replica is one member of a raft cluster: its durable state, its log, and its role. It is owned
/// by the replica actor, and every method runs to completion without waiting on anything.
pub(crate) struct Replica {
    logger: slog::Logger,
    cluster: ClusterTracker,
    local_state: LocalState,
    log: WriteAheadLog,
    store: Box<dyn PersistentStore>,
    election_state: ElectionState,
    // Set by accepting a valid AppendEntries. Consumed by each election timer tick.
    heartbeat_seen: bool,
    config: ElectionConfig,
    actor_client: WeakActorClient,
    latest_index_watcher: IndexWatcher,
    _election_timer: ElectionTimerHandle,
}

/// Creates a replica from whatever state `store` holds, and starts its election timer. Returns
/// the watcher of its commit index, for the apply pipeline.
pub(crate) fn create_replica(config: ReplicaConfig) -> Result<(Replica, IndexWatcher), StorageError> {
    let ReplicaConfig {
        logger,
        election: election_config,
        peers,
        store,
        actor_client,
    } = config;

    let my_replica_id = election_config.my_replica_id.clone();
    let persisted = match store.load()? {
        Some(state) => {
            state.validate()?;
            slog::info!(
                logger,
                "Restoring persisted state: term={:?} voted_for={:?} log_length={}",
                state.current_term,
                state.voted_for,
                state.log.len()
            );
            state
        }
        None => PersistentState::default(),
    };

    let local_state = LocalState::new(my_replica_id.clone(), persisted.current_term, persisted.voted_for);
    let (log, watchers) = WriteAheadLog::new(logger.clone(), persisted.log);

    let election_timer = ElectionTimerHandle::spawn_timer_task(
        election_config.election_min_timeout,
        election_config.election_max_timeout,
        actor_client.clone(),
    );
    let election_state = ElectionState::new_follower(logger.clone(), election_config.clone(), actor_client.clone());

    let replica = Replica {
        logger,
        cluster: ClusterTracker::new(my_replica_id, peers),
        local_state,
        log,
        store,
        election_state,
        heartbeat_seen: false,
        config: election_config,
        actor_client,
        latest_index_watcher: watchers.latest_index,
        _election_timer: election_timer,
    };

    Ok((replica, watchers.commit_index))
}

impl Replica {
    pub(crate) fn current_state(&self) -> RaftState {
        RaftState {
            term: self.local_state.current_term(),
            is_leader: self.election_state.is_leader(),
        }
    }

    pub(crate) fn handle_start(&mut self, command: Bytes) -> Result<EntryId, StartError> {
        if !self.election_state.is_leader() {
            return match self.election_state.known_leader() {
                Some(leader) => Err(StartError::LeaderRedirect(leader.clone())),
                None => Err(StartError::NoLeader),
            };
        }

        let term = self.local_state.current_term();
        let index = self.log.append(LogEntry { term, command });
        self.persist();

        slog::debug!(self.logger, "Appended entry {:?} in term {:?}", index, term);
        Ok(EntryId { index, term })
    }

    pub(crate) fn read_committed(&self, after: Index, max: usize) -> Vec<(Index, LogEntry)> {
        self.log.read_committed(after, max)
    }

    pub(crate) fn handle_request_vote(&mut self, input: RequestVoteInput) -> RequestVoteOutput {
        let logger = self.logger.new(slog::o!(
            "Candidate" => input.candidate_id.to_string(),
            "CandidateTerm" => input.candidate_term.as_u64(),
        ));

        if self.cluster.peer(&input.candidate_id).is_none() {
            slog::warn!(logger, "Vote request from a replica outside the cluster");
            return self.vote_reply(false);
        }

        // A candidate from an older term can't win anything. Don't let it spend our vote.
        if input.candidate_term < self.local_state.current_term() {
            return self.vote_reply(false);
        }

        let mut state_changed = false;
        if self.local_state.store_term_if_increased(input.candidate_term) {
            slog::info!(logger, "Adopting newer term from vote request");
            self.election_state.transition_to_follower(None);
            state_changed = true;
        }

        let (current_term, voted_for) = self.local_state.voted_for_current_term();
        let already_voted_for_candidate = match voted_for {
            None => false,
            Some(vote) if *vote == input.candidate_id => true,
            Some(_) => {
                if state_changed {
                    self.persist();
                }
                return self.vote_reply(false);
            }
        };

        let log_ok = is_candidate_log_up_to_date(
            (input.last_log_term, input.last_log_index),
            self.log.latest_entry(),
        );
        let vote_granted = log_ok
            && (already_voted_for_candidate
                || self
                    .local_state
                    .store_vote_for_term_if_unvoted(current_term, input.candidate_id.clone()));
        if vote_granted && !already_voted_for_candidate {
            state_changed = true;
        }

        // Vote and term must be durable before the candidate can count on them.
        if state_changed {
            self.persist();
        }

        slog::info!(logger, "Vote granted: {} (log up to date: {})", vote_granted, log_ok);
        self.vote_reply(vote_granted)
    }

    fn vote_reply(&self, vote_granted: bool) -> RequestVoteOutput {
        RequestVoteOutput {
            term: self.local_state.current_term(),
            vote_granted,
        }
    }

    pub(crate) fn handle_append_entries(&mut self, input: AppendEntriesInput) -> AppendEntriesOutput {
        // 1. Reply false if term < currentTerm (§5.1)
        if input.leader_term < self.local_state.current_term() {
            return AppendEntriesOutput {
                term: self.local_state.current_term(),
                result: Err(AppendEntriesRejection::StaleTerm),
            };
        }

        // 2. Whoever sent this is the leader of a term at least as new as ours.
        let mut state_changed = self.local_state.store_term_if_increased(input.leader_term);
        if self.election_state.is_leader() && !state_changed {
            slog::error!(
                self.logger,
                "Another leader {:?} claims my term {:?}. Stepping down.",
                input.leader_id,
                input.leader_term
            );
        }
        if self.election_state.known_leader() != Some(&input.leader_id) {
            self.election_state.transition_to_follower(Some(input.leader_id.clone()));
        }

        // 3. Valid leader contact.
        self.heartbeat_seen = true;

        // 4. and 5. Consistency check on the previous entry.
        let result = match self.log.term_at(input.previous_log_index) {
            None => Err(AppendEntriesRejection::LogTooShort {
                log_length: self.log.len(),
            }),
            Some(term) if term != input.previous_log_term => Err(AppendEntriesRejection::ConflictingTerm { term }),
            Some(_) => {
                let index_of_last_new_entry = input.previous_log_index.plus(input.entries.len() as u64);

                // 6. and 7. Cut any conflicting suffix, append what's missing.
                state_changed |= self.log.reconcile(input.previous_log_index, input.entries);
                Ok(index_of_last_new_entry)
            }
        };

        if state_changed {
            self.persist();
        }

        // 8. Follow the leader's commit index, but only as far as what it just vouched for.
        if let Ok(index_of_last_new_entry) = result {
            let new_commit_index = cmp::min(input.leader_commit_index, index_of_last_new_entry);
            self.log.ratchet_fwd_commit_index_if_greater(new_commit_index);
        }

        AppendEntriesOutput {
            term: self.local_state.current_term(),
            result: result.map(|_| ()),
        }
    }

    pub(crate) fn handle_election_timer_tick(&mut self) {
        let heartbeat_seen = std::mem::replace(&mut self.heartbeat_seen, false);
        if heartbeat_seen || self.election_state.is_leader() {
            return;
        }

        self.start_election();
    }

    fn start_election(&mut self) {
        let term = self.local_state.increment_term_and_vote_for_self();
        self.election_state.transition_to_candidate_and_vote_for_self();
        self.persist();
        slog::info!(self.logger, "Starting election for term {:?}", term);

        // Single-member cluster. We already have a majority.
        if self.cluster.majority() <= 1 {
            self.become_leader(term);
            return;
        }

        let (last_log_term, last_log_index) = self.log.latest_entry();
        let request = RequestVoteInput {
            candidate_term: term,
            candidate_id: self.cluster.my_replica_id().clone(),
            last_log_index,
            last_log_term,
        };
        let deadline = tokio::time::Instant::now() + self.config.election_ceiling;
        for peer in self.cluster.iter_peers() {
            tokio::spawn(peer_rpc::call_peer_request_vote(
                self.logger.clone(),
                peer.clone(),
                request.clone(),
                deadline,
                self.actor_client.clone(),
            ));
        }
    }

    pub(crate) fn handle_request_vote_reply_from_peer(&mut self, reply: RequestVoteReplyFromPeer) {
        if self.step_down_if_newer_term(reply.output.term) {
            return;
        }

        if reply.election_term != self.local_state.current_term() {
            slog::info!(
                self.logger,
                "Ignoring vote from {:?} for old election {:?}",
                reply.peer_id,
                reply.election_term
            );
            return;
        }
        if !reply.output.vote_granted || !self.election_state.is_candidate() {
            return;
        }

        if let Some(num_votes) = self.election_state.add_vote_if_candidate(reply.peer_id) {
            if num_votes >= self.cluster.majority() {
                self.become_leader(reply.election_term);
            }
        }
    }

    fn become_leader(&mut self, term: Term) {
        slog::info!(self.logger, "Won election for term {:?}", term);
        self.election_state.transition_to_leader(
            term,
            self.cluster.iter_peers(),
            self.log.latest_index(),
            &self.latest_index_watcher,
        );
    }

    pub(crate) fn handle_leader_timer(&mut self, tick: LeaderTimerTick) {
        if tick.term != self.local_state.current_term() || !self.election_state.is_leader() {
            return;
        }

        match tick.kind {
            LeaderTimerKind::Heartbeat => self.broadcast_heartbeat(tick.term),
            LeaderTimerKind::CommitCheck => self.check_commit_index(tick.term),
        }
    }

    fn broadcast_heartbeat(&mut self, term: Term) {
        let mut requests = Vec::new();
        if let Some(leader_state) = self.election_state.leader_state() {
            for (peer_id, peer_state) in leader_state.peers_iter() {
                let previous_log_index = peer_state.next().minus(1);
                let input = self.append_entries_input(term, previous_log_index, Vec::new());
                let descriptor = AppendEntriesReplyFromPeerDescriptor {
                    peer_id: peer_id.clone(),
                    term,
                    kind: AppendEntriesKind::Heartbeat,
                    seq_no: 0,
                    previous_log_index,
                    num_log_entries: 0,
                };
                requests.push((input, descriptor));
            }
        }

        for (input, descriptor) in requests {
            if let Some(peer) = self.cluster.peer(&descriptor.peer_id) {
                tokio::spawn(peer_rpc::call_peer_append_entries(
                    self.logger.clone(),
                    peer.clone(),
                    input,
                    descriptor,
                    self.config.replication.append_entries_timeout,
                    self.actor_client.clone(),
                ));
            }
        }
    }

    fn check_commit_index(&mut self, term: Term) {
        let leader_state = match self.election_state.leader_state() {
            Some(leader_state) => leader_state,
            None => return,
        };

        // The leader's own progress is its log length. It never replicates to itself.
        let mut matched: Vec<Index> = leader_state.peers_iter().map(|(_, ps)| ps.matched()).collect();
        matched.push(self.log.latest_index());

        let new_commit_index = cluster_commit_index(matched, self.cluster.majority());
        self.log.ratchet_fwd_commit_index_if_valid(new_commit_index, term);
    }

    pub(crate) fn next_replication_step(&mut self, peer_id: &ReplicaId, term: Term) -> ReplicationStep {
        if term != self.local_state.current_term() {
            return ReplicationStep::Stop;
        }

        let latest_index = self.log.latest_index();
        let (previous_log_index, seq_no) = match self.election_state.leader_state_mut() {
            None => return ReplicationStep::Stop,
            Some(leader_state) => match leader_state.peer_state_mut(peer_id) {
                None => return ReplicationStep::Stop,
                // Caught up. Only heartbeats until there's something new.
                Some(peer_state) if peer_state.matched() >= latest_index => return ReplicationStep::Idle,
                Some(peer_state) => (peer_state.next().minus(1), peer_state.next_seq_no()),
            },
        };

        // Right after an election `next` is past our log, so this is an empty probe that finds
        // where the follower's log diverges.
        let entries = self.log.entries_from(previous_log_index.plus(1), MAX_ENTRIES_PER_APPEND);
        let descriptor = AppendEntriesReplyFromPeerDescriptor {
            peer_id: peer_id.clone(),
            term,
            kind: AppendEntriesKind::Replication,
            seq_no,
            previous_log_index,
            num_log_entries: entries.len(),
        };
        let input = self.append_entries_input(term, previous_log_index, entries);

        ReplicationStep::Send(input, descriptor)
    }

    fn append_entries_input(&self, term: Term, previous_log_index: Index, entries: Vec<LogEntry>) -> AppendEntriesInput {
        let previous_log_term = self
            .log
            .term_at(previous_log_index)
            .unwrap_or_else(|| panic!("Leader has no entry at {:?} to send as previous", previous_log_index));

        AppendEntriesInput {
            leader_term: term,
            leader_id: self.cluster.my_replica_id().clone(),
            previous_log_index,
            previous_log_term,
            entries,
            leader_commit_index: self.log.commit_index(),
        }
    }

    pub(crate) fn handle_append_entries_reply_from_peer(&mut self, reply: AppendEntriesReplyFromPeer) {
        if self.step_down_if_newer_term(reply.output.term) {
            return;
        }

        let descriptor = reply.descriptor;
        let logger = self.logger.new(slog::o!(
            "Peer" => descriptor.peer_id.to_string(),
            "SeqNo" => descriptor.seq_no,
        ));

        if descriptor.term != self.local_state.current_term() || reply.output.term != descriptor.term {
            slog::info!(logger, "Ignoring stale AppendEntries reply: {:?}", reply.output);
            return;
        }
        // Heartbeats only carry authority. Their replies can only make us step down.
        if descriptor.kind == AppendEntriesKind::Heartbeat {
            return;
        }

        let (_, latest_index) = self.log.latest_entry();
        let leader_state = match self.election_state.leader_state_mut() {
            Some(leader_state) => leader_state,
            None => return,
        };
        let peer_state = match leader_state.peer_state_mut(&descriptor.peer_id) {
            Some(peer_state) => peer_state,
            None => {
                slog::warn!(logger, "AppendEntries reply from unknown peer");
                return;
            }
        };
        if !peer_state.ratchet_fwd_received_seq_no(descriptor.seq_no) {
            slog::warn!(logger, "Dropping out of order reply");
            return;
        }

        match reply.output.result {
            Ok(()) => {
                peer_state.record_success(descriptor.previous_log_index, descriptor.num_log_entries);
                slog::debug!(
                    logger,
                    "Follower matched {:?} of {:?}",
                    peer_state.matched(),
                    latest_index
                );
            }
            Err(AppendEntriesRejection::LogTooShort { log_length }) => {
                peer_state.rewind_next(&logger, Index::new(log_length), descriptor.previous_log_index);
            }
            Err(AppendEntriesRejection::ConflictingTerm { term }) => {
                // Skip the follower's whole conflicting term: resume right after our last entry
                // whose term is no newer than it.
                let lower = peer_state.matched();
                let upper = descriptor.previous_log_index.minus(1);
                let proposed_next = self
                    .log
                    .last_index_with_term_at_most(term, lower, upper)
                    .map(|index| index.plus(1))
                    .unwrap_or(descriptor.previous_log_index);
                peer_state.rewind_next(&logger, proposed_next, descriptor.previous_log_index);
            }
            Err(AppendEntriesRejection::StaleTerm) => {
                slog::warn!(logger, "Follower says our term is stale, but reports the same term");
            }
        }
    }

    /// Returns true if `observed_term` was newer than ours, in which case we adopted it and are
    /// now a follower.
    fn step_down_if_newer_term(&mut self, observed_term: Term) -> bool {
        if !self.local_state.store_term_if_increased(observed_term) {
            return false;
        }

        slog::info!(self.logger, "Observed newer term {:?}. Stepping down.", observed_term);
        self.election_state.transition_to_follower(None);
        self.persist();
        true
    }

    fn persist(&mut self) {
        let (current_term, voted_for) = self.local_state.voted_for_current_term();
        let state = PersistentState {
            current_term,
            voted_for: voted_for.cloned(),
            log: self.log.entries().to_vec(),
        };

        if let Err(e) = self.store.save(&state) {
            // We can't promise anything we haven't made durable, and we can't take back what
            // the in-memory state already reflects. This replica is done.
            slog::crit!(self.logger, "Failed to persist state: {}", e);
            panic!("Failed to persist raft state: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) fn log(&self) -> &WriteAheadLog {
        &self.log
    }

    #[cfg(test)]
    pub(crate) fn is_candidate(&self) -> bool {
        self.election_state.is_candidate()
    }
}

/// > If votedFor is null or candidateId, and candidate’s log is at
/// > least as up-to-date as receiver’s log, grant vote (§5.2, §5.4)
///
/// Arguments are (term, index) of the last log entry.
fn is_candidate_log_up_to_date(candidate: (Term, Index), mine: (Term, Index)) -> bool {
    // Tuples compare term first, then index.
    candidate >= mine
}

mod peer_rpc {
    use crate::actor::WeakActorClient;
    use crate::replica::peers::PeerEndpoint;
    use crate::replica::replica_api::{
        AppendEntriesInput, AppendEntriesReplyFromPeer, AppendEntriesReplyFromPeerDescriptor, RequestVoteInput,
        RequestVoteReplyFromPeer,
    };
    use tokio::time::{Duration, Instant};

    /// One vote request, no retries. Gives up at `deadline`, the end of the election attempt.
    pub(super) async fn call_peer_request_vote(
        logger: slog::Logger,
        peer: PeerEndpoint,
        input: RequestVoteInput,
        deadline: Instant,
        actor_client: WeakActorClient,
    ) {
        let election_term = input.candidate_term;
        let call = peer.client.request_vote(input);
        match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(output)) => {
                let reply = RequestVoteReplyFromPeer {
                    peer_id: peer.replica_id,
                    election_term,
                    output,
                };
                let _ = actor_client.request_vote_reply_from_peer(reply).await;
            }
            Ok(Err(e)) => {
                slog::debug!(logger, "RequestVote to {:?} failed: {}", peer.replica_id, e);
            }
            Err(_) => {
                slog::debug!(logger, "RequestVote to {:?} timed out", peer.replica_id);
            }
        }
    }

    pub(super) async fn call_peer_append_entries(
        logger: slog::Logger,
        peer: PeerEndpoint,
        input: AppendEntriesInput,
        descriptor: AppendEntriesReplyFromPeerDescriptor,
        timeout: Duration,
        actor_client: WeakActorClient,
    ) {
        let call = peer.client.append_entries(input);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(output)) => {
                let reply = AppendEntriesReplyFromPeer { descriptor, output };
                let _ = actor_client.append_entries_reply_from_peer(reply).await;
            }
            Ok(Err(e)) => {
                slog::debug!(logger, "Heartbeat to {:?} failed: {}", peer.replica_id, e);
            }
            Err(_) => {
                slog::debug!(logger, "Heartbeat to {:?} timed out", peer.replica_id);
            }
        }
    }
}
