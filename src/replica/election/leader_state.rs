use crate::replica::replication::ReplicationTaskHandle;
use crate::replica::{Index, ReplicaId};
use std::collections::HashMap;

pub(crate) struct LeaderStateTracker {
    peer_state: HashMap<ReplicaId, PeerState>,
}

impl LeaderStateTracker {
    pub(super) fn new(peer_state: HashMap<ReplicaId, PeerState>) -> Self {
        LeaderStateTracker { peer_state }
    }

    pub(crate) fn peer_state_mut(&mut self, peer_id: &ReplicaId) -> Option<&mut PeerState> {
        self.peer_state.get_mut(peer_id)
    }

    pub(crate) fn peers_iter(&self) -> impl Iterator<Item = (&ReplicaId, &PeerState)> {
        self.peer_state.iter()
    }
}

pub(crate) struct PeerState {
    // Held to keep this follower's replication task running.
    _replication_task: Option<ReplicationTaskHandle>,

    // > index of the next log entry to send to that server
    // > (initialized to leader last log index + 1)
    next: Index,
    // > index of highest log entry known to be replicated on server
    // > (initialized to 0, increases monotonically)
    matched: Index,

    // SeqNo is a form of a logical clock that tracks a term leader's interactions with a peer. When
    // a replica becomes leader, it initializes last sent/received to 0. Each time leader sends a
    // request, it increments the last sent SeqNo and ensures the response will be associated with
    // that SeqNo. If a leader receives a SeqNo from earlier than a previously received SeqNo, it
    // discards it.
    last_sent_seq_no: u64,
    last_received_seq_no: u64,
}

impl PeerState {
    pub(super) fn new(replication_task: Option<ReplicationTaskHandle>, latest_log_index: Index) -> Self {
        PeerState {
            _replication_task: replication_task,
            next: latest_log_index.plus(1),
            matched: Index::sentinel(),
            last_sent_seq_no: 0,
            last_received_seq_no: 0,
        }
    }

    pub(crate) fn next(&self) -> Index {
        self.next
    }

    pub(crate) fn matched(&self) -> Index {
        self.matched
    }

    pub(crate) fn next_seq_no(&mut self) -> u64 {
        self.last_sent_seq_no += 1;
        self.last_sent_seq_no
    }

    /// Returns true if `received_seq_no` is the newest reply so far, in which case the caller
    /// should act on it.
    pub(crate) fn ratchet_fwd_received_seq_no(&mut self, received_seq_no: u64) -> bool {
        if self.last_received_seq_no < received_seq_no && received_seq_no <= self.last_sent_seq_no {
            self.last_received_seq_no = received_seq_no;
            true
        } else {
            false
        }
    }

    /// Follower accepted `num_entries` entries after `previous_log_index`.
    pub(crate) fn record_success(&mut self, previous_log_index: Index, num_entries: usize) {
        let new_matched = previous_log_index.plus(num_entries as u64);
        if new_matched < self.matched {
            // Older request. Matched only ratchets forward.
            return;
        }

        self.matched = new_matched;
        self.next = new_matched.plus(1);
    }

    /// Follower rejected the entry at `previous_log_index`. Move `next` back to `proposed_next`,
    /// kept within `[matched + 1, previous_log_index]` so that every rejection makes progress
    /// and never goes behind what the follower is known to hold.
    pub(crate) fn rewind_next(&mut self, logger: &slog::Logger, proposed_next: Index, previous_log_index: Index) {
        let floor = self.matched.plus(1);
        let new_next = proposed_next.min(previous_log_index).max(floor);
        if new_next >= self.next {
            slog::warn!(
                logger,
                "Rewind would not move next back (next={:?}, proposed={:?}, matched={:?})",
                self.next,
                proposed_next,
                self.matched
            );
        }

        self.next = new_next;
    }
}

/// Highest index replicated on a majority, given every voting replica's matched index (leader
/// included).
pub(crate) fn cluster_commit_index(mut matched_indexes: Vec<Index>, majority: usize) -> Index {
    assert!(
        majority >= 1 && majority <= matched_indexes.len(),
        "Majority {} out of range for {} replicas",
        majority,
        matched_indexes.len()
    );

    // Descending. The majority-th highest index is held by at least `majority` replicas.
    matched_indexes.sort_unstable_by(|a, b| b.cmp(a));
    matched_indexes[majority - 1]
}
