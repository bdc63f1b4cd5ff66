use crate::replica::local_state::Term;
use crate::replica::peers::ReplicaId;
use crate::replica::write_ahead_log::{Index, LogEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct RequestVoteInput {
    pub candidate_term: Term,
    pub candidate_id: ReplicaId,
    pub last_log_index: Index,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestVoteOutput {
    /// Voter's term, after adopting the candidate's term if it was newer.
    pub term: Term,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendEntriesInput {
    pub leader_term: Term,
    pub leader_id: ReplicaId,
    // "Previous log entry" is the log entry immediately preceding the new ones.
    pub previous_log_index: Index,
    pub previous_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit_index: Index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendEntriesOutput {
    /// Follower's term, after adopting the leader's term if it was newer.
    pub term: Term,
    pub result: Result<(), AppendEntriesRejection>,
}

/// Why a follower rejected AppendEntries. The hints let the leader repair a follower's log in a
/// few round trips instead of one per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendEntriesRejection {
    /// Leader's term is behind the follower's.
    StaleTerm,
    /// Follower has no entry at the previous index. `log_length` includes the sentinel, so it is
    /// also the next index the follower can accept.
    LogTooShort { log_length: u64 },
    /// Follower's entry at the previous index has this term instead of the leader's.
    ConflictingTerm { term: Term },
}

/// EntryId is where a `start()`ed command will live if it ever commits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryId {
    pub index: Index,
    pub term: Term,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StartError {
    #[error("I'm not leader, {0} is")]
    LeaderRedirect(ReplicaId),

    // Can be retried with backoff of a few hundred ms. Likely an election is in progress.
    #[error("Cluster is in a tough shape. No one is leader.")]
    NoLeader,

    #[error("Replica actor is dead RIP")]
    ReplicaExited,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Replica actor is dead RIP")]
pub struct ReplicaExited;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RaftState {
    pub term: Term,
    pub is_leader: bool,
}

#[derive(Debug)]
pub(crate) struct RequestVoteReplyFromPeer {
    pub(crate) peer_id: ReplicaId,
    // Term of the election the request was sent for.
    pub(crate) election_term: Term,
    pub(crate) output: RequestVoteOutput,
}

#[derive(Debug)]
pub(crate) struct AppendEntriesReplyFromPeer {
    pub(crate) descriptor: AppendEntriesReplyFromPeerDescriptor,
    pub(crate) output: AppendEntriesOutput,
}

// This is basically info about the original request
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppendEntriesReplyFromPeerDescriptor {
    pub(crate) peer_id: ReplicaId,
    pub(crate) term: Term,
    pub(crate) kind: AppendEntriesKind,
    pub(crate) seq_no: u64,
    pub(crate) previous_log_index: Index,
    pub(crate) num_log_entries: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum AppendEntriesKind {
    Replication,
    Heartbeat,
}

/// What a follower's replication task should do next.
#[derive(Debug)]
pub(crate) enum ReplicationStep {
    Send(AppendEntriesInput, AppendEntriesReplyFromPeerDescriptor),
    /// Follower is caught up. Wait for new entries.
    Idle,
    /// No longer leader for the requested term.
    Stop,
}

/// LeaderTimerTick contains info for a single tick of one of the leader's periodic timers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LeaderTimerTick {
    pub(crate) term: Term,
    pub(crate) kind: LeaderTimerKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum LeaderTimerKind {
    Heartbeat,
    CommitCheck,
}
