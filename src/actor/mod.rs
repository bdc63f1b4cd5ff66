use crate::replica;
use crate::replica::{
    AppendEntriesInput, AppendEntriesOutput, EntryId, Index, LogEntry, RaftState, ReplicaExited, ReplicaId,
    RequestVoteInput, RequestVoteOutput, StartError, Term,
};
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

// Every mutation of replica state happens inside `ReplicaActor::handle_event()`, one event at a
// time. Anything that waits (network calls, timers, the host's apply queue) runs on its own task
// and talks to the actor through these events.
#[derive(Debug)]
pub(crate) enum Event {
    // Leader: Append to log and persist. Replication tasks pick it up.
    // Candidate: Reject request.
    // Follower: Redirect.
    Start(Bytes, Callback<Result<EntryId, StartError>>),

    GetState(Callback<RaftState>),

    // Leader: Grant vote if applicable (includes persist). Transition to follower if newer term.
    // Candidate: Grant vote if applicable (includes persist). Transition to follower if newer term.
    // Follower: Grant vote if applicable (includes persist).
    RequestVote(RequestVoteInput, Callback<RequestVoteOutput>),

    // Leader: discard, unless newer term
    // Candidate: Count vote. Transition to leader if quorum vote.
    // Follower: discard, unless newer term
    RequestVoteReplyFromPeer(replica::RequestVoteReplyFromPeer),

    // Leader: Transition to follower if equal or newer term. Reconcile log. Respond to request.
    // Candidate: Transition to follower. Reconcile log. Respond to request.
    // Follower: Reconcile log and persist, then respond. Mark leader contact.
    AppendEntries(AppendEntriesInput, Callback<AppendEntriesOutput>),

    // Leader: Update the follower's replication progress.
    // Candidate: discard, unless newer term
    // Follower: discard, unless newer term
    AppendEntriesReplyFromPeer(replica::AppendEntriesReplyFromPeer),

    // Leader: Build the next AppendEntries for a follower's replication task.
    // Candidate: Stop the task.
    // Follower: Stop the task.
    NextReplicationStep(ReplicaId, Term, Callback<replica::ReplicationStep>),

    // Read committed entries for the apply pipeline. Any role.
    ReadCommitted(Index, usize, Callback<Vec<(Index, LogEntry)>>),

    // Leader: Reset contact flag only.
    // Candidate: Start a new election if no leader contact since last tick.
    // Follower: Start a new election if no leader contact since last tick.
    ElectionTimerTick,

    // Leader: Broadcast heartbeat or check commit index.
    // Candidate: NOT POSSIBLE - discard
    // Follower: NOT POSSIBLE - discard
    LeaderTimer(replica::LeaderTimerTick),

    Shutdown,
}

pub(crate) struct Callback<O: Debug>(oneshot::Sender<O>);

impl<O: Debug> Callback<O> {
    pub(crate) fn send(self, message: O) {
        // Caller may have given up waiting.
        let _ = self.0.send(message);
    }
}

impl<O: Debug> Debug for Callback<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback")
    }
}

#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: mpsc::Sender<Event>,
}

/// WeakActorClient is what the replica's own background tasks hold, so that they never keep the
/// replica alive by themselves.
#[derive(Clone)]
pub(crate) struct WeakActorClient {
    sender: mpsc::WeakSender<Event>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (ActorClient { sender: tx }, rx)
    }

    pub(crate) fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: self.sender.downgrade(),
        }
    }

    pub(crate) async fn start(&self, command: Bytes) -> Result<EntryId, StartError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Start(command, Callback(tx)))
            .await
            .map_err(|_| StartError::ReplicaExited)?;

        rx.await.unwrap_or(Err(StartError::ReplicaExited))
    }

    pub(crate) async fn get_state(&self) -> Result<RaftState, ReplicaExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::GetState(Callback(tx))).await?;

        rx.await.map_err(|_| ReplicaExited)
    }

    pub(crate) async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, ReplicaExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::RequestVote(input, Callback(tx))).await?;

        rx.await.map_err(|_| ReplicaExited)
    }

    pub(crate) async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, ReplicaExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::AppendEntries(input, Callback(tx))).await?;

        rx.await.map_err(|_| ReplicaExited)
    }

    /// Non-blocking. If the queue is full, the actor still sees the kill flag on its next event.
    pub(crate) fn try_shutdown(&self) {
        let _ = self.sender.try_send(Event::Shutdown);
    }

    async fn send(&self, event: Event) -> Result<(), ReplicaExited> {
        self.sender.send(event).await.map_err(|_| ReplicaExited)
    }
}

impl WeakActorClient {
    pub(crate) fn upgrade(&self) -> Option<ActorClient> {
        self.sender.upgrade().map(|sender| ActorClient { sender })
    }

    pub(crate) async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, ReplicaExited> {
        self.upgrade().ok_or(ReplicaExited)?.request_vote(input).await
    }

    pub(crate) async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, ReplicaExited> {
        self.upgrade().ok_or(ReplicaExited)?.append_entries(input).await
    }

    pub(crate) async fn request_vote_reply_from_peer(
        &self,
        reply: replica::RequestVoteReplyFromPeer,
    ) -> Result<(), ReplicaExited> {
        self.send(Event::RequestVoteReplyFromPeer(reply)).await
    }

    pub(crate) async fn append_entries_reply_from_peer(
        &self,
        reply: replica::AppendEntriesReplyFromPeer,
    ) -> Result<(), ReplicaExited> {
        self.send(Event::AppendEntriesReplyFromPeer(reply)).await
    }

    pub(crate) async fn next_replication_step(
        &self,
        peer_id: ReplicaId,
        term: Term,
    ) -> Result<replica::ReplicationStep, ReplicaExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::NextReplicationStep(peer_id, term, Callback(tx))).await?;

        rx.await.map_err(|_| ReplicaExited)
    }

    pub(crate) async fn read_committed(&self, after: Index, max: usize) -> Result<Vec<(Index, LogEntry)>, ReplicaExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::ReadCommitted(after, max, Callback(tx))).await?;

        rx.await.map_err(|_| ReplicaExited)
    }

    pub(crate) async fn election_timer_tick(&self) -> Result<(), ReplicaExited> {
        self.send(Event::ElectionTimerTick).await
    }

    pub(crate) async fn leader_timer(&self, tick: replica::LeaderTimerTick) -> Result<(), ReplicaExited> {
        self.send(Event::LeaderTimer(tick)).await
    }

    async fn send(&self, event: Event) -> Result<(), ReplicaExited> {
        let sender = self.sender.upgrade().ok_or(ReplicaExited)?;
        sender.send(event).await.map_err(|_| ReplicaExited)
    }
}

/// KillSwitch is the replica's liveness flag. It only ever goes from alive to killed.
#[derive(Clone, Default)]
pub(crate) struct KillSwitch {
    killed: Arc<AtomicBool>,
}

impl KillSwitch {
    pub(crate) fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub(crate) fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }
}

/// ReplicaActor is replica logic in actor model.
pub(crate) struct ReplicaActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    replica: replica::Replica,
    kill_switch: KillSwitch,
}

impl ReplicaActor {
    pub(crate) fn new(
        logger: slog::Logger,
        receiver: mpsc::Receiver<Event>,
        replica: replica::Replica,
        kill_switch: KillSwitch,
    ) -> Self {
        ReplicaActor {
            logger,
            receiver,
            replica,
            kill_switch,
        }
    }

    pub(crate) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if self.kill_switch.is_killed() {
                break;
            }
            if let Event::Shutdown = event {
                break;
            }

            self.handle_event(event);
        }

        // Dropping the replica drops every leader task handle and the log's publishers, which
        // stops all background tasks.
        slog::info!(self.logger, "Replica event loop exited");
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and/or come as a callback to this actor.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(command, callback) => {
                let result = self.replica.handle_start(command);
                callback.send(result);
            }
            Event::GetState(callback) => {
                callback.send(self.replica.current_state());
            }
            Event::RequestVote(input, callback) => {
                let result = self.replica.handle_request_vote(input);
                callback.send(result);
            }
            Event::RequestVoteReplyFromPeer(reply) => {
                self.replica.handle_request_vote_reply_from_peer(reply);
            }
            Event::AppendEntries(input, callback) => {
                let result = self.replica.handle_append_entries(input);
                callback.send(result);
            }
            Event::AppendEntriesReplyFromPeer(reply) => {
                self.replica.handle_append_entries_reply_from_peer(reply);
            }
            Event::NextReplicationStep(peer_id, term, callback) => {
                let step = self.replica.next_replication_step(&peer_id, term);
                callback.send(step);
            }
            Event::ReadCommitted(after, max, callback) => {
                callback.send(self.replica.read_committed(after, max));
            }
            Event::ElectionTimerTick => {
                self.replica.handle_election_timer_tick();
            }
            Event::LeaderTimer(tick) => {
                self.replica.handle_leader_timer(tick);
            }
            Event::Shutdown => {}
        }
    }
}
