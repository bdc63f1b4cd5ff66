use crate::actor::WeakActorClient;
use crate::replica::write_ahead_log::IndexWatcher;
use crate::replica::{stop_signal, AppendEntriesReplyFromPeer, PeerEndpoint, ReplicationStep, Term};
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct ReplicationConfig {
    pub(crate) append_entries_timeout: Duration,
    pub(crate) retry_delay: Duration,
    pub(crate) idle_poll: Duration,
}

/// ReplicationTaskHandle keeps one follower's replication task alive for one leader term.
pub(crate) struct ReplicationTaskHandle {
    _to_drop: stop_signal::Stopper,
}

/// ReplicationTask pushes the leader's log to one follower. The actor decides what to send; this
/// task only does the waiting. One request is in flight at a time.
struct ReplicationTask {
    logger: slog::Logger,
    config: ReplicationConfig,
    peer: PeerEndpoint,
    term: Term,
    latest_index: IndexWatcher,
    actor_client: WeakActorClient,
    stop_check: stop_signal::StopCheck,
}

impl ReplicationTaskHandle {
    pub(crate) fn spawn_replication_task(
        logger: &slog::Logger,
        config: ReplicationConfig,
        peer: PeerEndpoint,
        term: Term,
        latest_index: IndexWatcher,
        actor_client: WeakActorClient,
    ) -> Self {
        let (stopper, stop_check) = stop_signal::new();
        let logger = logger.new(slog::o!(
            "Peer" => peer.replica_id.to_string(),
            "Term" => term.as_u64(),
        ));

        let task = ReplicationTask {
            logger,
            config,
            peer,
            term,
            latest_index,
            actor_client,
            stop_check,
        };
        tokio::task::spawn(task.run());

        ReplicationTaskHandle { _to_drop: stopper }
    }
}

impl ReplicationTask {
    async fn run(mut self) {
        slog::debug!(self.logger, "Replication task started");
        loop {
            if self.stop_check.should_stop() {
                break;
            }

            let step = match self
                .actor_client
                .next_replication_step(self.peer.replica_id.clone(), self.term)
                .await
            {
                Ok(step) => step,
                Err(_) => break,
            };

            match step {
                ReplicationStep::Stop => break,
                ReplicationStep::Idle => {
                    // Wake on a new entry, or after the poll interval to re-check in case the
                    // follower fell behind some other way.
                    match tokio::time::timeout(self.config.idle_poll, self.latest_index.changed()).await {
                        Ok(false) => break,
                        Ok(true) | Err(_) => {}
                    }
                }
                ReplicationStep::Send(input, descriptor) => {
                    let call = self.peer.client.append_entries(input);
                    match tokio::time::timeout(self.config.append_entries_timeout, call).await {
                        Ok(Ok(output)) => {
                            let reply = AppendEntriesReplyFromPeer { descriptor, output };
                            if self.actor_client.append_entries_reply_from_peer(reply).await.is_err() {
                                break;
                            }
                        }
                        Ok(Err(e)) => {
                            slog::debug!(self.logger, "AppendEntries failed, will retry: {}", e);
                            tokio::time::sleep(self.config.retry_delay).await;
                        }
                        Err(_) => {
                            // A timeout says nothing about the follower's log. The next request
                            // starts from the same index.
                            slog::debug!(self.logger, "AppendEntries timed out, will retry");
                            tokio::time::sleep(self.config.retry_delay).await;
                        }
                    }
                }
            }
        }
        slog::debug!(self.logger, "Replication task exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorClient, Event};
    use crate::replica::replica_api::{AppendEntriesKind, AppendEntriesReplyFromPeerDescriptor};
    use crate::replica::write_ahead_log::WriteAheadLog;
    use crate::replica::{AppendEntriesInput, AppendEntriesOutput, Index, ReplicaId, RequestVoteInput, RequestVoteOutput};
    use crate::transport::{PeerClient, TransportError};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Accepts every AppendEntries and never answers it.
    #[derive(Default)]
    struct StalledPeer {
        previous_indexes: Mutex<Vec<Index>>,
    }

    #[async_trait::async_trait]
    impl PeerClient for StalledPeer {
        async fn request_vote(&self, _: RequestVoteInput) -> Result<RequestVoteOutput, TransportError> {
            Err(TransportError::PeerExited)
        }

        async fn append_entries(&self, input: AppendEntriesInput) -> Result<AppendEntriesOutput, TransportError> {
            self.previous_indexes.lock().unwrap().push(input.previous_log_index);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(TransportError::PeerExited)
        }
    }

    fn send_step(term: Term, next: Index, seq_no: u64) -> ReplicationStep {
        let previous_log_index = Index::new(next.as_u64() - 1);
        let input = AppendEntriesInput {
            leader_term: term,
            leader_id: ReplicaId::new("leader"),
            previous_log_index,
            previous_log_term: term,
            entries: vec![],
            leader_commit_index: Index::new(0),
        };
        let descriptor = AppendEntriesReplyFromPeerDescriptor {
            peer_id: ReplicaId::new("follower"),
            term,
            kind: AppendEntriesKind::Replication,
            seq_no,
            previous_log_index,
            num_log_entries: 0,
        };

        ReplicationStep::Send(input, descriptor)
    }

    async fn recv_event(actor_rx: &mut mpsc::Receiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(1), actor_rx.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Expected event")
    }

    #[tokio::test]
    async fn timed_out_call_is_retried_from_the_same_index() {
        let term = Term::new(3);
        let peer_client = Arc::new(StalledPeer::default());
        let peer = PeerEndpoint {
            replica_id: ReplicaId::new("follower"),
            client: peer_client.clone(),
        };
        let (_log, watchers) = WriteAheadLog::new(slog::Logger::root(slog::Discard, slog::o!()), vec![]);
        let (actor_client, mut actor_rx) = ActorClient::new(10);
        let config = ReplicationConfig {
            append_entries_timeout: Duration::from_millis(30),
            retry_delay: Duration::from_millis(10),
            idle_poll: Duration::from_millis(100),
        };

        let _handle = ReplicationTaskHandle::spawn_replication_task(
            &slog::Logger::root(slog::Discard, slog::o!()),
            config,
            peer,
            term,
            watchers.latest_index,
            actor_client.weak(),
        );

        // Stand-in for the actor. The follower's next index only moves on a reply.
        let next = Index::new(4);
        for seq_no in 1..=2 {
            match recv_event(&mut actor_rx).await {
                Event::NextReplicationStep(peer_id, step_term, callback) => {
                    assert_eq!(peer_id, ReplicaId::new("follower"));
                    assert_eq!(step_term, term);
                    callback.send(send_step(term, next, seq_no));
                }
                event => panic!("Expected a request for the next step, got {:?}", event),
            }
        }

        // Timing out again produced no reply, only another request for a step.
        match recv_event(&mut actor_rx).await {
            Event::NextReplicationStep(_, _, callback) => callback.send(ReplicationStep::Stop),
            event => panic!("Expected a request for the next step, got {:?}", event),
        }

        assert_eq!(
            *peer_client.previous_indexes.lock().unwrap(),
            vec![Index::new(3), Index::new(3)]
        );

        // Stopped. Nothing else arrives.
        if let Ok(event) = tokio::time::timeout(Duration::from_millis(100), actor_rx.recv()).await {
            panic!("Expected no event, got {:?}", event);
        }
    }
}
