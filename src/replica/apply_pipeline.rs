use crate::actor::WeakActorClient;
use crate::replica::write_ahead_log::IndexWatcher;
use crate::replica::{Index, Term};
use bytes::Bytes;
use tokio::sync::mpsc;

// Max entries read from the replica per round trip.
const APPLY_BATCH_SIZE: usize = 64;

/// ApplyMsg is what the host receives on its apply queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyMsg {
    /// A committed command. Delivered exactly once per index, in index order, starting at 1.
    Command { index: Index, term: Term, command: Bytes },
    /// Reserved for log compaction. Never sent today.
    Snapshot { data: Bytes, term: Term, index: Index },
}

/// ApplyPipeline delivers committed entries to the host. It owns `last_applied`: nothing else
/// reads or writes it, so delivery order is just this task's loop order.
pub(crate) struct ApplyPipeline {
    logger: slog::Logger,
    commit_index: IndexWatcher,
    replica_gone: IndexWatcher,
    actor_client: WeakActorClient,
    apply_queue: mpsc::Sender<ApplyMsg>,
    last_applied: Index,
}

impl ApplyPipeline {
    pub(crate) fn spawn(
        logger: slog::Logger,
        commit_index: IndexWatcher,
        actor_client: WeakActorClient,
        apply_queue: mpsc::Sender<ApplyMsg>,
    ) {
        let pipeline = ApplyPipeline {
            logger,
            replica_gone: commit_index.clone(),
            commit_index,
            actor_client,
            apply_queue,
            last_applied: Index::sentinel(),
        };
        tokio::task::spawn(pipeline.run());
    }

    async fn run(mut self) {
        while let Some(commit_index) = self.commit_index.wait_past(self.last_applied).await {
            // The commit index may move again while we apply. The outer loop picks that up.
            while self.last_applied < commit_index {
                if !self.apply_next_batch().await {
                    slog::debug!(self.logger, "Apply pipeline exited at {:?}", self.last_applied);
                    return;
                }
            }
        }
        slog::debug!(self.logger, "Apply pipeline exited at {:?}", self.last_applied);
    }

    /// Returns false when the pipeline should stop.
    async fn apply_next_batch(&mut self) -> bool {
        let entries = match self.actor_client.read_committed(self.last_applied, APPLY_BATCH_SIZE).await {
            Ok(entries) => entries,
            Err(_) => return false,
        };

        // Published commit index never runs ahead of the log's own.
        assert!(!entries.is_empty(), "No committed entries past {:?}", self.last_applied);

        for (index, entry) in entries {
            assert_eq!(
                index,
                self.last_applied.plus(1),
                "Apply pipeline would skip or repeat an index"
            );

            let msg = ApplyMsg::Command {
                index,
                term: entry.term,
                command: entry.command,
            };

            // A slow host blocks us here. Once the replica is gone, stop waiting.
            tokio::select! {
                biased;
                _ = self.replica_gone.closed() => return false,
                sent = self.apply_queue.send(msg) => {
                    if sent.is_err() {
                        slog::warn!(self.logger, "Host dropped the apply queue");
                        return false;
                    }
                }
            }
            self.last_applied = index;
        }

        true
    }
}
