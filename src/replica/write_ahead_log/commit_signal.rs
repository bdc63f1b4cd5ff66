use crate::replica::write_ahead_log::log_entry::Index;
use tokio::sync::watch;

/// IndexPublisher announces the latest value of an index that only moves forward, such as the
/// commit index. Watchers may skip intermediate values; they only ever see the latest.
pub(super) struct IndexPublisher {
    sender: watch::Sender<Index>,
}

/// IndexWatcher is the receiving half of an [IndexPublisher].
#[derive(Clone)]
pub(crate) struct IndexWatcher {
    receiver: watch::Receiver<Index>,
}

pub(super) fn new(initial: Index) -> (IndexPublisher, IndexWatcher) {
    let (tx, rx) = watch::channel(initial);

    (IndexPublisher { sender: tx }, IndexWatcher { receiver: rx })
}

impl IndexPublisher {
    pub(super) fn publish(&self, index: Index) {
        // No watchers is fine. Nobody is waiting on this index right now.
        let _ = self.sender.send(index);
    }
}

impl IndexWatcher {
    #[cfg(test)]
    pub(crate) fn latest(&self) -> Index {
        *self.receiver.borrow()
    }

    /// Wait until the published index is strictly greater than `after`. Returns None once the
    /// publisher has dropped, i.e. the replica is gone.
    pub(crate) async fn wait_past(&mut self, after: Index) -> Option<Index> {
        loop {
            let latest = *self.receiver.borrow();
            if latest > after {
                return Some(latest);
            }

            if self.receiver.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Resolves once the publisher has dropped.
    pub(crate) async fn closed(&mut self) {
        while self.receiver.changed().await.is_ok() {}
    }

    /// Wait for any new publish. Returns false if the publisher has dropped.
    pub(crate) async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
