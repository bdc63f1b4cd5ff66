use crate::replica::local_state::Term;
use crate::replica::write_ahead_log::commit_signal::{self, IndexPublisher, IndexWatcher};
use crate::replica::write_ahead_log::log_entry::{Index, LogEntry};

/// WriteAheadLog is the raft log plus the commit index that guards it.
///
/// Note: A log entry has 3 states (not modeled directly in code):
/// 1. Persisted - written to local durable state, not yet replicated to majority
/// 2. Committed - written to local durable state, replicated to majority
/// 3. Applied - a committed entry that has also been delivered to the host
///
/// A log entry's state has no global truth. Each replica will have their own local view of what
/// state the log entry is in. Applying is tracked by the apply pipeline, not here.
///
/// The entry at index 0 is a sentinel with term 0 that is never replicated or applied. It makes
/// "previous entry" checks uniform for index 1.
pub(crate) struct WriteAheadLog {
    // Application's info/debug log.
    logger: slog::Logger,

    // Never empty. entries[0] is the sentinel.
    entries: Vec<LogEntry>,

    // Index of highest log entry known to be committed. Sentinel if nothing is committed.
    commit_index: Index,
    commit_publisher: IndexPublisher,
    // Published on every change to the tail of the log, so replication loops can wake up.
    latest_index_publisher: IndexPublisher,
}

/// Watchers handed out at construction, for tasks that react to the log without access to it.
pub(crate) struct LogWatchers {
    pub(crate) commit_index: IndexWatcher,
    pub(crate) latest_index: IndexWatcher,
}

impl WriteAheadLog {
    /// `entries` is the durable log, including the sentinel. Callers validate it before it gets
    /// here.
    pub(crate) fn new(logger: slog::Logger, mut entries: Vec<LogEntry>) -> (Self, LogWatchers) {
        if entries.is_empty() {
            entries.push(LogEntry::sentinel());
        }
        let latest_index = Index::from(entries.len() - 1);

        let (commit_publisher, commit_watcher) = commit_signal::new(Index::sentinel());
        let (latest_index_publisher, latest_index_watcher) = commit_signal::new(latest_index);

        let log = WriteAheadLog {
            logger,
            entries,
            commit_index: Index::sentinel(),
            commit_publisher,
            latest_index_publisher,
        };
        let watchers = LogWatchers {
            commit_index: commit_watcher,
            latest_index: latest_index_watcher,
        };

        (log, watchers)
    }

    /// Term and index of the last entry. The sentinel for an empty log.
    pub(crate) fn latest_entry(&self) -> (Term, Index) {
        let index = self.entries.len() - 1;
        (self.entries[index].term, Index::from(index))
    }

    pub(crate) fn latest_index(&self) -> Index {
        self.latest_entry().1
    }

    /// Number of entries including the sentinel, i.e. latest index + 1.
    pub(crate) fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub(crate) fn term_at(&self, index: Index) -> Option<Term> {
        self.entries.get(index.as_usize()).map(|entry| entry.term)
    }

    pub(crate) fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Clones every entry starting at `start`, up to `max` entries. Commands are `Bytes`, so
    /// this is cheap.
    pub(crate) fn entries_from(&self, start: Index, max: usize) -> Vec<LogEntry> {
        self.entries.iter().skip(start.as_usize()).take(max).cloned().collect()
    }

    /// Leader-only. Appending never touches existing entries.
    pub(crate) fn append(&mut self, entry: LogEntry) -> Index {
        self.entries.push(entry);
        let appended_index = self.latest_index();
        self.latest_index_publisher.publish(appended_index);

        appended_index
    }

    /// Follower-side log repair. Lays `new_entries` down starting right after `previous_index`.
    /// Entries that already match are left alone. At the first entry whose term differs, the
    /// existing log is cut at that index and the rest of `new_entries` is appended. Both happen
    /// in one call, so no one can observe the log between the cut and the append.
    ///
    /// Caller must have checked that `previous_index` exists in our log.
    ///
    /// Returns true if the log changed.
    pub(crate) fn reconcile(&mut self, previous_index: Index, new_entries: Vec<LogEntry>) -> bool {
        assert!(
            previous_index.as_usize() < self.entries.len(),
            "reconcile() called with previous index {:?} past our log end {:?}",
            previous_index,
            self.latest_index(),
        );

        let mut mutated = false;
        for (offset, new_entry) in new_entries.into_iter().enumerate() {
            let index = previous_index.as_usize() + 1 + offset;
            match self.entries.get(index) {
                Some(existing) if existing.term == new_entry.term => continue,
                Some(_) => {
                    assert!(
                        index as u64 > self.commit_index.as_u64(),
                        "Refusing to truncate committed entry {} (commit index {:?})",
                        index,
                        self.commit_index,
                    );
                    slog::info!(
                        self.logger,
                        "Truncating conflicting log suffix starting at {} (latest {:?})",
                        index,
                        self.latest_index()
                    );
                    self.entries.truncate(index);
                    self.entries.push(new_entry);
                    mutated = true;
                }
                None => {
                    self.entries.push(new_entry);
                    mutated = true;
                }
            }
        }

        if mutated {
            self.latest_index_publisher.publish(self.latest_index());
        }

        mutated
    }

    /// Index of the last entry in `(lower, upper]` whose term is at most `term`. Used by the
    /// leader to skip a whole conflicting term in one step.
    pub(crate) fn last_index_with_term_at_most(&self, term: Term, lower: Index, upper: Index) -> Option<Index> {
        let upper = upper.min(self.latest_index());
        let mut index = upper;
        while index > lower {
            if self.entries[index.as_usize()].term <= term {
                return Some(index);
            }
            index = index.minus(1);
        }

        None
    }

    pub(crate) fn commit_index(&self) -> Index {
        self.commit_index
    }

    /// Committed entries in `(after, commit_index]`, with their indexes, up to `max` entries.
    pub(crate) fn read_committed(&self, after: Index, max: usize) -> Vec<(Index, LogEntry)> {
        let first = after.plus(1);
        let mut committed = Vec::new();
        let mut index = first;
        while index <= self.commit_index && committed.len() < max {
            committed.push((index, self.entries[index.as_usize()].clone()));
            index = index.plus(1);
        }

        committed
    }

    /// Leader path.
    ///
    /// > If there exists an N such that N > commitIndex, a majority
    /// > of matchIndex[i] ≥ N, and log[N].term == currentTerm:
    /// > set commitIndex = N (§5.3, §5.4).
    ///
    /// Entries from earlier terms are only committed transitively. Returns true if the commit
    /// index moved.
    pub(crate) fn ratchet_fwd_commit_index_if_valid(
        &mut self,
        tentative_new_commit_index: Index,
        current_term: Term,
    ) -> bool {
        if tentative_new_commit_index <= self.commit_index {
            return false;
        }

        match self.term_at(tentative_new_commit_index) {
            Some(term) if term == current_term => {
                self.ratchet_fwd_commit_index_panicking(tentative_new_commit_index);
                true
            }
            _ => false,
        }
    }

    /// Follower path. The leader vouches for the entry being committed. Commit index never moves
    /// backwards, so a stale leader commit is ignored.
    pub(crate) fn ratchet_fwd_commit_index_if_greater(&mut self, new_commit_index: Index) -> bool {
        if new_commit_index <= self.commit_index {
            return false;
        }

        self.ratchet_fwd_commit_index_panicking(new_commit_index);
        true
    }

    fn ratchet_fwd_commit_index_panicking(&mut self, new_commit_index: Index) {
        assert!(
            new_commit_index > self.commit_index,
            "Can't ratchet commit index backwards. Expected [input] {:?} > {:?} [current]",
            new_commit_index,
            self.commit_index,
        );

        // Assert we only mark as committed if we have the entry locally.
        let latest_locally_written_index = self.latest_index();
        assert!(
            latest_locally_written_index >= new_commit_index,
            "Can't ratchet commit index forwards past our local log. Expected [latest log] {:?} >= {:?} [input]",
            latest_locally_written_index,
            new_commit_index,
        );

        slog::debug!(self.logger, "Commit index {:?} -> {:?}", self.commit_index, new_commit_index);
        self.commit_index = new_commit_index;
        self.commit_publisher.publish(new_commit_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn entry(term: u64, command: &'static str) -> LogEntry {
        LogEntry {
            term: Term::new(term),
            command: Bytes::from_static(command.as_bytes()),
        }
    }

    fn log_with_terms(terms: &[u64]) -> WriteAheadLog {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let mut entries = vec![LogEntry::sentinel()];
        entries.extend(terms.iter().map(|term| entry(*term, "x")));
        WriteAheadLog::new(logger, entries).0
    }

    fn terms_of(log: &WriteAheadLog) -> Vec<u64> {
        log.entries().iter().skip(1).map(|e| e.term.as_u64()).collect()
    }

    #[test]
    fn new_log_has_only_sentinel() {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let (log, watchers) = WriteAheadLog::new(logger, vec![]);

        assert_eq!(log.latest_entry(), (Term::new(0), Index::new(0)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.commit_index(), Index::new(0));
        assert_eq!(watchers.commit_index.latest(), Index::new(0));
    }

    #[test]
    fn reconcile_appends_past_end() {
        let mut log = log_with_terms(&[1, 1]);

        assert!(log.reconcile(Index::new(2), vec![entry(2, "a"), entry(2, "b")]));
        assert_eq!(terms_of(&log), vec![1, 1, 2, 2]);
    }

    #[test]
    fn reconcile_duplicate_does_not_truncate() {
        let mut log = log_with_terms(&[1, 1, 2, 2]);

        // Retransmission of an older, shorter request. The suffix at 4 must survive.
        assert!(!log.reconcile(Index::new(1), vec![entry(1, "x"), entry(2, "x")]));
        assert_eq!(terms_of(&log), vec![1, 1, 2, 2]);

        // Empty heartbeat is a no-op too.
        assert!(!log.reconcile(Index::new(4), vec![]));
        assert_eq!(terms_of(&log), vec![1, 1, 2, 2]);
    }

    #[test]
    fn reconcile_truncates_at_first_conflict() {
        let mut log = log_with_terms(&[1, 1, 2, 2, 2]);

        assert!(log.reconcile(Index::new(1), vec![entry(1, "x"), entry(3, "y")]));
        assert_eq!(terms_of(&log), vec![1, 1, 3]);
        assert_eq!(log.latest_entry(), (Term::new(3), Index::new(3)));
    }

    #[test]
    fn commit_index_only_for_current_term() {
        let mut log = log_with_terms(&[1, 1, 2]);

        assert!(!log.ratchet_fwd_commit_index_if_valid(Index::new(2), Term::new(2)));
        assert_eq!(log.commit_index(), Index::new(0));

        assert!(log.ratchet_fwd_commit_index_if_valid(Index::new(3), Term::new(2)));
        assert_eq!(log.commit_index(), Index::new(3));

        // Unchanged and stale are no-ops.
        assert!(!log.ratchet_fwd_commit_index_if_valid(Index::new(3), Term::new(2)));
        assert!(!log.ratchet_fwd_commit_index_if_greater(Index::new(1)));
        assert_eq!(log.commit_index(), Index::new(3));
    }

    #[test]
    #[should_panic]
    fn commit_index_past_log_end_panics() {
        let mut log = log_with_terms(&[1]);
        log.ratchet_fwd_commit_index_if_greater(Index::new(2));
    }

    #[test]
    fn read_committed_is_bounded_by_commit_index() {
        let mut log = log_with_terms(&[1, 1, 1, 1]);
        log.ratchet_fwd_commit_index_if_greater(Index::new(3));

        let indexes: Vec<u64> = log
            .read_committed(Index::new(0), 10)
            .into_iter()
            .map(|(index, _)| index.as_u64())
            .collect();
        assert_eq!(indexes, vec![1, 2, 3]);

        assert_eq!(log.read_committed(Index::new(1), 1).len(), 1);
        assert!(log.read_committed(Index::new(3), 10).is_empty());
    }

    #[test]
    fn last_index_with_term_at_most() {
        let log = log_with_terms(&[1, 1, 2, 4, 4, 4]);

        assert_eq!(
            log.last_index_with_term_at_most(Term::new(3), Index::new(0), Index::new(6)),
            Some(Index::new(3))
        );
        assert_eq!(
            log.last_index_with_term_at_most(Term::new(1), Index::new(0), Index::new(6)),
            Some(Index::new(2))
        );
        // Lower bound is exclusive.
        assert_eq!(
            log.last_index_with_term_at_most(Term::new(1), Index::new(2), Index::new(6)),
            None
        );
        assert_eq!(
            log.last_index_with_term_at_most(Term::new(0), Index::new(0), Index::new(6)),
            None
        );
    }
}
