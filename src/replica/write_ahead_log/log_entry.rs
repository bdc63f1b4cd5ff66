use crate::replica::local_state::Term;
use bytes::Bytes;
use std::fmt;

/// Index is the position of an entry in the raft log. Index 0 is reserved for the sentinel entry,
/// so the first real entry lives at index 1.
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Default)]
pub struct Index(u64);

impl Index {
    pub fn new(index: u64) -> Self {
        Index(index)
    }

    pub(crate) fn sentinel() -> Self {
        Index(0)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub(crate) fn plus(&self, n: u64) -> Self {
        Index(self.0 + n)
    }

    /// Saturates at the sentinel.
    pub(crate) fn minus(&self, n: u64) -> Self {
        Index(self.0.saturating_sub(n))
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for Index {
    fn from(index: usize) -> Self {
        Index(index as u64)
    }
}

/// LogEntry is a single command tagged with the term of the leader that created it.
#[derive(Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub term: Term,
    pub command: Bytes,
}

impl LogEntry {
    pub(crate) fn sentinel() -> Self {
        LogEntry {
            term: Term::new(0),
            command: Bytes::new(),
        }
    }
}

impl fmt::Debug for LogEntry {
    // Commands can be large and opaque, so only their size is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("term", &self.term)
            .field("command_len", &self.command.len())
            .finish()
    }
}
