//! The raft log as seen by one replica: entries, commit index, and the signals other tasks watch.

mod commit_signal;
mod log;
mod log_entry;

pub(crate) use commit_signal::IndexWatcher;
pub(crate) use log::WriteAheadLog;
pub use log_entry::Index;
pub use log_entry::LogEntry;
