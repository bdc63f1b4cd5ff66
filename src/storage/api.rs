use crate::grpc::{ProtoLogEntry, ProtoPersistentState};
use crate::replica::{LogEntry, ReplicaId, Term};
use bytes::Bytes;
use prost::Message;
use std::io;

/// PersistentStore is where a replica keeps the state raft needs to survive a crash. Every
/// `save` must be durable by the time it returns; the replica makes the change observable
/// (replies, votes, `start()` results) only after that.
///
/// Methods are synchronous. The replica calls them from its event loop, which never awaits.
pub trait PersistentStore: Send + 'static {
    /// None if nothing was ever saved.
    fn load(&self) -> Result<Option<PersistentState>, StorageError>;

    fn save(&mut self, state: &PersistentState) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to decode persisted state: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Failed to encode state: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("Persisted state is corrupt: {0}")]
    Corrupt(String),
}

/// PersistentState is everything a replica must not forget: term, vote, and log. The log
/// includes the sentinel at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentState {
    pub current_term: Term,
    pub voted_for: Option<ReplicaId>,
    pub log: Vec<LogEntry>,
}

impl Default for PersistentState {
    fn default() -> Self {
        PersistentState {
            current_term: Term::new(0),
            voted_for: None,
            log: vec![LogEntry::sentinel()],
        }
    }
}

impl PersistentState {
    pub fn encode(&self) -> Result<Bytes, StorageError> {
        let proto = ProtoPersistentState {
            current_term: self.current_term.as_u64(),
            voted_for: self
                .voted_for
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
            log: self
                .log
                .iter()
                .map(|entry| ProtoLogEntry {
                    term: entry.term.as_u64(),
                    command: entry.command.to_vec(),
                })
                .collect(),
        };

        let mut buf = Vec::with_capacity(proto.encoded_len());
        proto.encode(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let proto = ProtoPersistentState::decode(bytes)?;

        let voted_for = if proto.voted_for.is_empty() {
            None
        } else {
            Some(ReplicaId::new(proto.voted_for))
        };
        let log: Vec<LogEntry> = proto
            .log
            .into_iter()
            .map(|entry| LogEntry {
                term: Term::new(entry.term),
                command: Bytes::from(entry.command),
            })
            .collect();

        let state = PersistentState {
            current_term: Term::new(proto.current_term),
            voted_for,
            log,
        };
        state.validate()?;

        Ok(state)
    }

    pub(crate) fn validate(&self) -> Result<(), StorageError> {
        match self.log.first() {
            Some(first) if first.term == Term::new(0) && first.command.is_empty() => {}
            _ => return Err(StorageError::Corrupt("log does not start with the sentinel entry".into())),
        }

        for pair in self.log.windows(2) {
            if pair[1].term < pair[0].term {
                return Err(StorageError::Corrupt(format!(
                    "log terms decrease from {:?} to {:?}",
                    pair[0].term, pair[1].term
                )));
            }
        }

        if let Some(last) = self.log.last() {
            if last.term > self.current_term {
                return Err(StorageError::Corrupt(format!(
                    "log holds term {:?} which is newer than current term {:?}",
                    last.term, self.current_term
                )));
            }
        }

        Ok(())
    }
}
