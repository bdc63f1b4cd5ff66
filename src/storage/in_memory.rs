use crate::storage::api::{PersistentState, PersistentStore, StorageError};
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// InMemoryStore keeps the encoded state in memory. Clones share the same slot, so a clone kept
/// by the host outlives a killed replica and can seed its replacement, like a disk would.
///
/// State still goes through the encoder, so restarts exercise the same path as a real store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<Option<Bytes>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Size of the last saved state in bytes.
    pub fn state_size(&self) -> usize {
        self.data
            .lock()
            .expect("InMemoryStore.state_size() mutex guard poison")
            .as_ref()
            .map(|bytes| bytes.len())
            .unwrap_or(0)
    }
}

impl PersistentStore for InMemoryStore {
    fn load(&self) -> Result<Option<PersistentState>, StorageError> {
        let data = self
            .data
            .lock()
            .expect("InMemoryStore.load() mutex guard poison")
            .clone();

        data.map(|bytes| PersistentState::decode(&bytes)).transpose()
    }

    fn save(&mut self, state: &PersistentState) -> Result<(), StorageError> {
        let bytes = state.encode()?;
        self.data
            .lock()
            .expect("InMemoryStore.save() mutex guard poison")
            .replace(bytes);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::{ReplicaId, Term};

    #[test]
    fn clone_sees_saved_state() {
        let mut store = InMemoryStore::new();
        let restarted = store.clone();
        assert_eq!(restarted.load().unwrap(), None);
        assert_eq!(restarted.state_size(), 0);

        let state = PersistentState {
            current_term: Term::new(4),
            voted_for: Some(ReplicaId::new("a")),
            ..PersistentState::default()
        };
        store.save(&state).unwrap();

        assert_eq!(restarted.load().unwrap(), Some(state));
        assert!(restarted.state_size() > 0);
    }
}
