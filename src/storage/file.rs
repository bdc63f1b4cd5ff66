use crate::storage::api::{PersistentState, PersistentStore, StorageError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// FileStore keeps the state in a single file. Each save rewrites the whole state into a
/// temporary file, syncs it, and renames it over the previous one, so a crash mid-save leaves
/// either the old or the new state on disk, never a mix.
pub struct FileStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FileStore {
    /// The parent directory must exist. The file itself is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");

        FileStore {
            path,
            tmp_path: PathBuf::from(tmp_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistentStore for FileStore {
    fn load(&self) -> Result<Option<PersistentState>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => PersistentState::decode(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, state: &PersistentState) -> Result<(), StorageError> {
        let bytes = state.encode()?;

        let mut file = fs::File::create(&self.tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&self.tmp_path, &self.path)?;

        // Make the rename itself durable.
        sync_dir(self.path.parent())
    }
}

/// A bare file name has an empty parent, which is the working directory.
fn sync_dir(dir: Option<&Path>) -> Result<(), StorageError> {
    let dir = match dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::File::open(dir)?.sync_all()?;

    Ok(())
}
