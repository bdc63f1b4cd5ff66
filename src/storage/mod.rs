mod api;
mod file;
mod in_memory;

pub use api::PersistentState;
pub use api::PersistentStore;
pub use api::StorageError;
pub use file::FileStore;
pub use in_memory::InMemoryStore;
