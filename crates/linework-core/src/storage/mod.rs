//! Storage abstraction for persistence.

mod autosave;
mod file;
mod format;
mod memory;

pub use autosave::{
    AutoSaveManager, DEFAULT_AUTOSAVE_ACTIONS, DEFAULT_AUTOSAVE_INTERVAL_SECS, autosave_path, recover,
};
pub use file::FileStorage;
pub use format::{
    CURRENT_VERSION, LoadError, LoadWarning, LoadedProject, MIN_SUPPORTED_VERSION, PROJECT_EXTENSION,
    from_json, load_project, save_project, to_json,
};
pub use memory::MemoryStorage;

use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for byte storage backends keyed by path.
///
/// Implementations must make `write_atomic` all-or-nothing: a reader never
/// sees a partially written file.
pub trait Storage: Send + Sync {
    /// Read a whole file as UTF-8.
    fn read(&self, path: &Path) -> StorageResult<String>;

    /// Replace the file at `path` with `contents`.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> StorageResult<()>;

    /// Remove a file. Removing a missing file is not an error.
    fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Check if a file exists.
    fn exists(&self, path: &Path) -> bool;
}
