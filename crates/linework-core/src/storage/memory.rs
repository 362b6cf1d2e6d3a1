//! In-memory storage implementation.

use super::{Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently stored, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Io(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn read(&self, path: &Path) -> StorageResult<String> {
        let files = self.files.read().map_err(lock_error)?;
        let bytes = files
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        String::from_utf8(bytes.clone()).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let mut files = self.files.write().map_err(lock_error)?;
        files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let mut files = self.files.write().map_err(lock_error)?;
        files.remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        let path = Path::new("/projects/a.linework");
        assert!(!storage.exists(path));
        storage.write_atomic(path, b"hello").unwrap();
        assert_eq!(storage.read(path).unwrap(), "hello");
        assert_eq!(storage.paths(), vec![path.to_path_buf()]);
        storage.remove(path).unwrap();
        assert!(matches!(storage.read(path), Err(StorageError::NotFound(_))));
    }
}
