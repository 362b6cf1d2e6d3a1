//! File-based storage with write-to-temp-then-rename.

use super::{Storage, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Filesystem storage.
///
/// Writes go to a temporary file in the destination directory which is
/// renamed over the target only once fully written and flushed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(action: &str, path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::Io(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl Storage for FileStorage {
    fn read(&self, path: &Path) -> StorageResult<String> {
        match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(format!("{} is not UTF-8: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(io_error("read", path, e)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_error("create directory", dir, e))?;
        }
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error("create temp file in", dir, e))?;
        tmp.write_all(contents).map_err(|e| io_error("write", tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| io_error("sync", tmp.path(), e))?;
        tmp.persist(path).map_err(|e| io_error("replace", path, e.error))?;
        log::debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", path, e)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yard.linework");
        let storage = FileStorage::new();
        storage.write_atomic(&path, b"{\"a\":1}").unwrap();
        assert!(storage.exists(&path));
        assert_eq!(storage.read(&path).unwrap(), "{\"a\":1}");

        storage.write_atomic(&path, b"second").unwrap();
        assert_eq!(storage.read(&path).unwrap(), "second");
        // Only the target is left behind, no temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new();
        let path = dir.path().join("nope.linework");
        assert!(matches!(storage.read(&path), Err(StorageError::NotFound(_))));
        assert!(storage.remove(&path).is_ok());
    }

    #[test]
    fn test_non_utf8_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.linework");
        std::fs::write(&path, [0xFF, 0xFE, 0x00]).unwrap();
        assert!(matches!(FileStorage::new().read(&path), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("c.linework");
        FileStorage::new().write_atomic(&path, b"x").unwrap();
        assert!(path.exists());
    }
}
