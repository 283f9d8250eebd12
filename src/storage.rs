use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use parking_lot::Mutex;

use crate::Result;

/// A durable key-value store holding whole documents.
///
/// Values are overwritten wholesale, there are no partial updates.
pub trait KeyValueStore: Send + Sync {
    /// Reads the document stored under `key`.
    ///
    /// # Returns
    /// `None` if nothing was ever stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the document stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores every key as a `<key>.json` file inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a new `FileStore`, creating `dir` if it doesn't exist.
    ///
    /// # Arguments
    /// * `dir` - The directory the documents live in.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // Writes to a sibling temp file first so a crash never leaves a truncated document.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));

        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        debug!("wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// Keeps every document in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        process,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn scratch_dir() -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("recognizer-storage-{}-{n}", process::id()))
    }

    #[test]
    fn memory_store_missing_key() {
        assert_eq!(MemoryStore::new().get("nope").unwrap(), None);
    }

    #[test]
    fn file_store_overwrites_wholesale() {
        let dir = scratch_dir();
        let store = FileStore::new(&dir).unwrap();

        assert_eq!(store.get("doc").unwrap(), None);
        store.set("doc", "{\"a\":1}").unwrap();
        store.set("doc", "{}").unwrap();
        assert_eq!(store.get("doc").unwrap().as_deref(), Some("{}"));

        fs::remove_dir_all(dir).unwrap();
    }
}
