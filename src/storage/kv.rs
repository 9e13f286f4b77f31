use anyhow::{Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// String records addressed by key, the way the notes are persisted.
pub trait KeyValueStore {
    /// Read a record. A key that was never written is `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace a record in full
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// One JSON file per key under a root directory
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Open the store, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data directory {}", root.display()))?;
        Ok(FileKvStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            anyhow::bail!("Invalid record key: {:?}", key);
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.record_path(key)?;
        // Write next to the target and rename so a crash never leaves half a record
        let tmp_path = self.root.join(format!(".{}.json.tmp", key));
        std::fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        log::debug!("wrote record {} ({} bytes)", key, value.len());
        Ok(())
    }
}

/// Volatile store, used by tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    records: HashMap<String, String>,
}

#[cfg(test)]
impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileKvStore::open(dir.path().join("data")).unwrap();

        assert_eq!(store.get("sticky_notes_v4").unwrap(), None);
        store.set("sticky_notes_v4", "[]").unwrap();
        assert_eq!(store.get("sticky_notes_v4").unwrap().as_deref(), Some("[]"));

        store.set("sticky_notes_v4", "[1]").unwrap();
        assert_eq!(store.get("sticky_notes_v4").unwrap().as_deref(), Some("[1]"));
        assert!(dir.path().join("data/sticky_notes_v4.json").exists());
        assert!(!dir.path().join("data/.sticky_notes_v4.json.tmp").exists());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileKvStore::open(dir.path()).unwrap();

        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("a/b").is_err());
        assert!(store.set("", "x").is_err());
    }

    #[test]
    fn file_store_reopen_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileKvStore::open(dir.path()).unwrap();
            store.set("theme", "light").unwrap();
        }
        let store = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn boxed_store_delegates() {
        let mut store: Box<dyn KeyValueStore> = Box::new(MemoryKvStore::new());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
