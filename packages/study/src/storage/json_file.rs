//! Single-file JSON key-value store
//!
//! The whole store is one JSON object of string values. Every write rewrites
//! the file through a temporary sibling and a rename, so a crash mid-write
//! leaves the previous contents intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::storage::{KeyValueStore, StorageError, StorageResult};

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// An unreadable JSON body is moved aside to `<path>.corrupt` and the
    /// store starts empty.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(body) => match serde_json::from_str::<BTreeMap<String, String>>(&body) {
                Ok(entries) => entries,
                Err(err) => {
                    let backup = corrupt_backup_path(&path);
                    tracing::warn!(
                        path = %path.display(),
                        backup = %backup.display(),
                        error = %err,
                        "store file is corrupt, starting empty"
                    );
                    if let Err(err) = fs::rename(&path, &backup) {
                        tracing::warn!(error = %err, "failed to move corrupt store aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StorageError::Io(err)),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "json store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    // 内存中的内容只在写盘成功后才更新

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.lock()?;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weights.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            assert_eq!(store.get("last_hsk").unwrap(), None);
            store.set("last_hsk", "HSK3").unwrap();
            store.set("w_HSK3_text", r#"{"t1":0.1}"#).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("last_hsk").unwrap().as_deref(), Some("HSK3"));
        assert_eq!(
            reopened.get("w_HSK3_text").unwrap().as_deref(),
            Some(r#"{"t1":0.1}"#)
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        fs::write(&path, "{ this is not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(corrupt_backup_path(&path).exists());

        store.set("k", "v").unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_failed_write_leaves_entries_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        // a directory where the temporary file goes makes every flush fail
        fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(store.set("b", "2").is_err());
        assert!(store.remove("a").is_err());

        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap(), None);
    }
}
