use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fs2::FileExt;

use crate::error::PersistenceError;

/// Step run by [`KeyValueStore::update`]: current value in, replacement out;
/// returning `None` removes the key
pub type UpdateFn<'a> =
    dyn FnMut(Option<String>) -> Result<Option<String>, PersistenceError> + 'a;

/// Minimal key-value storage the history store persists through
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, `None` if nothing was stored yet
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Drop `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;

    /// Read `key`, pass it to `apply` and store what it returns, excluding
    /// every other `update` of the same key for the whole cycle. When `apply`
    /// fails nothing is written.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), PersistenceError>;
}

/// Stores each key as a JSON file inside a directory.
///
/// Writes land in a temporary file that is renamed over the target, so a
/// reader sees either the previous value or the new one, never a torn write.
/// `update` holds an exclusive lock on a `.<file>.lock` sibling, which also
/// serializes separate `FileStore`s and processes sharing the directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    temp_counter: AtomicU64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`; distinct keys map to distinct files
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    fn lock_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.lock", encode_key(key)))
    }

    /// Exclusive lock for `key`, released when the returned file is dropped
    fn lock(&self, key: &str) -> Result<File, PersistenceError> {
        let lock_error = |source| PersistenceError::Lock {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(lock_error)?;
        let file = open_lock_file(&self.lock_path_for(key)).map_err(lock_error)?;
        FileExt::lock_exclusive(&file).map_err(lock_error)?;
        Ok(file)
    }

    fn write_atomic(&self, path: &Path, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let temp_name = format!(
            ".{}.tmp-{}-{}",
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("value"),
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        );
        let temp_path = self.dir.join(temp_name);

        fs::write(&temp_path, value)?;
        restrict_permissions(&temp_path)?;

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        self.write_atomic(&path, value)
            .map_err(|source| PersistenceError::Write {
                key: key.to_string(),
                source,
            })
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Write {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), PersistenceError> {
        let lock = self.lock(key)?;

        let result = match apply(self.get(key)?)? {
            Some(value) => self.set(key, &value),
            None => self.remove(key),
        };

        if let Err(e) = FileExt::unlock(&lock) {
            log::warn!("Failed to release lock for '{}': {}", key, e);
        }
        result
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`, `%` included
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }
    encoded
}

#[cfg(unix)]
fn open_lock_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

/// Owner read/write only
#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// In-process store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // Values are replaced whole, so a poisoned map is still consistent
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.values().remove(key);
        Ok(())
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), PersistenceError> {
        let mut values = self.values();
        match apply(values.get(key).cloned())? {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("scannedImages").unwrap(), None);
    }

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        store.set("scannedImages", "[]").unwrap();
        assert_eq!(store.get("scannedImages").unwrap().as_deref(), Some("[]"));

        store.set("scannedImages", "[1]").unwrap();
        assert_eq!(store.get("scannedImages").unwrap().as_deref(), Some("[1]"));

        store.remove("scannedImages").unwrap();
        assert_eq!(store.get("scannedImages").unwrap(), None);
        store.remove("scannedImages").unwrap();
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[test]
    fn test_path_for_sanitizes_key() {
        let store = FileStore::new("/tmp/history");
        assert_eq!(
            store.path_for("../scan images"),
            PathBuf::from("/tmp/history/%2E%2E%2Fscan%20images.json")
        );
        assert_eq!(
            store.path_for("scanned_Images-2"),
            PathBuf::from("/tmp/history/scanned_Images-2.json")
        );
    }

    #[test]
    fn test_distinct_keys_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let keys = ["a/b", "a_b", "a b", "a%2Fb", "a.b"];

        for key in keys {
            store.set(key, key).unwrap();
        }
        for key in keys {
            assert_eq!(store.get(key).unwrap().as_deref(), Some(key));
        }
        store.remove("a/b").unwrap();
        assert_eq!(store.get("a_b").unwrap().as_deref(), Some("a_b"));
    }

    #[test]
    fn test_file_store_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .update("n", &mut |current| {
                assert_eq!(current, None);
                Ok(Some("1".to_string()))
            })
            .unwrap();
        store
            .update("n", &mut |current| {
                let n: u32 = current.unwrap_or_default().parse().unwrap();
                Ok(Some((n + 1).to_string()))
            })
            .unwrap();
        assert_eq!(store.get("n").unwrap().as_deref(), Some("2"));

        store.update("n", &mut |_| Ok(None)).unwrap();
        assert_eq!(store.get("n").unwrap(), None);
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("n", "1").unwrap();

        let result = store.update("n", &mut |_| Err(PersistenceError::WriterStopped));
        assert!(matches!(result, Err(PersistenceError::WriterStopped)));
        assert_eq!(store.get("n").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_updates_from_separate_file_stores_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let threads = 4;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = FileStore::new(path.clone());
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store
                            .update("n", &mut |current| {
                                let n: u32 = current.map_or(0, |v| v.parse().unwrap());
                                Ok(Some((n + 1).to_string()))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = FileStore::new(path).get("n").unwrap().unwrap();
        assert_eq!(total, (threads * per_thread).to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("a", "1").unwrap();
        let mode = fs::metadata(store.path_for("a")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        // A directory where the file should be cannot be read as text
        fs::create_dir_all(store.path_for("a")).unwrap();
        assert!(matches!(
            store.get("a"),
            Err(PersistenceError::Read { .. })
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store.update("k", &mut |_| Ok(Some("w".to_string()))).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("w"));
    }
}
