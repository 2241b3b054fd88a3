use super::storage::KeyValueStore;
use super::types::{HistoryLog, ScanRecord};
use crate::error::PersistenceError;

/// Storage key the history log lives under
pub const DEFAULT_HISTORY_KEY: &str = "scannedImages";

/// Append-only scan history, newest first.
///
/// The whole log is stored as one JSON array under a single key. Appends
/// are read-modify-write cycles run through [`KeyValueStore::update`], so two
/// rapid scans never overwrite each other, even from separate stores or
/// processes sharing the same storage. `list` takes no lock; it sees either
/// the log before or after a concurrent append.
pub struct HistoryStore<S: KeyValueStore> {
    storage: S,
    key: String,
    max_records: Option<usize>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: DEFAULT_HISTORY_KEY.to_string(),
            max_records: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// Keep at most `max` records; the oldest are dropped on append.
    /// `None` keeps everything.
    pub fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.max_records = max;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Prepend `record` to the stored log.
    ///
    /// If the current log cannot be read or decoded the append is aborted
    /// and the stored log is left as it was.
    pub fn append(&self, record: ScanRecord) -> Result<(), PersistenceError> {
        let mut stored = 0;

        self.storage.update(&self.key, &mut |current| {
            let mut history = self.decode(current)?;
            history.insert(0, record.clone());

            if let Some(max) = self.max_records {
                if history.len() > max {
                    log::debug!(
                        "Trimming history from {} to {} records",
                        history.len(),
                        max
                    );
                    history.truncate(max);
                }
            }

            stored = history.len();
            serde_json::to_string(&history)
                .map(Some)
                .map_err(PersistenceError::Encode)
        })?;

        log::debug!("Appended scan record ({} in history)", stored);
        Ok(())
    }

    /// The full log, newest first; empty when nothing was stored yet
    pub fn list(&self) -> Result<HistoryLog, PersistenceError> {
        self.read_log()
    }

    /// Delete all stored history
    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.storage.update(&self.key, &mut |_| Ok(None))?;
        log::info!("Cleared scan history");
        Ok(())
    }

    fn read_log(&self) -> Result<HistoryLog, PersistenceError> {
        self.decode(self.storage.get(&self.key)?)
    }

    fn decode(&self, stored: Option<String>) -> Result<HistoryLog, PersistenceError> {
        match stored {
            Some(content) => {
                serde_json::from_str(&content).map_err(|source| {
                    log::error!("Stored history under '{}' is corrupt: {}", self.key, source);
                    PersistenceError::Corrupt {
                        key: self.key.clone(),
                        source,
                    }
                })
            }
            None => Ok(Vec::new()),
        }
    }
}
