use std::io;

use thiserror::Error;

/// Defect in knowledge base data, detected while loading
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("malformed entry #{index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
    #[error("failed to read knowledge base file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse knowledge base file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl KnowledgeError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            index,
            reason: reason.into(),
        }
    }
}

/// Storage failure surfaced by the history store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read '{key}' from storage: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{key}' to storage: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock '{key}' for writing: {source}")]
    Lock {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("stored history under '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode history: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("history writer is no longer running")]
    WriterStopped,
}
