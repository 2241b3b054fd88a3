pub mod types;
pub mod storage;
pub mod store;
pub mod writer;

pub use types::{HistoryLog, ScanRecord};
pub use storage::{FileStore, KeyValueStore, MemoryStore, UpdateFn};
pub use store::{HistoryStore, DEFAULT_HISTORY_KEY};
pub use writer::{spawn_history_writer, AppendRequest, HistoryWriter};
