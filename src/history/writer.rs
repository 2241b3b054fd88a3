use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use super::storage::KeyValueStore;
use super::store::HistoryStore;
use super::types::ScanRecord;
use crate::error::PersistenceError;

/// Message sent to the history writer
#[derive(Debug)]
pub struct AppendRequest {
    pub record: ScanRecord,
    /// Where to report the outcome; `None` for fire-and-forget appends
    pub reply: Option<Sender<Result<(), PersistenceError>>>,
}

/// Cloneable handle for queueing appends to a single writer thread.
///
/// Any number of scan triggers can hold a handle. Requests are applied one
/// at a time in the order they arrive.
#[derive(Clone, Debug)]
pub struct HistoryWriter {
    tx: Sender<AppendRequest>,
}

impl HistoryWriter {
    /// Start a writer thread for `store`.
    ///
    /// The thread exits once every handle has been dropped and the queue
    /// is drained.
    pub fn spawn<S>(store: Arc<HistoryStore<S>>) -> (Self, JoinHandle<()>)
    where
        S: KeyValueStore + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_history_writer(store, rx);
        (Self { tx }, handle)
    }

    /// Queue `record` and wait until it has been written
    pub fn append(&self, record: ScanRecord) -> Result<(), PersistenceError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(AppendRequest {
                record,
                reply: Some(reply_tx),
            })
            .map_err(|_| PersistenceError::WriterStopped)?;
        reply_rx
            .recv()
            .map_err(|_| PersistenceError::WriterStopped)?
    }

    /// Queue `record` without waiting; failures are only logged
    pub fn submit(&self, record: ScanRecord) -> Result<(), PersistenceError> {
        self.tx
            .send(AppendRequest {
                record,
                reply: None,
            })
            .map_err(|_| PersistenceError::WriterStopped)
    }
}

/// Spawn the background history writer
pub fn spawn_history_writer<S>(
    store: Arc<HistoryStore<S>>,
    rx: Receiver<AppendRequest>,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
{
    thread::spawn(move || {
        log::info!("History writer started (key: {})", store.key());

        for request in rx {
            let uri = request.record.image_reference.clone();
            let result = store.append(request.record);

            match request.reply {
                Some(reply) => {
                    if reply.send(result).is_err() {
                        log::warn!("Requester for scan {} went away before the reply", uri);
                    }
                }
                None => {
                    if let Err(e) = result {
                        log::error!("Failed to append scan {} to history: {}", uri, e);
                    }
                }
            }
        }

        log::info!("History writer shutting down");
    })
}
