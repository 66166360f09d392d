use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{KeyValueStore, PersistenceError};

// Action enum for the persistence worker
#[derive(Debug)]
pub enum PersistAction {
    Save {
        key: String,
        bytes: Vec<u8>,
    },
    Flush {
        response_tx: oneshot::Sender<Result<(), PersistenceError>>,
    },
}

/// Cheap handle for queuing writes from synchronous code paths.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: UnboundedSender<PersistAction>,
}

impl PersistenceHandle {
    /// Queue a snapshot for `key`. Never blocks; the latest snapshot per key
    /// wins when several are queued before the worker catches up.
    pub fn save(&self, key: &str, bytes: Vec<u8>) {
        let action = PersistAction::Save {
            key: key.to_string(),
            bytes,
        };
        if self.tx.send(action).is_err() {
            warn!("Persistence worker gone, dropping snapshot for '{}'", key);
        }
    }

    /// Wait until every snapshot queued before this call has been written.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(PersistAction::Flush { response_tx })
            .map_err(|_| PersistenceError::WorkerStopped)?;
        response_rx
            .await
            .map_err(|_| PersistenceError::WorkerStopped)?
    }

    /// A handle whose writes go nowhere, together with the receiver that
    /// would normally belong to the worker.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, UnboundedReceiver<PersistAction>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

pub struct PersistenceWorker;

impl PersistenceWorker {
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (PersistenceHandle, JoinHandle<()>) {
        let (tx, rx) = unbounded_channel::<PersistAction>();
        let handle = tokio::spawn(Self::run(store, rx));
        info!("Persistence worker started");
        (PersistenceHandle { tx }, handle)
    }

    async fn run(store: Arc<dyn KeyValueStore>, mut rx: UnboundedReceiver<PersistAction>) {
        while let Some(action) = rx.recv().await {
            // Coalesce whatever is already queued so bursts of edits produce
            // one write per key.
            let mut pending: BTreeMap<String, Vec<u8>> = BTreeMap::new();
            let mut waiters = Vec::new();
            let mut next = Some(action);

            while let Some(action) = next.take() {
                match action {
                    PersistAction::Save { key, bytes } => {
                        pending.insert(key, bytes);
                    }
                    PersistAction::Flush { response_tx } => waiters.push(response_tx),
                }
                next = rx.try_recv().ok();
            }

            let mut outcome = Ok(());
            for (key, bytes) in pending {
                match store.save(&key, &bytes).await {
                    Ok(()) => debug!("Persisted '{}'", key),
                    Err(e) => {
                        error!("Failed to persist '{}': {}", key, e);
                        outcome = Err(e);
                    }
                }
            }

            for response_tx in waiters {
                let reply = match &outcome {
                    Ok(()) => Ok(()),
                    Err(e) => Err(PersistenceError::WriteFailed(e.to_string())),
                };
                if response_tx.send(reply).is_err() {
                    error!("Failed to send flush response");
                }
            }
        }

        info!("Persistence worker stopped");
    }
}
