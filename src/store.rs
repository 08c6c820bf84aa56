//! Document store seam plus the worker thread that serializes live writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::entity::{CollectionId, Fields, PROFILE_DOC_ID};
use crate::error::SyncResult;
use crate::state::{Delta, WriteOp};
use crate::supervisor::Identity;

const AUTO_ID_LEN: usize = 20;

/// Remote document store as the sync layer sees it.
///
/// `create` stamps the collection's moment field with server time. Subscriptions
/// deliver full snapshots tagged with the generation they were opened under,
/// and stop when the returned handle is dropped.
pub trait DocumentStore: Send + Sync {
    fn sign_in(&self, token: Option<&str>) -> SyncResult<Identity>;

    fn create(&self, collection: CollectionId, id: &str, fields: Fields) -> SyncResult<()>;
    fn update(&self, collection: CollectionId, id: &str, partial: Fields) -> SyncResult<()>;
    fn delete(&self, collection: CollectionId, id: &str) -> SyncResult<()>;

    fn get_profile(&self) -> SyncResult<Option<Fields>>;
    /// Wholesale overwrite of the profile document.
    fn set_profile(&self, fields: Fields) -> SyncResult<()>;

    fn subscribe_collection(
        &self,
        collection: CollectionId,
        generation: u64,
        tx: Sender<Delta>,
    ) -> SyncResult<Subscription>;
    fn subscribe_profile(&self, generation: u64, tx: Sender<Delta>) -> SyncResult<Subscription>;

    /// Emits `AuthChanged { identity: None }` once the session is lost.
    fn watch_auth(&self, generation: u64, tx: Sender<Delta>) -> Subscription;
}

/// Cancellation handle for a listener. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    stop: Arc<AtomicBool>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the producer checks before each delivery.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Store-style auto id, generated client side so live creates can return it.
pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

pub fn collection_path(app_id: &str, collection: CollectionId) -> String {
    format!("artifacts/{app_id}/{}", collection.name())
}

pub fn profile_path(app_id: &str) -> String {
    format!(
        "{}/{PROFILE_DOC_ID}",
        collection_path(app_id, CollectionId::UserProfile)
    )
}

#[derive(Debug, Clone)]
pub enum StoreCommand {
    Create {
        collection: CollectionId,
        id: String,
        fields: Fields,
    },
    Update {
        collection: CollectionId,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: CollectionId,
        id: String,
    },
    SetProfile {
        fields: Fields,
    },
}

impl StoreCommand {
    fn describe(&self) -> (CollectionId, WriteOp, String) {
        match self {
            StoreCommand::Create { collection, id, .. } => (*collection, WriteOp::Create, id.clone()),
            StoreCommand::Update { collection, id, .. } => (*collection, WriteOp::Update, id.clone()),
            StoreCommand::Delete { collection, id } => (*collection, WriteOp::Delete, id.clone()),
            StoreCommand::SetProfile { .. } => (
                CollectionId::UserProfile,
                WriteOp::SetProfile,
                PROFILE_DOC_ID.to_string(),
            ),
        }
    }
}

/// Runs live writes one at a time in issue order. Exits when the command
/// sender is dropped, which happens on demotion.
pub fn spawn_store_worker(
    store: Arc<dyn DocumentStore>,
    generation: u64,
    cmd_rx: Receiver<StoreCommand>,
    tx: Sender<Delta>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            let (collection, op, id) = cmd.describe();
            let result = match cmd {
                StoreCommand::Create {
                    collection,
                    id,
                    fields,
                } => store.create(collection, &id, fields),
                StoreCommand::Update {
                    collection,
                    id,
                    fields,
                } => store.update(collection, &id, fields),
                StoreCommand::Delete { collection, id } => store.delete(collection, &id),
                StoreCommand::SetProfile { fields } => store.set_profile(fields),
            };
            match result {
                Ok(()) => {
                    let _ = tx.send(Delta::WriteAcked {
                        generation,
                        collection,
                        op,
                        id,
                    });
                }
                Err(err) => {
                    tracing::warn!(%collection, op = op.label(), %id, error = %err, "live write failed");
                    let auth_lost = err.is_auth_loss();
                    let _ = tx.send(Delta::WriteFailed {
                        generation,
                        collection,
                        op,
                        id,
                        error: err.to_string(),
                    });
                    if auth_lost {
                        let _ = tx.send(Delta::AuthChanged {
                            generation,
                            identity: None,
                        });
                    }
                }
            }
        }
        tracing::debug!(generation, "store worker stopped");
    })
}
