//! In-process document store with synchronous delivery.
//!
//! Behaves like the remote store from the sync layer's point of view: full
//! snapshots per write, server-stamped moments, generation-tagged deltas. Used
//! for tests and local fixtures; failure switches let callers exercise every
//! error path without a network.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::StoreConfig;
use crate::entity::{CollectionId, Document, Fields, Moment};
use crate::error::{SyncError, SyncResult};
use crate::state::Delta;
use crate::store::{DocumentStore, Subscription};
use crate::supervisor::{Identity, StoreConnector};

/// 2025-01-01T00:00:00Z; the clock advances one second per stamped write.
const CLOCK_START_MILLIS: i64 = 1_735_689_600_000;
const CLOCK_STEP_MILLIS: i64 = 1_000;

#[derive(Debug)]
enum Target {
    Collection(CollectionId),
    Profile,
    Auth,
}

#[derive(Debug)]
struct Watcher {
    target: Target,
    generation: u64,
    tx: Sender<Delta>,
    stop: Arc<AtomicBool>,
}

impl Watcher {
    fn live(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Inner {
    docs: BTreeMap<CollectionId, Vec<Document>>,
    profile: Option<Fields>,
    watchers: Vec<Watcher>,
    clock: i64,
    uid: String,
    signed_in: bool,
    fail_auth: bool,
    fail_writes: bool,
    failing_subscriptions: HashSet<CollectionId>,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_uid("local-user-0001")
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                docs: BTreeMap::new(),
                profile: None,
                watchers: Vec::new(),
                clock: CLOCK_START_MILLIS,
                uid: uid.into(),
                signed_in: false,
                fail_auth: false,
                fail_writes: false,
                failing_subscriptions: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Insert a document as-is: no stamping, no validation. Notifies watchers.
    pub fn seed_document(&self, collection: CollectionId, document: Document) {
        let mut inner = self.lock();
        inner.docs.entry(collection).or_default().push(document);
        inner.emit_collection(collection);
    }

    pub fn seed_profile(&self, fields: Fields) {
        let mut inner = self.lock();
        inner.profile = Some(fields);
        inner.emit_profile();
    }

    pub fn documents(&self, collection: CollectionId) -> Vec<Document> {
        self.lock().docs.get(&collection).cloned().unwrap_or_default()
    }

    pub fn document(&self, collection: CollectionId, id: &str) -> Option<Document> {
        self.lock()
            .docs
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned())
    }

    pub fn profile(&self) -> Option<Fields> {
        self.lock().profile.clone()
    }

    pub fn set_fail_auth(&self, fail: bool) {
        self.lock().fail_auth = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn fail_subscription(&self, collection: CollectionId) {
        self.lock().failing_subscriptions.insert(collection);
    }

    /// Ends the session server side and signals every auth watcher.
    pub fn revoke_auth(&self) {
        let mut inner = self.lock();
        inner.signed_in = false;
        inner.watchers.retain(|w| w.live());
        for watcher in inner.watchers.iter().filter(|w| matches!(w.target, Target::Auth)) {
            let _ = watcher.tx.send(Delta::AuthChanged {
                generation: watcher.generation,
                identity: None,
            });
        }
    }

    /// Listeners still registered and not cancelled.
    pub fn active_watchers(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|w| w.live());
        inner.watchers.len()
    }
}

impl Inner {
    fn next_moment(&mut self) -> Moment {
        self.clock += CLOCK_STEP_MILLIS;
        Moment::from_millis(self.clock)
    }

    fn check_write(&self, collection: CollectionId) -> SyncResult<()> {
        if !self.signed_in {
            return Err(SyncError::Authentication("not signed in".to_string()));
        }
        if self.fail_writes {
            return Err(SyncError::write(collection, "permission denied"));
        }
        Ok(())
    }

    fn emit_collection(&mut self, collection: CollectionId) {
        self.watchers.retain(|w| w.live());
        let documents = self.docs.get(&collection).cloned().unwrap_or_default();
        for watcher in &self.watchers {
            if matches!(watcher.target, Target::Collection(c) if c == collection) {
                let _ = watcher.tx.send(Delta::Snapshot {
                    generation: watcher.generation,
                    collection,
                    documents: documents.clone(),
                });
            }
        }
    }

    fn emit_profile(&mut self) {
        self.watchers.retain(|w| w.live());
        for watcher in &self.watchers {
            if matches!(watcher.target, Target::Profile) {
                let _ = watcher.tx.send(Delta::ProfileSnapshot {
                    generation: watcher.generation,
                    fields: self.profile.clone(),
                });
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn sign_in(&self, token: Option<&str>) -> SyncResult<Identity> {
        let mut inner = self.lock();
        if inner.fail_auth {
            let how = if token.is_some() { "custom token" } else { "anonymous" };
            return Err(SyncError::Authentication(format!("{how} sign-in rejected")));
        }
        inner.signed_in = true;
        Ok(Identity {
            uid: inner.uid.clone(),
        })
    }

    fn create(&self, collection: CollectionId, id: &str, mut fields: Fields) -> SyncResult<()> {
        let mut inner = self.lock();
        inner.check_write(collection)?;
        if inner
            .docs
            .get(&collection)
            .is_some_and(|docs| docs.iter().any(|d| d.id == id))
        {
            return Err(SyncError::write(collection, format!("document {id} already exists")));
        }
        if let Some(field) = collection.moment_field() {
            let moment = inner.next_moment();
            fields.insert(field.to_string(), Value::from(moment.encode()));
        }
        inner
            .docs
            .entry(collection)
            .or_default()
            .push(Document::new(id, fields));
        inner.emit_collection(collection);
        Ok(())
    }

    fn update(&self, collection: CollectionId, id: &str, partial: Fields) -> SyncResult<()> {
        let mut inner = self.lock();
        inner.check_write(collection)?;
        let Some(doc) = inner
            .docs
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Err(SyncError::write(collection, format!("no document {id} to update")));
        };
        doc.fields.extend(partial);
        inner.emit_collection(collection);
        Ok(())
    }

    fn delete(&self, collection: CollectionId, id: &str) -> SyncResult<()> {
        let mut inner = self.lock();
        inner.check_write(collection)?;
        if let Some(docs) = inner.docs.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        inner.emit_collection(collection);
        Ok(())
    }

    fn get_profile(&self) -> SyncResult<Option<Fields>> {
        let inner = self.lock();
        if !inner.signed_in {
            return Err(SyncError::Authentication("not signed in".to_string()));
        }
        Ok(inner.profile.clone())
    }

    fn set_profile(&self, fields: Fields) -> SyncResult<()> {
        let mut inner = self.lock();
        inner.check_write(CollectionId::UserProfile)?;
        inner.profile = Some(fields);
        inner.emit_profile();
        Ok(())
    }

    fn subscribe_collection(
        &self,
        collection: CollectionId,
        generation: u64,
        tx: Sender<Delta>,
    ) -> SyncResult<Subscription> {
        let mut inner = self.lock();
        if inner.failing_subscriptions.contains(&collection) {
            return Err(SyncError::subscription(collection, "missing or insufficient permissions"));
        }
        let documents = inner.docs.get(&collection).cloned().unwrap_or_default();
        let _ = tx.send(Delta::Snapshot {
            generation,
            collection,
            documents,
        });
        let subscription = Subscription::new();
        inner.watchers.push(Watcher {
            target: Target::Collection(collection),
            generation,
            tx,
            stop: subscription.stop_flag(),
        });
        Ok(subscription)
    }

    fn subscribe_profile(&self, generation: u64, tx: Sender<Delta>) -> SyncResult<Subscription> {
        let mut inner = self.lock();
        if inner.failing_subscriptions.contains(&CollectionId::UserProfile) {
            return Err(SyncError::subscription(
                CollectionId::UserProfile,
                "missing or insufficient permissions",
            ));
        }
        let _ = tx.send(Delta::ProfileSnapshot {
            generation,
            fields: inner.profile.clone(),
        });
        let subscription = Subscription::new();
        inner.watchers.push(Watcher {
            target: Target::Profile,
            generation,
            tx,
            stop: subscription.stop_flag(),
        });
        Ok(subscription)
    }

    fn watch_auth(&self, generation: u64, tx: Sender<Delta>) -> Subscription {
        let subscription = Subscription::new();
        self.lock().watchers.push(Watcher {
            target: Target::Auth,
            generation,
            tx,
            stop: subscription.stop_flag(),
        });
        subscription
    }
}

/// Hands out one shared `MemoryStore` and counts connection attempts.
#[derive(Debug)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            attempts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing(store: Arc<MemoryStore>) -> Self {
        let connector = Self::new(store);
        connector.fail.store(true, Ordering::SeqCst);
        connector
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(&self, config: &StoreConfig) -> SyncResult<Arc<dyn DocumentStore>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Configuration(format!(
                "could not initialize project {:?}",
                config.project_id
            )));
        }
        let store: Arc<dyn DocumentStore> = self.store.clone();
        Ok(store)
    }
}
