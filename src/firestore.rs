//! Firestore REST binding with Identity Toolkit auth.
//!
//! Listeners are poller threads: the first listing is fetched synchronously so
//! a failing subscription surfaces at subscribe time, and after that a snapshot
//! is emitted only when the listing changes. Tokens live in memory only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use reqwest::blocking::RequestBuilder;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::config::StoreConfig;
use crate::entity::{CollectionId, Document, Fields};
use crate::error::{SyncError, SyncResult};
use crate::http_client::http_client;
use crate::state::Delta;
use crate::store::{DocumentStore, Subscription, collection_path, profile_path};
use crate::supervisor::{Identity, StoreConnector};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const PAGE_SIZE: u32 = 300;
/// Refresh this long before the id token expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);
const STOP_CHECK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
struct Session {
    id_token: String,
    refresh_token: String,
    uid: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    local_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

enum Outcome {
    Body(Value),
    NotFound,
}

struct AuthWatcher {
    generation: u64,
    tx: Sender<Delta>,
    stop: Arc<AtomicBool>,
}

struct Inner {
    config: StoreConfig,
    app_id: String,
    poll_interval: Duration,
    session: Mutex<Option<Session>>,
    auth_watchers: Mutex<Vec<AuthWatcher>>,
    auth_lost: AtomicBool,
}

#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<Inner>,
}

impl FirestoreStore {
    pub fn new(config: StoreConfig, app_id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                app_id: app_id.into(),
                poll_interval,
                session: Mutex::new(None),
                auth_watchers: Mutex::new(Vec::new()),
                auth_lost: AtomicBool::new(false),
            }),
        }
    }
}

impl Inner {
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id,
            self.config.database()
        )
    }

    fn doc_url(&self, path: &str) -> String {
        format!("{FIRESTORE_URL}/{}/{path}", self.documents_root())
    }

    fn store_session(&self, session: Session) -> Identity {
        let identity = Identity {
            uid: session.uid.clone(),
        };
        *self.session.lock().expect("session lock poisoned") = Some(session);
        self.auth_lost.store(false, Ordering::SeqCst);
        identity
    }

    fn sign_in(&self, token: Option<&str>) -> SyncResult<Identity> {
        let client = http_client()?;
        let (endpoint, body) = match token {
            Some(token) => (
                "accounts:signInWithCustomToken",
                json!({ "token": token, "returnSecureToken": true }),
            ),
            None => ("accounts:signUp", json!({ "returnSecureToken": true })),
        };
        let resp = client
            .post(format!("{IDENTITY_URL}/{endpoint}"))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|err| SyncError::Authentication(format!("sign-in request failed: {err}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|err| SyncError::Authentication(format!("sign-in body unreadable: {err}")))?;
        if !status.is_success() {
            return Err(SyncError::Authentication(format!(
                "sign-in rejected ({status}): {}",
                error_message(&text)
            )));
        }
        let parsed: SignInResponse = serde_json::from_str(&text)
            .map_err(|err| SyncError::Authentication(format!("invalid sign-in response: {err}")))?;
        Ok(self.store_session(Session {
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            uid: parsed.local_id,
            expires_at: expiry(parsed.expires_in.as_deref()),
        }))
    }

    fn refresh(&self, refresh_token: &str) -> SyncResult<Session> {
        let client = http_client()?;
        let resp = client
            .post(SECURE_TOKEN_URL)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .map_err(|err| SyncError::Authentication(format!("token refresh failed: {err}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "token refresh rejected ({status}): {}",
                error_message(&text)
            )));
        }
        let parsed: RefreshResponse = resp
            .json()
            .map_err(|err| SyncError::Authentication(format!("invalid refresh response: {err}")))?;
        Ok(Session {
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            uid: parsed.user_id,
            expires_at: expiry(parsed.expires_in.as_deref()),
        })
    }

    fn bearer(&self) -> SyncResult<String> {
        let current = self.session.lock().expect("session lock poisoned").clone();
        let Some(session) = current else {
            return Err(SyncError::Authentication("not signed in".to_string()));
        };
        if Instant::now() + TOKEN_SLACK < session.expires_at {
            return Ok(session.id_token);
        }
        let fresh = self.refresh(&session.refresh_token)?;
        let token = fresh.id_token.clone();
        self.store_session(fresh);
        Ok(token)
    }

    /// Signals every auth watcher once per lost session.
    fn signal_auth_lost(&self) {
        if self.auth_lost.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.session.lock().expect("session lock poisoned") = None;
        let mut watchers = self.auth_watchers.lock().expect("auth watchers lock poisoned");
        watchers.retain(|w| !w.stop.load(Ordering::SeqCst));
        for watcher in watchers.iter() {
            let _ = watcher.tx.send(Delta::AuthChanged {
                generation: watcher.generation,
                identity: None,
            });
        }
    }

    fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> SyncResult<Outcome> {
        let token = match self.bearer() {
            Ok(token) => token,
            Err(err) => {
                self.signal_auth_lost();
                return Err(err);
            }
        };
        let url = request_url(url, query)?;
        let client = http_client()?;
        let mut req: RequestBuilder = client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let text = resp.text().context("failed reading body")?;
        match status {
            StatusCode::NOT_FOUND => Ok(Outcome::NotFound),
            StatusCode::UNAUTHORIZED => {
                self.signal_auth_lost();
                Err(SyncError::Authentication(error_message(&text)))
            }
            s if s.is_success() => {
                if text.trim().is_empty() {
                    return Ok(Outcome::Body(Value::Null));
                }
                let value = serde_json::from_str(&text).context("invalid store json")?;
                Ok(Outcome::Body(value))
            }
            s => Err(anyhow!("http {s}: {}", error_message(&text)).into()),
        }
    }

    fn list(&self, collection: CollectionId) -> SyncResult<Vec<Document>> {
        let base = self.doc_url(&collection_path(&self.app_id, collection));
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query = list_query(page_token.as_deref());
            let body = match self.execute(Method::GET, &base, &query, None)? {
                Outcome::Body(body) => body,
                // Collections spring into existence on first write.
                Outcome::NotFound => break,
            };
            if let Some(list) = body.get("documents").and_then(Value::as_array) {
                documents.extend(list.iter().filter_map(decode_document));
            }
            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(documents)
    }

    fn read_profile(&self) -> SyncResult<Option<Fields>> {
        let url = self.doc_url(&profile_path(&self.app_id));
        match self.execute(Method::GET, &url, &[], None)? {
            Outcome::NotFound => Ok(None),
            Outcome::Body(body) => Ok(decode_document(&body).map(|doc| doc.fields)),
        }
    }
}

impl DocumentStore for FirestoreStore {
    fn sign_in(&self, token: Option<&str>) -> SyncResult<Identity> {
        self.inner.sign_in(token)
    }

    fn create(&self, collection: CollectionId, id: &str, fields: Fields) -> SyncResult<()> {
        let inner = &self.inner;
        let name = format!(
            "{}/{}/{id}",
            inner.documents_root(),
            collection_path(&inner.app_id, collection)
        );
        let mut write = json!({
            "update": { "name": name, "fields": encode_fields(&fields) },
            "currentDocument": { "exists": false },
        });
        if let Some(field) = collection.moment_field() {
            write["updateTransforms"] =
                json!([{ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }]);
        }
        let url = format!("{FIRESTORE_URL}/{}:commit", inner.documents_root());
        inner
            .execute(Method::POST, &url, &[], Some(json!({ "writes": [write] })))
            .map_err(|err| as_write(err, collection))?;
        Ok(())
    }

    fn update(&self, collection: CollectionId, id: &str, partial: Fields) -> SyncResult<()> {
        let inner = &self.inner;
        let url = inner.doc_url(&format!("{}/{id}", collection_path(&inner.app_id, collection)));
        let query = update_query(&partial);
        let body = json!({ "fields": encode_fields(&partial) });
        match inner
            .execute(Method::PATCH, &url, &query, Some(body))
            .map_err(|err| as_write(err, collection))?
        {
            Outcome::NotFound => Err(SyncError::write(collection, format!("no document {id} to update"))),
            Outcome::Body(_) => Ok(()),
        }
    }

    fn delete(&self, collection: CollectionId, id: &str) -> SyncResult<()> {
        let inner = &self.inner;
        let url = inner.doc_url(&format!("{}/{id}", collection_path(&inner.app_id, collection)));
        inner
            .execute(Method::DELETE, &url, &[], None)
            .map_err(|err| as_write(err, collection))?;
        Ok(())
    }

    fn get_profile(&self) -> SyncResult<Option<Fields>> {
        self.inner.read_profile()
    }

    fn set_profile(&self, fields: Fields) -> SyncResult<()> {
        let inner = &self.inner;
        let url = inner.doc_url(&profile_path(&inner.app_id));
        inner
            .execute(Method::PATCH, &url, &[], Some(json!({ "fields": encode_fields(&fields) })))
            .map_err(|err| as_write(err, CollectionId::UserProfile))?;
        Ok(())
    }

    fn subscribe_collection(
        &self,
        collection: CollectionId,
        generation: u64,
        tx: Sender<Delta>,
    ) -> SyncResult<Subscription> {
        let first = self
            .inner
            .list(collection)
            .map_err(|err| as_subscription(err, collection))?;
        let _ = tx.send(Delta::Snapshot {
            generation,
            collection,
            documents: first.clone(),
        });
        let subscription = Subscription::new();
        let stop = subscription.stop_flag();
        let inner = self.inner.clone();
        thread::spawn(move || {
            let listener = Listener {
                stop,
                collection,
                generation,
                tx,
            };
            poll_loop(
                &inner,
                &listener,
                first,
                |inner| inner.list(collection),
                |documents| Delta::Snapshot {
                    generation,
                    collection,
                    documents,
                },
            )
        });
        Ok(subscription)
    }

    fn subscribe_profile(&self, generation: u64, tx: Sender<Delta>) -> SyncResult<Subscription> {
        let first = self
            .inner
            .read_profile()
            .map_err(|err| as_subscription(err, CollectionId::UserProfile))?;
        let _ = tx.send(Delta::ProfileSnapshot {
            generation,
            fields: first.clone(),
        });
        let subscription = Subscription::new();
        let stop = subscription.stop_flag();
        let inner = self.inner.clone();
        thread::spawn(move || {
            let listener = Listener {
                stop,
                collection: CollectionId::UserProfile,
                generation,
                tx,
            };
            poll_loop(
                &inner,
                &listener,
                first,
                Inner::read_profile,
                |fields| Delta::ProfileSnapshot { generation, fields },
            )
        });
        Ok(subscription)
    }

    fn watch_auth(&self, generation: u64, tx: Sender<Delta>) -> Subscription {
        let subscription = Subscription::new();
        self.inner
            .auth_watchers
            .lock()
            .expect("auth watchers lock poisoned")
            .push(AuthWatcher {
                generation,
                tx,
                stop: subscription.stop_flag(),
            });
        subscription
    }
}

/// Where a poller thread reports, and the flag that retires it.
struct Listener {
    stop: Arc<AtomicBool>,
    collection: CollectionId,
    generation: u64,
    tx: Sender<Delta>,
}

impl Listener {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Re-fetches on the poll interval and emits only on change. One warning per
/// failure streak; an auth failure ends the listener.
fn poll_loop<T, F, M>(inner: &Inner, listener: &Listener, mut last: T, fetch: F, make: M)
where
    T: PartialEq + Clone,
    F: Fn(&Inner) -> SyncResult<T>,
    M: Fn(T) -> Delta,
{
    let mut failing = false;
    loop {
        let wake = Instant::now() + inner.poll_interval;
        while Instant::now() < wake {
            if listener.stopped() {
                return;
            }
            thread::sleep(STOP_CHECK);
        }
        if listener.stopped() {
            return;
        }
        match fetch(inner) {
            Ok(current) => {
                failing = false;
                if current != last {
                    last = current.clone();
                    if listener.tx.send(make(current)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                let auth_lost = err.is_auth_loss();
                if !failing {
                    failing = true;
                    tracing::warn!(collection = %listener.collection, error = %err, "listener poll failed");
                    let _ = listener.tx.send(Delta::SubscriptionFailed {
                        generation: listener.generation,
                        collection: listener.collection,
                        error: err.to_string(),
                    });
                }
                if auth_lost {
                    return;
                }
            }
        }
    }
}

/// Resolves `url` with `query` percent-encoded onto it.
pub fn request_url(url: &str, query: &[(&str, String)]) -> SyncResult<Url> {
    let mut parsed = Url::parse(url).context("invalid store url")?;
    if !query.is_empty() {
        parsed.query_pairs_mut().extend_pairs(query);
    }
    Ok(parsed)
}

pub fn list_query(page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }
    query
}

/// Update-only precondition plus one mask entry per touched field.
pub fn update_query(partial: &Fields) -> Vec<(&'static str, String)> {
    let mut query = vec![("currentDocument.exists", "true".to_string())];
    query.extend(
        partial
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.clone())),
    );
    query
}

fn as_write(err: SyncError, collection: CollectionId) -> SyncError {
    match err {
        SyncError::Transport(e) => SyncError::write(collection, format!("{e:#}")),
        other => other,
    }
}

fn as_subscription(err: SyncError, collection: CollectionId) -> SyncError {
    match err {
        auth @ SyncError::Authentication(_) => auth,
        other => SyncError::subscription(collection, other.to_string()),
    }
}

fn expiry(expires_in: Option<&str>) -> Instant {
    let secs = expires_in
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(3600);
    Instant::now() + Duration::from_secs(secs)
}

/// Pulls `error.message` out of a Google API error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Typed Firestore value to plain JSON. Timestamps become RFC 3339 strings.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "doubleValue" => inner.clone(),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        "geoPointValue" => inner.clone(),
        _ => Value::Null,
    }
}

fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Document resource to `{ id, fields }`; the id is the last path segment.
pub fn decode_document(doc: &Value) -> Option<Document> {
    let name = doc.get("name").and_then(Value::as_str)?;
    let id = name.rsplit('/').next().filter(|id| !id.is_empty())?;
    Some(Document::new(id, decode_fields(doc.get("fields"))))
}

/// Builds a `FirestoreStore` per parsed configuration. No network until sign-in.
#[derive(Debug, Clone)]
pub struct FirestoreConnector {
    app_id: String,
    poll_interval: Duration,
}

impl FirestoreConnector {
    pub fn new(app_id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            app_id: app_id.into(),
            poll_interval,
        }
    }
}

impl StoreConnector for FirestoreConnector {
    fn connect(&self, config: &StoreConfig) -> SyncResult<Arc<dyn DocumentStore>> {
        if config.project_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "store config missing projectId".to_string(),
            ));
        }
        tracing::info!(project = %config.project_id, database = config.database(), "connecting to store");
        let store: Arc<dyn DocumentStore> =
            Arc::new(FirestoreStore::new(config.clone(), self.app_id.clone(), self.poll_interval));
        Ok(store)
    }
}
