use std::collections::VecDeque;
use std::time::Instant;

use chrono::{Datelike, Local};

use crate::collections::Collections;
use crate::debounce::DebouncedFieldSync;
use crate::dispatch::{Tab, ViewRefreshDispatcher};
use crate::entity::{CollectionId, Document, Fields, GAMES, VodClip};
use crate::genai::AssistantTopic;
use crate::session::LiveSession;
use crate::supervisor::{Identity, Mode};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
    SetProfile,
}

impl WriteOp {
    pub fn label(self) -> &'static str {
        match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
            WriteOp::SetProfile => "save",
        }
    }
}

/// Everything background threads can tell the event loop.
///
/// Store-originated variants carry the generation they were produced under;
/// anything from a superseded generation is dropped on arrival.
#[derive(Debug, Clone)]
pub enum Delta {
    Snapshot {
        generation: u64,
        collection: CollectionId,
        documents: Vec<Document>,
    },
    ProfileSnapshot {
        generation: u64,
        fields: Option<Fields>,
    },
    SubscriptionFailed {
        generation: u64,
        collection: CollectionId,
        error: String,
    },
    AuthChanged {
        generation: u64,
        identity: Option<Identity>,
    },
    WriteAcked {
        generation: u64,
        collection: CollectionId,
        op: WriteOp,
        id: String,
    },
    WriteFailed {
        generation: u64,
        collection: CollectionId,
        op: WriteOp,
        id: String,
        error: String,
    },
    AssistantReply {
        request_id: u64,
        text: String,
    },
    Log(String),
}

#[derive(Debug, Clone, Default)]
pub struct AssistantPanel {
    pub next_request: u64,
    pub pending: Option<u64>,
    pub topic: Option<AssistantTopic>,
    pub text: String,
}

impl AssistantPanel {
    pub fn begin(&mut self, topic: AssistantTopic) -> u64 {
        self.next_request += 1;
        self.pending = Some(self.next_request);
        self.topic = Some(topic);
        self.text = "Thinking...".to_string();
        self.next_request
    }

    /// Replies overwrite whatever is shown; the latest request clears the spinner.
    pub fn receive(&mut self, request_id: u64, text: String) {
        if self.pending == Some(request_id) {
            self.pending = None;
        }
        self.text = text;
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: Mode,
    pub identity: Option<Identity>,
    pub generation: u64,
    pub tab: Tab,
    pub(crate) collections: Collections,
    pub live_session: Option<LiveSession>,
    pub vod_loaded: Option<String>,
    pub notes: DebouncedFieldSync,
    pub refresh: ViewRefreshDispatcher,
    pub calendar_year: i32,
    pub calendar_month: u32,
    pub tracker_game: String,
    pub assistant: AssistantPanel,
    pub logs: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let today = Local::now().date_naive();
        Self {
            mode: Mode::Demo,
            identity: None,
            generation: 0,
            tab: Tab::Calendar,
            collections: Collections::new(),
            live_session: None,
            vod_loaded: None,
            notes: DebouncedFieldSync::notes(),
            refresh: ViewRefreshDispatcher::new(),
            calendar_year: today.year(),
            calendar_month: today.month(),
            tracker_game: GAMES[0].id.to_string(),
            assistant: AssistantPanel::default(),
            logs: VecDeque::with_capacity(MAX_LOGS),
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn status_label(&self) -> String {
        match (&self.mode, &self.identity) {
            (Mode::Live, Some(identity)) => {
                let short: String = identity.uid.chars().take(6).collect();
                format!("Online (User: {short})")
            }
            _ => "Offline (Demo Mode)".to_string(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
        // The console is visible on every tab.
        self.refresh.request_full();
    }

    pub fn log_info(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!("{msg}");
        self.push_log(format!("[INFO] {msg}"));
    }

    pub fn log_warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.push_log(format!("[WARN] {msg}"));
    }

    pub fn navigate(&mut self, tab: Tab) {
        self.tab = tab;
        self.refresh.request_full();
    }

    pub fn notify_changed(&mut self, collection: CollectionId) -> bool {
        let tab = self.tab;
        self.refresh.notify(tab, collection)
    }

    /// Reset path shared by initial resolution and demotion.
    pub(crate) fn enter_mode(&mut self, mode: Mode, identity: Option<Identity>, generation: u64) {
        self.mode = mode;
        self.identity = identity;
        self.generation = generation;
        self.collections.reset_to_seed();
        self.unload_vod();
        self.refresh.request_full();
    }

    /// Whether a store-originated delta belongs to the current live generation.
    pub fn accepts(&self, generation: u64) -> bool {
        self.mode == Mode::Live && generation == self.generation
    }

    pub fn loaded_clip(&self) -> Option<&VodClip> {
        let id = self.vod_loaded.as_deref()?;
        self.collections.vod_library().find(id)
    }

    pub(crate) fn load_vod(&mut self, id: Option<String>) {
        self.notes.track(id.clone());
        self.vod_loaded = id;
    }

    pub(crate) fn unload_vod(&mut self) {
        self.load_vod(None);
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Snapshot {
            generation,
            collection,
            documents,
        } => {
            if !state.accepts(generation) {
                tracing::debug!(%collection, generation, "stale snapshot dropped");
                return;
            }
            state.collections.apply_snapshot(collection, &documents);
            if collection == CollectionId::VodLibrary
                && state.vod_loaded.is_some()
                && state.loaded_clip().is_none()
            {
                state.unload_vod();
            }
            state.notify_changed(collection);
        }
        Delta::ProfileSnapshot { generation, fields } => {
            if !state.accepts(generation) {
                return;
            }
            state.collections.apply_profile(fields.as_ref());
            state.notify_changed(CollectionId::UserProfile);
        }
        Delta::SubscriptionFailed {
            generation,
            collection,
            error,
        } => {
            if !state.accepts(generation) {
                return;
            }
            state.log_warn(format!("Error loading {collection}: {error}"));
        }
        Delta::AuthChanged {
            generation,
            identity: Some(identity),
        } => {
            if state.accepts(generation) {
                state.identity = Some(identity);
                state.refresh.request_full();
            }
        }
        // Demotion tears down subscriptions, so SyncHub owns it.
        Delta::AuthChanged { identity: None, .. } => {}
        Delta::WriteAcked {
            generation,
            collection,
            op,
            id,
        } => {
            if !state.accepts(generation) {
                return;
            }
            if collection == CollectionId::VodLibrary
                && op == WriteOp::Update
                && state.notes.tracked() == Some(id.as_str())
            {
                state.notes.mark_saved(Instant::now());
                if state.tab.depends_on(collection) {
                    state.refresh.request_full();
                }
            }
        }
        Delta::WriteFailed {
            generation,
            collection,
            op,
            id,
            error,
        } => {
            if generation != state.generation {
                return;
            }
            state.log_warn(format!(
                "Error on {} {collection}/{id}: {error}",
                op.label()
            ));
        }
        Delta::AssistantReply { request_id, text } => {
            state.assistant.receive(request_id, text);
            if state.tab == Tab::Assistant {
                state.refresh.request_full();
            }
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
