//! Single owner of the synchronized state and every live resource.
//!
//! Background threads only ever send `Delta`s; the event loop hands them to
//! `apply`, and user actions come in through the action methods. Mode
//! transitions happen inside `activate`, so they are serialized with both.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use chrono::Local;
use serde_json::Value;

use crate::calendar::is_valid_date;
use crate::config::AppConfig;
use crate::dispatch::Tab;
use crate::entity::{CollectionId, EventKind, Fields, PlayerCard, UserProfile};
use crate::error::{SyncError, SyncResult};
use crate::genai::{self, AssistantRequest, AssistantTopic, topic_options};
use crate::session::{self, LiveSession};
use crate::state::{AppState, Delta, apply_delta};
use crate::store::{Subscription, spawn_store_worker};
use crate::supervisor::{ConnectionSupervisor, Mode, ModeResolution, StoreConnector};
use crate::vod::youtube_embed_url;
use crate::writer::DualModeWriter;

type ChangeListener = Box<dyn FnMut(CollectionId, &AppState)>;

pub struct SyncHub {
    state: AppState,
    supervisor: ConnectionSupervisor,
    writer: DualModeWriter,
    subscriptions: Vec<Subscription>,
    tx: Sender<Delta>,
    listeners: Vec<ChangeListener>,
    assistant: Option<Sender<AssistantRequest>>,
}

impl SyncHub {
    pub fn new(tx: Sender<Delta>) -> Self {
        Self {
            state: AppState::new(),
            supervisor: ConnectionSupervisor::new(),
            writer: DualModeWriter::demo(),
            subscriptions: Vec::new(),
            tx,
            listeners: Vec::new(),
            assistant: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// View-local fields (calendar month, selected game, ...) only; collections
    /// stay reachable through the writer alone.
    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    pub fn attach_assistant(&mut self, requests: Sender<AssistantRequest>) {
        self.assistant = Some(requests);
    }

    /// Callback per collection change, after the change is applied.
    pub fn on_change(&mut self, listener: impl FnMut(CollectionId, &AppState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Resolves the mode once and activates it. Later calls are no-ops that
    /// return the standing resolution.
    pub fn start(&mut self, connector: &dyn StoreConnector, config: &AppConfig) -> ModeResolution {
        if let Some(resolved) = self.supervisor.current() {
            return resolved;
        }
        let resolution = self.supervisor.resolve_mode(
            connector,
            config.store_config.as_deref(),
            config.auth_token.as_deref(),
        );
        self.activate(resolution.clone());
        resolution
    }

    fn activate(&mut self, resolution: ModeResolution) {
        // Old listeners stop before the new generation starts.
        self.subscriptions.clear();
        self.writer = DualModeWriter::demo();
        self.state
            .enter_mode(resolution.mode, resolution.identity.clone(), resolution.generation);

        let store = match (resolution.mode, self.supervisor.store()) {
            (Mode::Live, Some(store)) => store,
            _ => {
                self.state.log_info("Running in Demo Mode. Changes stay on this machine.");
                self.fan_out();
                return;
            }
        };

        let generation = resolution.generation;
        if let Some(identity) = &resolution.identity {
            self.state.log_info(format!("Connected. Signed in as {}", identity.uid));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel();
        spawn_store_worker(store.clone(), generation, cmd_rx, self.tx.clone());
        self.writer = DualModeWriter::live(cmd_tx);

        self.subscriptions
            .push(store.watch_auth(generation, self.tx.clone()));
        for collection in CollectionId::LISTS {
            match store.subscribe_collection(collection, generation, self.tx.clone()) {
                Ok(sub) => self.subscriptions.push(sub),
                Err(err) => self.state.log_warn(format!("Error loading {collection}: {err}")),
            }
        }
        match store.subscribe_profile(generation, self.tx.clone()) {
            Ok(sub) => self.subscriptions.push(sub),
            Err(err) => self.state.log_warn(format!("Error loading profile: {err}")),
        }
        self.fan_out();
    }

    /// Live -> Demo after the session is lost.
    pub fn demote(&mut self) {
        if let Some(resolution) = self.supervisor.demote() {
            self.state
                .log_warn("Signed out. Switching to Demo Mode.");
            self.activate(resolution);
        }
    }

    pub fn apply(&mut self, delta: Delta) {
        match delta {
            Delta::AuthChanged {
                generation,
                identity: None,
            } => {
                if self.state.accepts(generation) {
                    self.demote();
                }
            }
            other => apply_delta(&mut self.state, other),
        }
        self.fan_out();
    }

    /// Applies everything already queued. Returns how many deltas were applied.
    pub fn drain(&mut self, rx: &Receiver<Delta>) -> usize {
        let mut applied = 0;
        while let Ok(delta) = rx.try_recv() {
            self.apply(delta);
            applied += 1;
        }
        applied
    }

    /// Fires a due notes write and expires the saved indicator.
    pub fn tick(&mut self, now: Instant) {
        if let Some(write) = self.state.notes.poll(now) {
            let mut partial = Fields::new();
            partial.insert(write.field.to_string(), Value::from(write.value));
            let result = self.writer.update(
                &mut self.state,
                CollectionId::VodLibrary,
                &write.entity_id,
                partial,
            );
            match result {
                // Live acks arrive later as a delta.
                Ok(()) if self.writer.mode() == Mode::Demo => self.state.notes.mark_saved(now),
                Ok(()) => {}
                Err(err) => self.state.log_warn(format!("Error saving notes: {err}")),
            }
            self.redraw_if(Tab::Vod);
        }
        if self.state.notes.expire_indicator(now) {
            self.redraw_if(Tab::Vod);
        }
        self.fan_out();
    }

    pub fn take_redraw(&mut self) -> bool {
        self.state.refresh.take_redraw()
    }

    pub fn navigate(&mut self, tab: Tab) {
        self.state.navigate(tab);
    }

    pub fn add_event(&mut self, title: &str, date: &str, kind: &str) -> SyncResult<String> {
        let result = self.try_add_event(title, date, kind);
        self.settle(result)
    }

    fn try_add_event(&mut self, title: &str, date: &str, kind: &str) -> SyncResult<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation("event title is required".to_string()));
        }
        if !is_valid_date(date) {
            return Err(SyncError::Validation(format!("'{date}' is not a YYYY-MM-DD date")));
        }
        let mut fields = Fields::new();
        fields.insert("title".into(), Value::from(title));
        fields.insert("date".into(), Value::from(date.trim()));
        fields.insert("type".into(), Value::from(EventKind::parse(kind).as_str()));
        self.writer.create(&mut self.state, CollectionId::Events, fields)
    }

    pub fn add_social_link(&mut self, platform: &str, username: &str) -> SyncResult<String> {
        let result = if username.trim().is_empty() || platform.trim().is_empty() {
            Err(SyncError::Validation("platform and username are required".to_string()))
        } else {
            let mut fields = Fields::new();
            fields.insert("platform".into(), Value::from(platform.trim()));
            fields.insert("username".into(), Value::from(username.trim()));
            self.writer.create(&mut self.state, CollectionId::SocialLinks, fields)
        };
        self.settle(result)
    }

    pub fn unlink_social(&mut self, id: &str) -> SyncResult<()> {
        let result = self.writer.delete(&mut self.state, CollectionId::SocialLinks, id);
        self.settle(result)
    }

    pub fn save_profile(&mut self, profile: UserProfile) -> SyncResult<()> {
        let result = self.writer.save_profile(&mut self.state, &profile);
        if result.is_ok() {
            self.state.log_info("Profile saved.");
        }
        self.settle(result)
    }

    /// Blank usernames unlink the game.
    pub fn set_game_account(&mut self, game_id: &str, username: &str) -> SyncResult<()> {
        let mut profile = self.state.collections().profile().clone();
        if username.trim().is_empty() {
            profile.game_accounts.remove(game_id);
        } else {
            profile
                .game_accounts
                .insert(game_id.to_string(), username.trim().to_string());
        }
        self.save_profile(profile)
    }

    pub fn set_player_card(&mut self, game_id: &str, card: PlayerCard) -> SyncResult<()> {
        let mut profile = self.state.collections().profile().clone();
        profile.player_card.insert(game_id.to_string(), card);
        self.save_profile(profile)
    }

    pub fn add_vod(&mut self, url: &str, title: &str, game: &str) -> SyncResult<String> {
        let result = self.try_add_vod(url, title, game);
        self.settle(result)
    }

    fn try_add_vod(&mut self, url: &str, title: &str, game: &str) -> SyncResult<String> {
        let embed_url = youtube_embed_url(url)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation("clip title is required".to_string()));
        }
        let mut fields = Fields::new();
        fields.insert("url".into(), Value::from(url.trim()));
        fields.insert("embedUrl".into(), Value::from(embed_url));
        fields.insert("title".into(), Value::from(title));
        fields.insert("game".into(), Value::from(game));
        fields.insert("notes".into(), Value::from(""));
        self.writer.create(&mut self.state, CollectionId::VodLibrary, fields)
    }

    /// Deleting the loaded clip clears the reviewer and drops its pending notes write.
    pub fn delete_vod(&mut self, id: &str) -> SyncResult<()> {
        if self.state.vod_loaded.as_deref() == Some(id) {
            self.state.unload_vod();
            self.redraw_if(Tab::Vod);
        }
        let result = self.writer.delete(&mut self.state, CollectionId::VodLibrary, id);
        self.settle(result)
    }

    pub fn load_vod(&mut self, id: &str) -> SyncResult<()> {
        if self.state.collections().vod_library().find(id).is_none() {
            return self.settle(Err(SyncError::Validation(format!("no clip {id}"))));
        }
        self.state.load_vod(Some(id.to_string()));
        self.redraw_if(Tab::Vod);
        Ok(())
    }

    /// One keystroke's worth of notes. False when no clip is loaded.
    pub fn edit_vod_notes(&mut self, value: impl Into<String>, now: Instant) -> bool {
        self.state.notes.on_edit(value, now)
    }

    pub fn start_session(&mut self, game: &str, mode: &str) -> SyncResult<()> {
        let result = if self.state.live_session.is_some() {
            Err(SyncError::Validation("a session is already running".to_string()))
        } else if mode.trim().is_empty() {
            Err(SyncError::Validation("game mode is required".to_string()))
        } else {
            self.state.live_session = Some(LiveSession::start(game, mode.trim(), Local::now()));
            self.redraw_if(Tab::Tracker);
            Ok(())
        };
        self.settle(result)
    }

    pub fn add_quick_note(&mut self, text: &str) -> bool {
        let added = self
            .state
            .live_session
            .as_mut()
            .is_some_and(|s| s.add_note(text, Local::now()));
        if added {
            self.redraw_if(Tab::Tracker);
        }
        added
    }

    pub fn record_win(&mut self) {
        self.with_session(LiveSession::record_win);
    }

    pub fn record_loss(&mut self) {
        self.with_session(LiveSession::record_loss);
    }

    pub fn undo_win(&mut self) {
        self.with_session(LiveSession::undo_win);
    }

    pub fn undo_loss(&mut self) {
        self.with_session(LiveSession::undo_loss);
    }

    fn with_session(&mut self, f: impl FnOnce(&mut LiveSession)) {
        if let Some(session) = self.state.live_session.as_mut() {
            f(session);
            self.redraw_if(Tab::Tracker);
        }
    }

    /// Promotes the running session to a performance entry.
    pub fn finish_session(&mut self) -> SyncResult<String> {
        let result = match self.state.live_session.take() {
            None => Err(SyncError::Validation("no session is running".to_string())),
            Some(session) => {
                self.redraw_if(Tab::Tracker);
                self.writer
                    .create(&mut self.state, CollectionId::PerformanceLog, session.into_fields())
            }
        };
        if result.is_ok() {
            self.state.log_info("Session saved.");
        }
        self.settle(result)
    }

    pub fn discard_session(&mut self) {
        if self.state.live_session.take().is_some() {
            self.redraw_if(Tab::Tracker);
        }
    }

    pub fn simulate_auto_session(&mut self) -> SyncResult<String> {
        let fields = session::simulate_auto_session(
            self.state.collections().profile(),
            &mut rand::thread_rng(),
            Local::now(),
        );
        let result = match fields {
            None => Err(SyncError::Validation(
                "link your Rocket League username on the Profile tab first".to_string(),
            )),
            Some(fields) => self
                .writer
                .create(&mut self.state, CollectionId::PerformanceLog, fields),
        };
        self.settle(result)
    }

    pub fn ask_vod_feedback(&mut self) -> SyncResult<u64> {
        let prompt = match self.state.loaded_clip() {
            Some(clip) => genai::vod_feedback_prompt(clip),
            None => Err(SyncError::Validation("load a clip first".to_string())),
        };
        self.ask(AssistantTopic::VodFeedback, prompt)
    }

    pub fn ask_social_post(&mut self) -> SyncResult<u64> {
        let prompt = match self.state.loaded_clip() {
            Some(clip) => genai::social_post_prompt(clip),
            None => Err(SyncError::Validation("load a clip first".to_string())),
        };
        self.ask(AssistantTopic::SocialPost, prompt)
    }

    pub fn ask_training_plan(&mut self, game_id: &str, goal: &str) -> SyncResult<u64> {
        self.ask(AssistantTopic::TrainingPlan, genai::training_plan_prompt(game_id, goal))
    }

    pub fn ask_news(&mut self, game_id: Option<&str>) -> SyncResult<u64> {
        self.ask(AssistantTopic::News, Ok(genai::news_prompt(game_id)))
    }

    pub fn ask_meta(&mut self, game_id: &str) -> SyncResult<u64> {
        self.ask(AssistantTopic::Meta, Ok(genai::meta_prompt(game_id)))
    }

    pub fn ask_tournaments(&mut self, game_id: &str) -> SyncResult<u64> {
        self.ask(AssistantTopic::Tournaments, Ok(genai::tournaments_prompt(game_id)))
    }

    pub fn ask_lfg(&mut self, game_id: &str) -> SyncResult<u64> {
        let prompt = genai::lfg_prompt(self.state.collections().profile(), game_id);
        self.ask(AssistantTopic::LfgPost, prompt)
    }

    fn ask(&mut self, topic: AssistantTopic, prompt: SyncResult<String>) -> SyncResult<u64> {
        let prompt = match prompt {
            Ok(prompt) => prompt,
            Err(err) => return self.settle(Err(err)),
        };
        let request_id = self.state.assistant.begin(topic);
        let request = AssistantRequest {
            request_id,
            topic,
            prompt,
            options: topic_options(topic),
        };
        let sent = self
            .assistant
            .as_ref()
            .is_some_and(|requests| requests.send(request).is_ok());
        if !sent {
            self.state.assistant.receive(
                request_id,
                "Error: Could not fetch response. Assistant is not running.".to_string(),
            );
        }
        self.redraw_if(Tab::Assistant);
        Ok(request_id)
    }

    fn redraw_if(&mut self, tab: Tab) {
        if self.state.tab == tab {
            self.state.refresh.request_full();
        }
    }

    /// Logs a failed action to the console and hands the result back.
    fn settle<T>(&mut self, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(err) = &result {
            self.state.log_warn(err.to_string());
        }
        self.fan_out();
        result
    }

    fn fan_out(&mut self) {
        let changes = self.state.refresh.drain_changes();
        if self.listeners.is_empty() {
            return;
        }
        for collection in changes {
            for listener in &mut self.listeners {
                listener(collection, &self.state);
            }
        }
    }
}
