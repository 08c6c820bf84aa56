//! Uniform create/update/delete entry point for both modes.
//!
//! Live forwards to the store worker and leaves local state alone: the change
//! comes back through the subscription. Demo mutates the local collections
//! and notifies the refresh dispatcher itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;

use chrono::Utc;
use serde_json::Value;

use crate::entity::{CollectionId, Document, Fields, Moment, UserProfile};
use crate::error::{SyncError, SyncResult};
use crate::state::AppState;
use crate::store::{StoreCommand, new_document_id};
use crate::supervisor::Mode;

static DEMO_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local id for demo entities. The sequence keeps ids unique within one millisecond.
pub fn demo_id() -> String {
    let seq = DEMO_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("demo-{}-{seq}", Utc::now().timestamp_millis())
}

#[derive(Debug, Clone)]
enum Target {
    Demo,
    Live(Sender<StoreCommand>),
}

#[derive(Debug, Clone)]
pub struct DualModeWriter {
    target: Target,
}

impl Default for DualModeWriter {
    fn default() -> Self {
        Self::demo()
    }
}

impl DualModeWriter {
    pub fn demo() -> Self {
        Self {
            target: Target::Demo,
        }
    }

    pub fn live(commands: Sender<StoreCommand>) -> Self {
        Self {
            target: Target::Live(commands),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.target {
            Target::Demo => Mode::Demo,
            Target::Live(_) => Mode::Live,
        }
    }

    /// Returns the new entity's id.
    pub fn create(
        &self,
        state: &mut AppState,
        collection: CollectionId,
        mut fields: Fields,
    ) -> SyncResult<String> {
        match &self.target {
            Target::Live(commands) => {
                let id = new_document_id();
                send(
                    commands,
                    collection,
                    StoreCommand::Create {
                        collection,
                        id: id.clone(),
                        fields,
                    },
                )?;
                Ok(id)
            }
            Target::Demo => {
                let id = demo_id();
                if let Some(field) = collection.moment_field() {
                    fields.insert(field.to_string(), Value::from(Moment::now().encode()));
                }
                state
                    .collections
                    .insert_local(collection, &Document::new(id.clone(), fields));
                state.notify_changed(collection);
                Ok(id)
            }
        }
    }

    /// Partial merge. Demo updates of unknown ids are ignored.
    pub fn update(
        &self,
        state: &mut AppState,
        collection: CollectionId,
        id: &str,
        partial: Fields,
    ) -> SyncResult<()> {
        match &self.target {
            Target::Live(commands) => send(
                commands,
                collection,
                StoreCommand::Update {
                    collection,
                    id: id.to_string(),
                    fields: partial,
                },
            ),
            Target::Demo => {
                if state.collections.merge_local(collection, id, &partial) {
                    state.notify_changed(collection);
                }
                Ok(())
            }
        }
    }

    pub fn delete(&self, state: &mut AppState, collection: CollectionId, id: &str) -> SyncResult<()> {
        match &self.target {
            Target::Live(commands) => send(
                commands,
                collection,
                StoreCommand::Delete {
                    collection,
                    id: id.to_string(),
                },
            ),
            Target::Demo => {
                if state.collections.remove_local(collection, id) {
                    state.notify_changed(collection);
                }
                Ok(())
            }
        }
    }

    /// Overwrites the whole profile document.
    pub fn save_profile(&self, state: &mut AppState, profile: &UserProfile) -> SyncResult<()> {
        match &self.target {
            Target::Live(commands) => send(
                commands,
                CollectionId::UserProfile,
                StoreCommand::SetProfile {
                    fields: profile.to_fields(),
                },
            ),
            Target::Demo => {
                state.collections.replace_profile(profile.clone());
                state.notify_changed(CollectionId::UserProfile);
                Ok(())
            }
        }
    }
}

fn send(commands: &Sender<StoreCommand>, collection: CollectionId, cmd: StoreCommand) -> SyncResult<()> {
    commands
        .send(cmd)
        .map_err(|_| SyncError::write(collection, "store worker is not running"))
}
