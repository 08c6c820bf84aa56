//! Identity and Live/Demo mode ownership.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::SyncResult;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unresolved,
    Live(Identity),
    Demo,
}

/// Initializes a store connection from a parsed configuration. No sign-in yet.
pub trait StoreConnector {
    fn connect(&self, config: &StoreConfig) -> SyncResult<Arc<dyn DocumentStore>>;
}

/// The single mode-resolution event consumed by collections and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeResolution {
    pub mode: Mode,
    pub identity: Option<Identity>,
    pub generation: u64,
}

pub struct ConnectionSupervisor {
    state: ConnectionState,
    generation: u64,
    store: Option<Arc<dyn DocumentStore>>,
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Unresolved,
            generation: 0,
            store: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        self.store.clone()
    }

    pub fn current(&self) -> Option<ModeResolution> {
        match &self.state {
            ConnectionState::Unresolved => None,
            ConnectionState::Live(identity) => Some(ModeResolution {
                mode: Mode::Live,
                identity: Some(identity.clone()),
                generation: self.generation,
            }),
            ConnectionState::Demo => Some(ModeResolution {
                mode: Mode::Demo,
                identity: None,
                generation: self.generation,
            }),
        }
    }

    /// Resolve once. Later calls return the standing resolution untouched.
    pub fn resolve_mode(
        &mut self,
        connector: &dyn StoreConnector,
        raw_config: Option<&str>,
        token: Option<&str>,
    ) -> ModeResolution {
        if let Some(resolved) = self.current() {
            return resolved;
        }

        let config = match StoreConfig::parse(raw_config) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "store config not found or invalid, running in demo mode");
                return self.settle_demo();
            }
        };

        let store = match connector.connect(&config) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(error = %err, "store initialization failed");
                return self.settle_demo();
            }
        };

        match store.sign_in(token) {
            Ok(identity) => {
                tracing::info!(uid = %identity.uid, "signed in, live mode");
                self.generation += 1;
                self.state = ConnectionState::Live(identity.clone());
                self.store = Some(store);
                ModeResolution {
                    mode: Mode::Live,
                    identity: Some(identity),
                    generation: self.generation,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sign-in failed");
                self.settle_demo()
            }
        }
    }

    /// Live -> Demo on auth loss. None if not live.
    pub fn demote(&mut self) -> Option<ModeResolution> {
        if !matches!(self.state, ConnectionState::Live(_)) {
            return None;
        }
        tracing::warn!("authentication lost, demoting to demo mode");
        self.store = None;
        self.settle_demo_inner();
        self.current()
    }

    fn settle_demo(&mut self) -> ModeResolution {
        self.settle_demo_inner();
        ModeResolution {
            mode: Mode::Demo,
            identity: None,
            generation: self.generation,
        }
    }

    fn settle_demo_inner(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Demo;
    }
}
