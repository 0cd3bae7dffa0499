//! Persisted registry layout and the storage seam.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::PERSISTED_STATE_VERSION;
use crate::invariants::InvariantViolation;
use crate::npc::{Npc, NpcError};
use crate::player::PlayerId;
use crate::session::GameSession;

/// Everything needed to rebuild a registry after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub sessions: Vec<GameSession>,
    #[serde(default)]
    pub archived: Vec<GameSession>,
    #[serde(default)]
    pub npcs: Vec<Npc>,
    /// Next NPC id to hand out; keeps ids of deleted NPCs retired.
    #[serde(default = "first_npc_id")]
    pub npc_next_id: PlayerId,
}

const fn first_npc_id() -> PlayerId {
    PlayerId(-1)
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: PERSISTED_STATE_VERSION,
            sessions: Vec::new(),
            archived: Vec::new(),
            npcs: Vec::new(),
            npc_next_id: first_npc_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("persisted state version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("two open sessions share the name `{0}`")]
    DuplicateSession(String),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Npc(#[from] NpcError),
}

/// Save/load seam for registry state.
/// Platform-specific implementations should provide this
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a full registry snapshot, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save(&self, state: &PersistedState) -> Result<(), Self::Error>;

    /// Load the last saved snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read.
    fn load(&self) -> Result<Option<PersistedState>, Self::Error>;
}

/// Keeps the serialized snapshot in memory. Going through JSON keeps it
/// honest about what survives a real restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON of the last save.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl SessionStore for MemoryStore {
    type Error = serde_json::Error;

    fn save(&self, state: &PersistedState) -> Result<(), Self::Error> {
        let json = serde_json::to_string(state)?;
        *self.slot.lock() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>, Self::Error> {
        self.slot
            .lock()
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}
