//! Synthetic players driven by the harness rather than a human.
//!
//! NPCs carry negative ids so they can never collide with platform user ids.
//! Ids count down from -1 and are never reused, including across a restart.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::MAX_SESSION_NAME_LEN;
use crate::player::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NpcError {
    #[error("an NPC named `{0}` already exists")]
    DuplicateName(String),
    #[error("no NPC named `{0}`")]
    UnknownNpc(String),
    #[error("`{0}` is not a usable NPC name")]
    InvalidName(String),
    #[error("NPC id {0} is already taken")]
    DuplicateId(PlayerId),
    #[error("{0} is not a synthetic NPC id")]
    InvalidId(PlayerId),
    #[error("no synthetic ids are left to allocate")]
    IdsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub id: PlayerId,
    pub name: String,
    pub persona: String,
}

impl Npc {
    #[must_use]
    pub fn default_persona(name: &str) -> String {
        format!("An NPC player named {name}")
    }
}

#[derive(Debug, Clone)]
pub struct NpcRoster {
    by_id: BTreeMap<PlayerId, Npc>,
    next_id: i64,
}

impl Default for NpcRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl NpcRoster {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_id: BTreeMap::new(),
            next_id: -1,
        }
    }

    /// Rebuild from persisted NPCs. Allocation resumes at `next_id` or below
    /// the lowest surviving id, whichever is lower, so ids of deleted NPCs
    /// stay retired.
    ///
    /// # Errors
    ///
    /// `DuplicateName` or `DuplicateId` if two persisted NPCs collide,
    /// `InvalidId` for an id outside the synthetic range.
    pub fn restore(
        npcs: impl IntoIterator<Item = Npc>,
        next_id: PlayerId,
    ) -> Result<Self, NpcError> {
        let mut roster = Self::new();
        roster.next_id = roster.next_id.min(next_id.get());
        for npc in npcs {
            if !npc.id.is_synthetic() {
                return Err(NpcError::InvalidId(npc.id));
            }
            if roster.by_id.contains_key(&npc.id) {
                return Err(NpcError::DuplicateId(npc.id));
            }
            if roster.get_by_name(&npc.name).is_some() {
                return Err(NpcError::DuplicateName(npc.name));
            }
            let below = npc
                .id
                .get()
                .checked_sub(1)
                .ok_or(NpcError::InvalidId(npc.id))?;
            roster.next_id = roster.next_id.min(below);
            roster.by_id.insert(npc.id, npc);
        }
        Ok(roster)
    }

    /// Id the next created NPC will receive.
    #[must_use]
    pub const fn next_id(&self) -> PlayerId {
        PlayerId(self.next_id)
    }

    /// Register a new NPC. A blank persona falls back to the default text.
    ///
    /// # Errors
    ///
    /// `InvalidName` for blank, overlong or whitespace-containing names;
    /// `DuplicateName` when the name is taken (case-insensitive);
    /// `IdsExhausted` once the synthetic range is used up.
    pub fn create(&mut self, name: &str, persona: Option<&str>) -> Result<&Npc, NpcError> {
        let name = name.trim();
        if name.is_empty()
            || name.chars().count() > MAX_SESSION_NAME_LEN
            || name.chars().any(char::is_whitespace)
        {
            return Err(NpcError::InvalidName(name.to_string()));
        }
        if self.get_by_name(name).is_some() {
            return Err(NpcError::DuplicateName(name.to_string()));
        }
        let id = PlayerId(self.next_id);
        self.next_id = self.next_id.checked_sub(1).ok_or(NpcError::IdsExhausted)?;
        let persona = persona
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map_or_else(|| Npc::default_persona(name), str::to_string);
        log::info!("created NPC `{name}` as {id}");
        Ok(self.by_id.entry(id).or_insert(Npc {
            id,
            name: name.to_string(),
            persona,
        }))
    }

    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Npc> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Npc> {
        let name = name.trim();
        self.by_id
            .values()
            .find(|npc| npc.name.eq_ignore_ascii_case(name))
    }

    /// Remove an NPC by name, returning it.
    ///
    /// # Errors
    ///
    /// `UnknownNpc` if no NPC has that name.
    pub fn delete(&mut self, name: &str) -> Result<Npc, NpcError> {
        let id = self
            .get_by_name(name)
            .map(|npc| npc.id)
            .ok_or_else(|| NpcError::UnknownNpc(name.trim().to_string()))?;
        let npc = self
            .by_id
            .remove(&id)
            .ok_or_else(|| NpcError::UnknownNpc(name.trim().to_string()))?;
        log::info!("deleted NPC `{}` ({})", npc.name, npc.id);
        Ok(npc)
    }

    /// NPCs in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<&Npc> {
        self.by_id.values().rev().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
