//! Session registry: the single owner of every live session.
//!
//! Sessions sit behind their own mutex so unrelated games never contend.
//! Each operation looks up the session handle, releases the map, then holds
//! the session lock for the whole validate-and-mutate step. Lock order is
//! always map shard, then session, then archive.
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::GameConfig;
use crate::constants::{PERSISTED_STATE_VERSION, ROLE_SEED_DOMAIN};
use crate::effects::Effect;
use crate::error::{Action, GameError};
use crate::invariants::check_invariants;
use crate::ledger::VoteValue;
use crate::npc::{Npc, NpcError, NpcRoster};
use crate::player::{PlayerId, Requester};
use crate::session::{GameSession, Phase, session_key};
use crate::storage::{PersistedState, RestoreError, SessionStore};

type SessionHandle = Arc<Mutex<GameSession>>;

/// Snapshot of a session right after a committed action, plus the effects
/// the collaborator should reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub session: GameSession,
    pub effects: Vec<Effect>,
}

/// Derive the role-assignment seed for one session.
#[must_use]
pub fn derive_session_seed(registry_seed: u64, session_name: &str) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&registry_seed.to_le_bytes())
        .expect("64-bit seed is valid key");
    mac.update(ROLE_SEED_DOMAIN);
    mac.update(session_key(session_name).as_bytes());
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

pub struct SessionRegistry {
    config: GameConfig,
    seed: u64,
    sessions: DashMap<String, SessionHandle>,
    archive: Mutex<Vec<GameSession>>,
    npcs: Mutex<NpcRoster>,
}

impl SessionRegistry {
    /// Registry with an entropy-drawn seed.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Registry whose role assignments are reproducible for `seed`.
    #[must_use]
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            sessions: DashMap::new(),
            archive: Mutex::new(Vec::new()),
            npcs: Mutex::new(NpcRoster::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    fn handle(&self, name: &str) -> Result<SessionHandle, GameError> {
        self.sessions
            .get(&session_key(name))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GameError::UnknownSession {
                session: name.trim().to_string(),
            })
    }

    fn apply<F>(&self, name: &str, action: F) -> Result<ActionOutcome, GameError>
    where
        F: FnOnce(&mut GameSession) -> Result<Vec<Effect>, GameError>,
    {
        let handle = self.handle(name)?;
        let mut session = handle.lock();
        let effects = action(&mut session)?;
        Ok(ActionOutcome {
            session: session.clone(),
            effects,
        })
    }

    /// Open a signup. A name held by an ended session is reused; the ended
    /// session moves to the archive.
    ///
    /// # Errors
    ///
    /// `InvalidSessionName`, or `DuplicateSessionName` while a session with
    /// the same name is still in signup or active.
    pub fn create(&self, name: &str, creator: PlayerId) -> Result<ActionOutcome, GameError> {
        let (session, effects) = GameSession::create(name, creator)?;
        match self.sessions.entry(session.key()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().lock().phase() != Phase::Ended {
                    return Err(GameError::DuplicateSessionName {
                        session: session.name().to_string(),
                    });
                }
                let previous = occupied.insert(Arc::new(Mutex::new(session.clone())));
                let previous = previous.lock().clone();
                log::info!("archived ended session `{}` to reuse its name", previous.name());
                self.archive.lock().push(previous);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(session.clone())));
            }
        }
        Ok(ActionOutcome { session, effects })
    }

    /// # Errors
    ///
    /// `UnknownSession` plus any error from [`GameSession::join`].
    pub fn join(&self, name: &str, player: PlayerId) -> Result<ActionOutcome, GameError> {
        self.apply(name, |session| session.join(player))
    }

    /// # Errors
    ///
    /// `UnknownSession` plus any error from [`GameSession::leave`].
    pub fn leave(&self, name: &str, player: PlayerId) -> Result<ActionOutcome, GameError> {
        self.apply(name, |session| session.leave(player))
    }

    /// Start a session with roles drawn from its derived seed.
    ///
    /// # Errors
    ///
    /// `UnknownSession` plus any error from [`GameSession::start`].
    pub fn start(&self, name: &str, requester: Requester) -> Result<ActionOutcome, GameError> {
        self.apply(name, |session| {
            let mut rng =
                ChaCha20Rng::seed_from_u64(derive_session_seed(self.seed, session.name()));
            session.start(requester, &self.config, &mut rng)
        })
    }

    /// # Errors
    ///
    /// `UnknownSession` plus any error from [`GameSession::cast_vote`].
    pub fn cast_vote(
        &self,
        name: &str,
        voter: PlayerId,
        value: VoteValue,
    ) -> Result<ActionOutcome, GameError> {
        self.apply(name, |session| session.cast_vote(voter, value))
    }

    /// # Errors
    ///
    /// `UnknownSession` plus any error from [`GameSession::end_day`].
    pub fn end_day(&self, name: &str, requester: Requester) -> Result<ActionOutcome, GameError> {
        self.apply(name, |session| session.end_day(requester))
    }

    /// Current snapshot of one session.
    ///
    /// # Errors
    ///
    /// `UnknownSession` if no open session has that name.
    pub fn get(&self, name: &str) -> Result<GameSession, GameError> {
        Ok(self.handle(name)?.lock().clone())
    }

    /// Snapshots of every open session, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<GameSession> {
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        let mut sessions: Vec<(String, GameSession)> = handles
            .into_iter()
            .map(|(key, handle)| {
                let session = handle.lock().clone();
                (key, session)
            })
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions.into_iter().map(|(_, session)| session).collect()
    }

    /// Move an ended session out of the open set.
    ///
    /// # Errors
    ///
    /// `UnknownSession`, or `WrongPhase` while the session is still running.
    pub fn archive(&self, name: &str) -> Result<GameSession, GameError> {
        let key = session_key(name);
        let removed = self
            .sessions
            .remove_if(&key, |_, handle| handle.lock().phase() == Phase::Ended);
        if let Some((_, handle)) = removed {
            let session = handle.lock().clone();
            log::info!("archived session `{}`", session.name());
            self.archive.lock().push(session.clone());
            return Ok(session);
        }
        let session = self.get(name)?;
        Err(GameError::WrongPhase {
            session: session.name().to_string(),
            phase: session.phase(),
            action: Action::Archive,
        })
    }

    /// Archived sessions, oldest first.
    #[must_use]
    pub fn archived(&self) -> Vec<GameSession> {
        self.archive.lock().clone()
    }

    /// Register a synthetic player.
    ///
    /// # Errors
    ///
    /// Any error from [`NpcRoster::create`].
    pub fn create_npc(&self, name: &str, persona: Option<&str>) -> Result<Npc, NpcError> {
        self.npcs.lock().create(name, persona).cloned()
    }

    /// Remove an NPC and pull it out of every signup it had joined.
    ///
    /// # Errors
    ///
    /// `UnknownNpc` if no NPC has that name.
    pub fn delete_npc(&self, name: &str) -> Result<(Npc, Vec<Effect>), NpcError> {
        let npc = self.npcs.lock().delete(name)?;
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut effects = Vec::new();
        for handle in handles {
            let mut session = handle.lock();
            if session.phase() == Phase::Signup && session.has_joined(npc.id) {
                effects.extend(session.leave(npc.id).unwrap_or_default());
            }
        }
        Ok((npc, effects))
    }

    #[must_use]
    pub fn npc(&self, name: &str) -> Option<Npc> {
        self.npcs.lock().get_by_name(name).cloned()
    }

    #[must_use]
    pub fn npc_by_id(&self, id: PlayerId) -> Option<Npc> {
        self.npcs.lock().get(id).cloned()
    }

    /// NPCs in creation order.
    #[must_use]
    pub fn npcs(&self) -> Vec<Npc> {
        self.npcs.lock().list().into_iter().cloned().collect()
    }

    /// Full lossless snapshot for persistence.
    #[must_use]
    pub fn snapshot(&self) -> PersistedState {
        let (npcs, npc_next_id) = {
            let roster = self.npcs.lock();
            (
                roster.list().into_iter().cloned().collect(),
                roster.next_id(),
            )
        };
        PersistedState {
            version: PERSISTED_STATE_VERSION,
            sessions: self.list(),
            archived: self.archived(),
            npcs,
            npc_next_id,
        }
    }

    /// Rebuild a registry from a snapshot, checking every session first.
    ///
    /// # Errors
    ///
    /// `UnsupportedVersion` for a foreign layout, `Invariant` for a session
    /// that fails [`check_invariants`], `DuplicateSession` for two open
    /// sessions sharing a name, `Npc` for a broken NPC list.
    pub fn restore(
        config: GameConfig,
        seed: u64,
        state: PersistedState,
    ) -> Result<Self, RestoreError> {
        if state.version != PERSISTED_STATE_VERSION {
            return Err(RestoreError::UnsupportedVersion {
                found: state.version,
                expected: PERSISTED_STATE_VERSION,
            });
        }
        let mut keys = BTreeSet::new();
        for session in state.sessions.iter().chain(&state.archived) {
            check_invariants(session)?;
        }
        for session in &state.sessions {
            if !keys.insert(session.key()) {
                return Err(RestoreError::DuplicateSession(session.name().to_string()));
            }
        }

        let registry = Self::with_seed(config, seed);
        *registry.npcs.lock() = NpcRoster::restore(state.npcs, state.npc_next_id)?;
        *registry.archive.lock() = state.archived;
        let restored = state.sessions.len();
        for session in state.sessions {
            registry
                .sessions
                .insert(session.key(), Arc::new(Mutex::new(session)));
        }
        log::info!("restored {restored} open sessions");
        Ok(registry)
    }

    /// Snapshot and save in one step.
    ///
    /// # Errors
    ///
    /// Any error from the store.
    pub fn save_to<S: SessionStore + ?Sized>(&self, store: &S) -> Result<(), S::Error> {
        store.save(&self.snapshot())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}
