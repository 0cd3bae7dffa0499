//! Solaris Game Engine
//!
//! Platform-agnostic core for the Solaris social-deduction game: crew versus
//! saboteurs, one discussion-and-vote cycle per day. This crate holds the
//! session state machine, vote ledgers, tally, win evaluation and role
//! assignment without any chat-platform dependencies. Transitions return the
//! effects a platform should reflect; a [`Collaborator`] carries them out.

pub mod config;
pub mod constants;
pub mod effects;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod npc;
pub mod player;
pub mod registry;
pub mod roles;
pub mod session;
pub mod storage;
pub mod tally;
pub mod win;

// Re-export commonly used types
pub use config::{ConfigError, GameConfig};
pub use effects::{
    Announcement, Collaborator, DispatchReport, Effect, PrivateNotice, dispatch_effects,
};
pub use error::{Action, GameError};
pub use invariants::{InvariantViolation, check_invariants};
pub use ledger::{LedgerError, VoteLedger, VoteValue};
pub use npc::{Npc, NpcError, NpcRoster};
pub use player::{PlayerId, Requester};
pub use registry::{ActionOutcome, SessionRegistry, derive_session_seed};
pub use roles::{
    Ability, DistributionPolicy, Role, RoleAssignment, RoleDistribution, SpecialistUnlock, Team,
    assign_roles, members_of,
};
pub use session::{Elimination, GameSession, Phase, session_key};
pub use storage::{MemoryStore, PersistedState, RestoreError, SessionStore};
pub use tally::{TallyReason, TallyResult, TiedPlayers, resolve, tally_votes};
pub use win::{TeamCounts, WinCheck, evaluate, team_counts};
