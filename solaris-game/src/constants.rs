//! Centralized balance and tuning constants for Solaris game logic.
//!
//! These values define the default role balance for the core engine. Every
//! default can be overridden through [`crate::GameConfig`], but the numbers
//! here are what a freshly created registry plays with.

/// Smallest roster that may be started.
pub const DEFAULT_MIN_PLAYERS: usize = 3;
/// Share of the roster, in percent, that plays for the saboteur team.
pub const DEFAULT_MINORITY_PCT: u32 = 25;
/// Roster size that unlocks the Security Officer.
pub const SECURITY_OFFICER_MIN_PLAYERS: usize = 6;
/// Roster size that unlocks the Engineer.
pub const ENGINEER_MIN_PLAYERS: usize = 8;

/// Version tag written into persisted state.
pub const PERSISTED_STATE_VERSION: u32 = 1;

/// Domain tag mixed into per-session role-assignment seeds.
pub(crate) const ROLE_SEED_DOMAIN: &[u8] = b"solaris.roles";

/// Longest accepted session name, in characters.
pub const MAX_SESSION_NAME_LEN: usize = 64;
