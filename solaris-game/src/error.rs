//! Error kinds surfaced to the command layer.
//!
//! Every variant is local and recoverable. Each carries enough context
//! (session name, phase, offending player) for the command layer to render a
//! precise message without re-reading session state.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::player::PlayerId;
use crate::session::Phase;

/// Mutating actions accepted by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Join,
    Leave,
    Start,
    CastVote,
    EndDay,
    Archive,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Start => "start",
            Self::CastVote => "cast_vote",
            Self::EndDay => "end_day",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("session `{session}` is in {phase} phase; {action} is not allowed")]
    WrongPhase {
        session: String,
        phase: Phase,
        action: Action,
    },
    #[error("{player} is neither creator nor moderator of `{session}` and may not {action}")]
    NotAuthorized {
        session: String,
        player: PlayerId,
        action: Action,
    },
    #[error("{player} already joined `{session}`")]
    AlreadyJoined { session: String, player: PlayerId },
    #[error("{player} is not a living player of `{session}`")]
    NotALivingPlayer { session: String, player: PlayerId },
    #[error("`{session}` needs at least {required} players to start (has {joined})")]
    InsufficientPlayers {
        session: String,
        required: usize,
        joined: usize,
    },
    #[error("day {day} of `{session}` has ended; its ledger is frozen")]
    LedgerFrozen { session: String, day: u32 },
    #[error("no session named `{session}`")]
    UnknownSession { session: String },
    #[error("a session named `{session}` is already open")]
    DuplicateSessionName { session: String },
    #[error("{target} is not a living player of `{session}` and cannot be voted for")]
    InvalidVoteTarget { session: String, target: PlayerId },
    #[error("{player} has not joined `{session}`")]
    NotJoined { session: String, player: PlayerId },
    #[error("`{session}` is not a usable session name")]
    InvalidSessionName { session: String },
}

impl GameError {
    /// Session the error refers to.
    #[must_use]
    pub fn session(&self) -> &str {
        match self {
            Self::WrongPhase { session, .. }
            | Self::NotAuthorized { session, .. }
            | Self::AlreadyJoined { session, .. }
            | Self::NotALivingPlayer { session, .. }
            | Self::InsufficientPlayers { session, .. }
            | Self::LedgerFrozen { session, .. }
            | Self::UnknownSession { session }
            | Self::DuplicateSessionName { session }
            | Self::InvalidVoteTarget { session, .. }
            | Self::NotJoined { session, .. }
            | Self::InvalidSessionName { session } => session,
        }
    }

    /// Stable machine-readable kind, for logs and reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WrongPhase { .. } => "wrong_phase",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::AlreadyJoined { .. } => "already_joined",
            Self::NotALivingPlayer { .. } => "not_a_living_player",
            Self::InsufficientPlayers { .. } => "insufficient_players",
            Self::LedgerFrozen { .. } => "ledger_frozen",
            Self::UnknownSession { .. } => "unknown_session",
            Self::DuplicateSessionName { .. } => "duplicate_session_name",
            Self::InvalidVoteTarget { .. } => "invalid_vote_target",
            Self::NotJoined { .. } => "not_joined",
            Self::InvalidSessionName { .. } => "invalid_session_name",
        }
    }

    pub(crate) fn from_ledger(session: &str, err: LedgerError) -> Self {
        match err {
            LedgerError::NotALivingPlayer { player, .. } => Self::NotALivingPlayer {
                session: session.to_string(),
                player,
            },
            LedgerError::Frozen { day } => Self::LedgerFrozen {
                session: session.to_string(),
                day,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_gain_session_context() {
        let err = GameError::from_ledger("Nebula", LedgerError::Frozen { day: 2 });
        assert_eq!(
            err,
            GameError::LedgerFrozen {
                session: "Nebula".into(),
                day: 2
            }
        );
        assert_eq!(err.session(), "Nebula");
        assert_eq!(err.kind(), "ledger_frozen");
    }

    #[test]
    fn messages_name_phase_and_action() {
        let err = GameError::WrongPhase {
            session: "Nebula".into(),
            phase: Phase::Ended,
            action: Action::CastVote,
        };
        assert_eq!(
            err.to_string(),
            "session `Nebula` is in ended phase; cast_vote is not allowed"
        );
    }
}
