//! Per-day vote ledger.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::player::PlayerId;

/// What a voter put on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    /// Vote to eliminate this player.
    Player(PlayerId),
    /// Vote for no elimination.
    Abstain,
    /// Opt out of the tally entirely.
    Veto,
}

impl VoteValue {
    #[must_use]
    pub const fn target(self) -> Option<PlayerId> {
        match self {
            Self::Player(target) => Some(target),
            Self::Abstain | Self::Veto => None,
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(target) => write!(f, "{target}"),
            Self::Abstain => f.write_str("abstain"),
            Self::Veto => f.write_str("veto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{player} is not eligible to vote on day {day}")]
    NotALivingPlayer { player: PlayerId, day: u32 },
    #[error("ledger for day {day} is frozen")]
    Frozen { day: u32 },
}

/// Votes cast during one day. One entry per voter; a newer vote replaces the
/// older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteLedger {
    pub(crate) day: u32,
    pub(crate) votes: BTreeMap<PlayerId, VoteValue>,
    #[serde(default)]
    pub(crate) frozen: bool,
}

impl VoteLedger {
    /// Open an empty ledger for `day`.
    #[must_use]
    pub const fn open(day: u32) -> Self {
        Self {
            day,
            votes: BTreeMap::new(),
            frozen: false,
        }
    }

    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    #[must_use]
    pub fn vote_of(&self, voter: PlayerId) -> Option<VoteValue> {
        self.votes.get(&voter).copied()
    }

    /// Iterate `(voter, vote)` pairs in voter order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, VoteValue)> + '_ {
        self.votes.iter().map(|(voter, value)| (*voter, *value))
    }

    /// Record `value` for `voter`, replacing any earlier vote.
    ///
    /// # Errors
    ///
    /// `Frozen` once the day has ended; `NotALivingPlayer` when `voter` is
    /// not in `living`.
    pub fn cast_vote(
        &mut self,
        voter: PlayerId,
        value: VoteValue,
        living: &BTreeSet<PlayerId>,
    ) -> Result<&Self, LedgerError> {
        if self.frozen {
            return Err(LedgerError::Frozen { day: self.day });
        }
        if !living.contains(&voter) {
            return Err(LedgerError::NotALivingPlayer {
                player: voter,
                day: self.day,
            });
        }
        self.votes.insert(voter, value);
        Ok(self)
    }

    /// Mark the ledger immutable.
    ///
    /// # Errors
    ///
    /// `Frozen` if it was already frozen.
    pub fn freeze(&mut self) -> Result<(), LedgerError> {
        if self.frozen {
            return Err(LedgerError::Frozen { day: self.day });
        }
        self.frozen = true;
        Ok(())
    }
}

impl FromIterator<(PlayerId, VoteValue)> for VoteLedger {
    /// Build an open day-1 ledger straight from votes, bypassing eligibility
    /// checks. Useful for replaying persisted or synthetic ledgers.
    fn from_iter<I: IntoIterator<Item = (PlayerId, VoteValue)>>(iter: I) -> Self {
        Self {
            day: 1,
            votes: iter.into_iter().collect(),
            frozen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn living(ids: &[i64]) -> BTreeSet<PlayerId> {
        ids.iter().copied().map(PlayerId).collect()
    }

    #[test]
    fn second_vote_replaces_first() {
        let alive = living(&[1, 2, 3]);
        let mut ledger = VoteLedger::open(1);
        ledger.cast_vote(PlayerId(1), VoteValue::Player(PlayerId(2)), &alive).unwrap();
        ledger.cast_vote(PlayerId(1), VoteValue::Abstain, &alive).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.vote_of(PlayerId(1)), Some(VoteValue::Abstain));
    }

    #[test]
    fn outsiders_cannot_vote() {
        let alive = living(&[1, 2]);
        let mut ledger = VoteLedger::open(3);
        let err = ledger.cast_vote(PlayerId(9), VoteValue::Veto, &alive).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotALivingPlayer {
                player: PlayerId(9),
                day: 3
            }
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn frozen_ledger_rejects_votes() {
        let alive = living(&[1, 2]);
        let mut ledger = VoteLedger::open(2);
        ledger.cast_vote(PlayerId(1), VoteValue::Abstain, &alive).unwrap();
        ledger.freeze().unwrap();
        assert!(ledger.is_frozen());
        assert_eq!(
            ledger.cast_vote(PlayerId(2), VoteValue::Abstain, &alive).unwrap_err(),
            LedgerError::Frozen { day: 2 }
        );
        assert_eq!(ledger.freeze().unwrap_err(), LedgerError::Frozen { day: 2 });
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn frozen_check_precedes_eligibility() {
        let mut ledger = VoteLedger::open(1);
        ledger.freeze().unwrap();
        let err = ledger
            .cast_vote(PlayerId(5), VoteValue::Veto, &BTreeSet::new())
            .unwrap_err();
        assert_eq!(err, LedgerError::Frozen { day: 1 });
    }

    #[test]
    fn vote_values_serialize_with_tags() {
        assert_eq!(
            serde_json::to_string(&VoteValue::Player(PlayerId(-2))).unwrap(),
            r#"{"player":-2}"#
        );
        assert_eq!(serde_json::to_string(&VoteValue::Veto).unwrap(), r#""veto""#);
    }
}
