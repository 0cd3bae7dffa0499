//! Vote tally and elimination resolution.
//!
//! Turns a day's ledger into a full result record. The record keeps every
//! bucket (per-target counts, abstains, vetoes, tied players) so that
//! announcements and tests can tell a tie from a no-vote day.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ledger::{VoteLedger, VoteValue};
use crate::player::PlayerId;

/// Players sharing the top count; ties rarely involve more than a handful.
pub type TiedPlayers = SmallVec<[PlayerId; 4]>;

/// Why a day ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyReason {
    /// A single player held the strict top count.
    Elimination,
    /// Two or more players shared the top count.
    Tie,
    /// Nobody voted for a player and nobody abstained.
    NoVotes,
    /// Abstains outnumbered every player's count.
    MajorityAbstain,
}

impl TallyReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elimination => "elimination",
            Self::Tie => "tie",
            Self::NoVotes => "no_votes",
            Self::MajorityAbstain => "majority_abstain",
        }
    }
}

impl fmt::Display for TallyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub eliminated: Option<PlayerId>,
    pub reason: TallyReason,
    /// Votes received per targeted player.
    pub votes: BTreeMap<PlayerId, u32>,
    pub abstain: u32,
    pub veto: u32,
    /// Highest count any player received.
    pub top_count: u32,
    /// Players holding `top_count` (one entry on an elimination).
    #[serde(default)]
    pub leaders: TiedPlayers,
}

impl TallyResult {
    #[must_use]
    pub fn votes_for(&self, player: PlayerId) -> u32 {
        self.votes.get(&player).copied().unwrap_or(0)
    }

    /// Votes that counted toward the decision (targets plus abstains).
    #[must_use]
    pub fn counted(&self) -> u32 {
        self.votes.values().sum::<u32>() + self.abstain
    }
}

/// Tally a ledger against the living roster.
///
/// Vetoes drop out of every bucket. Entries whose voter or target is not in
/// `living` are skipped. Ties never break: two or more players at the top
/// count means nobody is eliminated.
#[must_use]
pub fn resolve(ledger: &VoteLedger, living: &BTreeSet<PlayerId>) -> TallyResult {
    tally_votes(ledger.iter(), living)
}

/// Core tally over any vote sequence; order does not affect the result.
pub fn tally_votes<I>(votes: I, living: &BTreeSet<PlayerId>) -> TallyResult
where
    I: IntoIterator<Item = (PlayerId, VoteValue)>,
{
    let mut counts: BTreeMap<PlayerId, u32> = BTreeMap::new();
    let mut abstain = 0u32;
    let mut veto = 0u32;

    for (voter, value) in votes {
        if !living.contains(&voter) {
            continue;
        }
        match value {
            VoteValue::Player(target) if living.contains(&target) => {
                *counts.entry(target).or_default() += 1;
            }
            VoteValue::Player(_) => {}
            VoteValue::Abstain => abstain += 1,
            VoteValue::Veto => veto += 1,
        }
    }

    let top_count = counts.values().copied().max().unwrap_or(0);
    let leaders: TiedPlayers = if top_count == 0 {
        TiedPlayers::new()
    } else {
        counts
            .iter()
            .filter(|(_, count)| **count == top_count)
            .map(|(player, _)| *player)
            .collect()
    };

    let reason = if abstain > top_count {
        TallyReason::MajorityAbstain
    } else if counts.is_empty() {
        TallyReason::NoVotes
    } else if leaders.len() > 1 {
        TallyReason::Tie
    } else {
        TallyReason::Elimination
    };

    let eliminated = match reason {
        TallyReason::Elimination => leaders.first().copied(),
        TallyReason::Tie | TallyReason::NoVotes | TallyReason::MajorityAbstain => None,
    };

    TallyResult {
        eliminated,
        reason,
        votes: counts,
        abstain,
        veto,
        top_count,
        leaders,
    }
}
