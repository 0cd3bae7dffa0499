//! End-of-day win detection.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::player::PlayerId;
use crate::roles::{Role, RoleAssignment, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinCheck {
    Continue,
    Victory(Team),
}

/// Living head-count per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamCounts {
    pub crew: usize,
    pub saboteurs: usize,
}

impl TeamCounts {
    #[must_use]
    pub const fn total(self) -> usize {
        self.crew + self.saboteurs
    }
}

/// Count living players per team. Players missing from the assignment count
/// as crew.
#[must_use]
pub fn team_counts(living: &BTreeSet<PlayerId>, roles: &RoleAssignment) -> TeamCounts {
    living
        .iter()
        .fold(TeamCounts::default(), |mut counts, player| {
            match roles.get(player).copied().map_or(Team::Crew, Role::team) {
                Team::Crew => counts.crew += 1,
                Team::Saboteur => counts.saboteurs += 1,
            }
            counts
        })
}

/// Decide whether a team has won.
///
/// Crew wins when no saboteur is left alive; that check runs first. Saboteurs
/// win at parity or better (`2 * saboteurs >= total`). An empty living roster
/// never produces a winner.
#[must_use]
pub fn evaluate(living: &BTreeSet<PlayerId>, roles: &RoleAssignment) -> WinCheck {
    let counts = team_counts(living, roles);
    if counts.total() == 0 {
        log::warn!("win check ran against an empty living roster");
        return WinCheck::Continue;
    }
    if counts.saboteurs == 0 {
        return WinCheck::Victory(Team::Crew);
    }
    if counts.saboteurs * 2 >= counts.total() {
        return WinCheck::Victory(Team::Saboteur);
    }
    WinCheck::Continue
}
