//! Role catalog and the team-balance role assignment engine.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{
    DEFAULT_MINORITY_PCT, ENGINEER_MIN_PLAYERS, SECURITY_OFFICER_MIN_PLAYERS,
};
use crate::player::PlayerId;

/// Team affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Honest majority.
    Crew,
    /// Deceptive minority.
    Saboteur,
}

impl Team {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crew => "crew",
            Self::Saboteur => "saboteur",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Special ability carried by a specialist crew role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Investigate,
    Protect,
}

/// Every role a player can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CrewMember,
    Saboteur,
    Specialist(Ability),
}

impl Role {
    #[must_use]
    pub const fn team(self) -> Team {
        match self {
            Self::CrewMember | Self::Specialist(_) => Team::Crew,
            Self::Saboteur => Team::Saboteur,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CrewMember => "Crew Member",
            Self::Saboteur => "Saboteur",
            Self::Specialist(Ability::Investigate) => "Security Officer",
            Self::Specialist(Ability::Protect) => "Engineer",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::CrewMember => "A loyal crew member. Work with others to find the saboteurs!",
            Self::Saboteur => {
                "An imposter trying to sabotage the mission. Coordinate with fellow saboteurs!"
            }
            Self::Specialist(Ability::Investigate) => {
                "A crew member with security training. Can investigate one player per night."
            }
            Self::Specialist(Ability::Protect) => {
                "A crew member who maintains ship systems. Can protect one player per night."
            }
        }
    }

    #[must_use]
    pub const fn ability(self) -> Option<Ability> {
        match self {
            Self::Specialist(ability) => Some(ability),
            Self::CrewMember | Self::Saboteur => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Player to role mapping, fixed when a session starts.
pub type RoleAssignment = BTreeMap<PlayerId, Role>;

/// A specialist slot that opens once the roster reaches `min_players`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistUnlock {
    pub ability: Ability,
    pub min_players: usize,
}

/// Monotone role-balance table keyed by roster size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPolicy {
    /// Saboteur share of the roster in percent, rounded up.
    #[serde(default = "DistributionPolicy::default_minority_pct")]
    pub minority_pct: u32,
    /// Specialist unlocks, granted in listed order while crew slots remain.
    #[serde(default = "DistributionPolicy::default_specialists")]
    pub specialists: Vec<SpecialistUnlock>,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self {
            minority_pct: Self::default_minority_pct(),
            specialists: Self::default_specialists(),
        }
    }
}

impl DistributionPolicy {
    const fn default_minority_pct() -> u32 {
        DEFAULT_MINORITY_PCT
    }

    fn default_specialists() -> Vec<SpecialistUnlock> {
        vec![
            SpecialistUnlock {
                ability: Ability::Investigate,
                min_players: SECURITY_OFFICER_MIN_PLAYERS,
            },
            SpecialistUnlock {
                ability: Ability::Protect,
                min_players: ENGINEER_MIN_PLAYERS,
            },
        ]
    }

    /// Saboteur count for a roster: `ceil(size * pct / 100)` clamped to
    /// `[1, size - 1]`.
    ///
    /// Rosters below two players have no valid split and yield zero; callers
    /// check the configured minimum before reaching this point.
    #[must_use]
    pub fn minority_count(&self, size: usize) -> usize {
        if size < 2 {
            return 0;
        }
        let pct = self.minority_pct as usize;
        let raw = (size * pct).div_ceil(100);
        raw.clamp(1, size - 1)
    }

    /// Full distribution for a roster size.
    #[must_use]
    pub fn distribution(&self, size: usize) -> RoleDistribution {
        let saboteurs = self.minority_count(size);
        let mut remaining = size - saboteurs;
        let mut specialists = Vec::new();
        for unlock in &self.specialists {
            if remaining == 0 {
                break;
            }
            if size >= unlock.min_players {
                specialists.push(unlock.ability);
                remaining -= 1;
            }
        }
        RoleDistribution {
            saboteurs,
            specialists,
            crew_members: remaining,
        }
    }
}

/// Role counts computed for one roster size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDistribution {
    pub saboteurs: usize,
    pub specialists: Vec<Ability>,
    pub crew_members: usize,
}

impl RoleDistribution {
    #[must_use]
    pub fn total(&self) -> usize {
        self.saboteurs + self.specialists.len() + self.crew_members
    }

    #[must_use]
    pub fn crew_total(&self) -> usize {
        self.specialists.len() + self.crew_members
    }

    /// Per-role counts in display order, skipping empty roles.
    #[must_use]
    pub fn counts(&self) -> Vec<(Role, usize)> {
        let mut counts = Vec::new();
        if self.crew_members > 0 {
            counts.push((Role::CrewMember, self.crew_members));
        }
        if self.saboteurs > 0 {
            counts.push((Role::Saboteur, self.saboteurs));
        }
        for ability in &self.specialists {
            let role = Role::Specialist(*ability);
            match counts.iter_mut().find(|(existing, _)| *existing == role) {
                Some((_, count)) => *count += 1,
                None => counts.push((role, 1)),
            }
        }
        counts
    }

    /// Flat role list, one entry per seat, in a fixed canonical order.
    fn role_list(&self) -> Vec<Role> {
        let mut roles = Vec::with_capacity(self.total());
        roles.extend(std::iter::repeat_n(Role::Saboteur, self.saboteurs));
        roles.extend(self.specialists.iter().map(|ability| Role::Specialist(*ability)));
        roles.extend(std::iter::repeat_n(Role::CrewMember, self.crew_members));
        roles
    }
}

/// Hand out roles for a roster.
///
/// The role list is shuffled with the supplied generator before being zipped
/// against the roster in join order, so a seeded generator reproduces the
/// same assignment.
pub fn assign_roles<R: Rng + ?Sized>(
    roster: &[PlayerId],
    policy: &DistributionPolicy,
    rng: &mut R,
) -> RoleAssignment {
    let mut roles = policy.distribution(roster.len()).role_list();
    roles.shuffle(rng);
    roster.iter().copied().zip(roles).collect()
}

/// Members of `team` within an assignment.
#[must_use]
pub fn members_of(assignment: &RoleAssignment, team: Team) -> Vec<PlayerId> {
    assignment
        .iter()
        .filter(|(_, role)| role.team() == team)
        .map(|(player, _)| *player)
        .collect()
}
