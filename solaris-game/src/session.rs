//! Game session state machine.
//!
//! A session moves `Signup -> Active -> Ended` and nowhere else. Every
//! transition validates fully before touching state, so a returned error
//! always leaves the session exactly as it was. Successful transitions return
//! the effects the chat platform should reflect; the session never performs
//! them itself.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::GameConfig;
use crate::constants::MAX_SESSION_NAME_LEN;
use crate::effects::{Announcement, Effect, PrivateNotice};
use crate::error::{Action, GameError};
use crate::ledger::{VoteLedger, VoteValue};
use crate::player::{PlayerId, Requester};
use crate::roles::{Role, RoleAssignment, Team, assign_roles, members_of};
use crate::tally::{self, TallyResult};
use crate::win::{self, WinCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Signup,
    Active,
    Ended,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a player voted out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    pub player: PlayerId,
    pub day: u32,
    pub votes: u32,
}

/// Root aggregate for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub(crate) name: String,
    pub(crate) phase: Phase,
    pub(crate) creator: PlayerId,
    pub(crate) roster: Vec<PlayerId>,
    #[serde(default)]
    pub(crate) current_day: u32,
    #[serde(default)]
    pub(crate) roles: RoleAssignment,
    #[serde(default)]
    pub(crate) eliminated: Vec<Elimination>,
    #[serde(default)]
    pub(crate) ledgers: BTreeMap<u32, VoteLedger>,
    #[serde(default)]
    pub(crate) results: BTreeMap<u32, TallyResult>,
    #[serde(default)]
    pub(crate) outcome: Option<Team>,
}

/// Lowercased lookup key for a session name.
#[must_use]
pub fn session_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl GameSession {
    /// Open a new session in signup.
    ///
    /// # Errors
    ///
    /// `InvalidSessionName` for blank or overlong names.
    pub fn create(name: &str, creator: PlayerId) -> Result<(Self, Vec<Effect>), GameError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_SESSION_NAME_LEN {
            return Err(GameError::InvalidSessionName {
                session: name.to_string(),
            });
        }
        let session = Self {
            name: name.to_string(),
            phase: Phase::Signup,
            creator,
            roster: Vec::new(),
            current_day: 0,
            roles: RoleAssignment::new(),
            eliminated: Vec::new(),
            ledgers: BTreeMap::new(),
            results: BTreeMap::new(),
            outcome: None,
        };
        log::info!("session `{name}` created by {creator}");
        let effects = vec![
            Effect::ProvisionSignupSurface {
                session: session.name.clone(),
            },
            Effect::announce(Announcement::SignupOpened {
                session: session.name.clone(),
                creator,
            }),
        ];
        Ok((session, effects))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key(&self) -> String {
        session_key(&self.name)
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn creator(&self) -> PlayerId {
        self.creator
    }

    /// Players in join order.
    #[must_use]
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    /// Zero during signup, then the running day number.
    #[must_use]
    pub const fn current_day(&self) -> u32 {
        self.current_day
    }

    #[must_use]
    pub const fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    #[must_use]
    pub fn role_of(&self, player: PlayerId) -> Option<Role> {
        self.roles.get(&player).copied()
    }

    #[must_use]
    pub fn eliminated(&self) -> &[Elimination] {
        &self.eliminated
    }

    #[must_use]
    pub const fn ledgers(&self) -> &BTreeMap<u32, VoteLedger> {
        &self.ledgers
    }

    #[must_use]
    pub fn ledger(&self, day: u32) -> Option<&VoteLedger> {
        self.ledgers.get(&day)
    }

    /// Ledger for the running day, if the session is active.
    #[must_use]
    pub fn current_ledger(&self) -> Option<&VoteLedger> {
        match self.phase {
            Phase::Active => self.ledgers.get(&self.current_day),
            Phase::Signup | Phase::Ended => None,
        }
    }

    #[must_use]
    pub fn result(&self, day: u32) -> Option<&TallyResult> {
        self.results.get(&day)
    }

    #[must_use]
    pub const fn results(&self) -> &BTreeMap<u32, TallyResult> {
        &self.results
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Team> {
        self.outcome
    }

    #[must_use]
    pub fn has_joined(&self, player: PlayerId) -> bool {
        self.roster.contains(&player)
    }

    #[must_use]
    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.has_joined(player) && !self.eliminated.iter().any(|e| e.player == player)
    }

    /// Roster minus eliminated players.
    #[must_use]
    pub fn living(&self) -> BTreeSet<PlayerId> {
        self.living_in_join_order().into_iter().collect()
    }

    #[must_use]
    pub fn living_in_join_order(&self) -> Vec<PlayerId> {
        self.roster
            .iter()
            .copied()
            .filter(|player| !self.eliminated.iter().any(|e| e.player == *player))
            .collect()
    }

    /// Creator or moderator.
    #[must_use]
    pub fn can_manage(&self, requester: Requester) -> bool {
        requester.moderator || requester.id == self.creator
    }

    fn require_phase(&self, expected: Phase, action: Action) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::WrongPhase {
                session: self.name.clone(),
                phase: self.phase,
                action,
            })
        }
    }

    fn require_manager(&self, requester: Requester, action: Action) -> Result<(), GameError> {
        if self.can_manage(requester) {
            Ok(())
        } else {
            Err(GameError::NotAuthorized {
                session: self.name.clone(),
                player: requester.id,
                action,
            })
        }
    }

    fn roster_changed(&self, joined: Option<PlayerId>, left: Option<PlayerId>) -> Effect {
        Effect::announce(Announcement::RosterChanged {
            session: self.name.clone(),
            roster: self.roster.clone(),
            joined,
            left,
        })
    }

    fn day_started(&self) -> Effect {
        Effect::announce(Announcement::DayStarted {
            session: self.name.clone(),
            day: self.current_day,
            living: self.living_in_join_order(),
        })
    }

    /// Add a player during signup.
    ///
    /// # Errors
    ///
    /// `WrongPhase` outside signup, `AlreadyJoined` for a repeat join.
    pub fn join(&mut self, player: PlayerId) -> Result<Vec<Effect>, GameError> {
        self.require_phase(Phase::Signup, Action::Join)?;
        if self.has_joined(player) {
            return Err(GameError::AlreadyJoined {
                session: self.name.clone(),
                player,
            });
        }
        self.roster.push(player);
        log::info!(
            "{player} joined `{}` ({} signed up)",
            self.name,
            self.roster.len()
        );
        Ok(vec![self.roster_changed(Some(player), None)])
    }

    /// Remove a player during signup.
    ///
    /// # Errors
    ///
    /// `WrongPhase` outside signup, `NotJoined` for a player not on the roster.
    pub fn leave(&mut self, player: PlayerId) -> Result<Vec<Effect>, GameError> {
        self.require_phase(Phase::Signup, Action::Leave)?;
        let Some(index) = self.roster.iter().position(|p| *p == player) else {
            return Err(GameError::NotJoined {
                session: self.name.clone(),
                player,
            });
        };
        self.roster.remove(index);
        log::info!("{player} left `{}`", self.name);
        Ok(vec![self.roster_changed(None, Some(player))])
    }

    /// Close signup, hand out roles and open day 1.
    ///
    /// # Errors
    ///
    /// `WrongPhase` outside signup, `NotAuthorized` for anyone but the creator
    /// or a moderator, `InsufficientPlayers` below the configured minimum.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        requester: Requester,
        config: &GameConfig,
        rng: &mut R,
    ) -> Result<Vec<Effect>, GameError> {
        self.require_phase(Phase::Signup, Action::Start)?;
        self.require_manager(requester, Action::Start)?;
        if self.roster.len() < config.min_players {
            return Err(GameError::InsufficientPlayers {
                session: self.name.clone(),
                required: config.min_players,
                joined: self.roster.len(),
            });
        }

        self.roles = assign_roles(&self.roster, &config.distribution, rng);
        self.phase = Phase::Active;
        self.current_day = 1;
        self.ledgers.insert(1, VoteLedger::open(1));
        log::info!(
            "session `{}` started with {} players",
            self.name,
            self.roster.len()
        );

        let saboteurs = members_of(&self.roles, Team::Saboteur);
        let mut effects = vec![Effect::ProvisionDaySurfaces {
            session: self.name.clone(),
            day: 1,
        }];
        for player in &self.roster {
            let role = self.roles.get(player).copied().unwrap_or(Role::CrewMember);
            let teammates = match role.team() {
                Team::Saboteur => saboteurs.iter().copied().filter(|p| p != player).collect(),
                Team::Crew => Vec::new(),
            };
            effects.push(Effect::DeliverPrivate {
                player: *player,
                notice: PrivateNotice::RoleAssigned {
                    session: self.name.clone(),
                    role,
                    teammates,
                },
            });
        }
        effects.push(self.day_started());
        Ok(effects)
    }

    /// Record a vote on the running day.
    ///
    /// # Errors
    ///
    /// `WrongPhase` outside an active game, `NotALivingPlayer` for a voter who
    /// is absent or eliminated, `InvalidVoteTarget` for a target who is.
    pub fn cast_vote(
        &mut self,
        voter: PlayerId,
        value: VoteValue,
    ) -> Result<Vec<Effect>, GameError> {
        self.require_phase(Phase::Active, Action::CastVote)?;
        let living = self.living();
        if !living.contains(&voter) {
            return Err(GameError::NotALivingPlayer {
                session: self.name.clone(),
                player: voter,
            });
        }
        if let Some(target) = value.target()
            && !living.contains(&target)
        {
            return Err(GameError::InvalidVoteTarget {
                session: self.name.clone(),
                target,
            });
        }

        let day = self.current_day;
        let ledger = self
            .ledgers
            .entry(day)
            .or_insert_with(|| VoteLedger::open(day));
        let previous = ledger.vote_of(voter);
        let standings = ledger
            .cast_vote(voter, value, &living)
            .map(|ledger| tally::resolve(ledger, &living))
            .map_err(|err| GameError::from_ledger(&self.name, err))?;
        log::debug!("`{}` day {day}: {voter} voted {value}", self.name);

        Ok(vec![Effect::announce(Announcement::VoteRecorded {
            session: self.name.clone(),
            day,
            voter,
            value,
            previous,
            standings,
        })])
    }

    /// Close the running day: freeze, tally, eliminate, then check for a
    /// winner. Without a winner the next day opens.
    ///
    /// # Errors
    ///
    /// `WrongPhase` outside an active game, `NotAuthorized` for anyone but the
    /// creator or a moderator.
    pub fn end_day(&mut self, requester: Requester) -> Result<Vec<Effect>, GameError> {
        self.require_phase(Phase::Active, Action::EndDay)?;
        self.require_manager(requester, Action::EndDay)?;

        let day = self.current_day;
        let living = self.living();
        let ledger = self
            .ledgers
            .entry(day)
            .or_insert_with(|| VoteLedger::open(day));
        ledger
            .freeze()
            .map_err(|err| GameError::from_ledger(&self.name, err))?;
        let result = tally::resolve(ledger, &living);

        let revealed = result.eliminated.and_then(|player| self.role_of(player));
        if let Some(player) = result.eliminated {
            self.eliminated.push(Elimination {
                player,
                day,
                votes: result.top_count,
            });
        }
        log::info!(
            "`{}` day {day} resolved: {} ({} living)",
            self.name,
            result.reason,
            living.len() - usize::from(result.eliminated.is_some())
        );
        self.results.insert(day, result.clone());

        let mut effects = vec![Effect::announce(Announcement::DayResolved {
            session: self.name.clone(),
            day,
            result,
            revealed,
        })];

        match win::evaluate(&self.living(), &self.roles) {
            WinCheck::Victory(winner) => {
                self.phase = Phase::Ended;
                self.outcome = Some(winner);
                log::info!("`{}` ended on day {day}: {winner} wins", self.name);
                effects.push(Effect::announce(Announcement::GameOver {
                    session: self.name.clone(),
                    day,
                    winner,
                    roles: self.roles.clone(),
                }));
            }
            WinCheck::Continue => {
                self.current_day = day + 1;
                self.ledgers
                    .insert(self.current_day, VoteLedger::open(self.current_day));
                effects.push(Effect::ProvisionDaySurfaces {
                    session: self.name.clone(),
                    day: self.current_day,
                });
                effects.push(self.day_started());
            }
        }
        Ok(effects)
    }
}
