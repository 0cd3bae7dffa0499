//! Notification payloads and the collaborator seam.
//!
//! Transitions never talk to the chat platform. They return a list of
//! [`Effect`]s describing what the outside world should reflect, and the
//! command layer hands that list to a [`Collaborator`] after the state change
//! has been committed. Delivery is best-effort: a failing collaborator is
//! logged and counted, never rolled back into the core.
use serde::{Deserialize, Serialize};

use crate::ledger::VoteValue;
use crate::player::PlayerId;
use crate::roles::{Role, RoleAssignment, Team};
use crate::tally::TallyResult;

/// Private message delivered to a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateNotice {
    RoleAssigned {
        session: String,
        role: Role,
        /// Fellow saboteurs; empty for crew roles.
        teammates: Vec<PlayerId>,
    },
}

/// Public announcement for the session's channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Announcement {
    SignupOpened {
        session: String,
        creator: PlayerId,
    },
    RosterChanged {
        session: String,
        roster: Vec<PlayerId>,
        joined: Option<PlayerId>,
        left: Option<PlayerId>,
    },
    DayStarted {
        session: String,
        day: u32,
        living: Vec<PlayerId>,
    },
    VoteRecorded {
        session: String,
        day: u32,
        voter: PlayerId,
        value: VoteValue,
        previous: Option<VoteValue>,
        standings: TallyResult,
    },
    DayResolved {
        session: String,
        day: u32,
        result: TallyResult,
        /// Role of the eliminated player, revealed with the result.
        revealed: Option<Role>,
    },
    GameOver {
        session: String,
        day: u32,
        winner: Team,
        roles: RoleAssignment,
    },
}

/// One externally visible consequence of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    ProvisionSignupSurface { session: String },
    ProvisionDaySurfaces { session: String, day: u32 },
    DeliverPrivate { player: PlayerId, notice: PrivateNotice },
    Announce { announcement: Announcement },
}

impl Effect {
    pub(crate) const fn announce(announcement: Announcement) -> Self {
        Self::Announce { announcement }
    }
}

/// Chat-platform side of the game. Platform-specific implementations should
/// provide this.
pub trait Collaborator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the signup thread for a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the request.
    fn provision_signup_surface(&self, session: &str) -> Result<(), Self::Error>;

    /// Create the discussion and voting surfaces for `day`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the request.
    fn provision_day_surfaces(&self, session: &str, day: u32) -> Result<(), Self::Error>;

    /// Send a private notice to one player.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered.
    fn deliver_private_notification(
        &self,
        player: PlayerId,
        notice: &PrivateNotice,
    ) -> Result<(), Self::Error>;

    /// Post a public announcement.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be posted.
    fn announce(&self, announcement: &Announcement) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    #[must_use]
    pub const fn all_delivered(self) -> bool {
        self.failed == 0
    }
}

/// Hand every effect to the collaborator, continuing past failures.
pub fn dispatch_effects<C: Collaborator + ?Sized>(
    collaborator: &C,
    effects: &[Effect],
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for effect in effects {
        let outcome = match effect {
            Effect::ProvisionSignupSurface { session } => {
                collaborator.provision_signup_surface(session)
            }
            Effect::ProvisionDaySurfaces { session, day } => {
                collaborator.provision_day_surfaces(session, *day)
            }
            Effect::DeliverPrivate { player, notice } => {
                collaborator.deliver_private_notification(*player, notice)
            }
            Effect::Announce { announcement } => collaborator.announce(announcement),
        };
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                log::warn!("collaborator failed to reflect {effect:?}: {err}");
                report.failed += 1;
            }
        }
    }
    report
}
