//! Stand-in chat platforms for simulated games.
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use solaris_game::{Announcement, Collaborator, PlayerId, PrivateNotice, TallyReason};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("simulated outage on delivery #{0}")]
    Outage(usize),
}

/// Render an announcement the way the bot would post it.
pub fn render_announcement(announcement: &Announcement) -> String {
    match announcement {
        Announcement::SignupOpened { session, creator } => {
            format!("Signups for {session} are open (hosted by {creator}).")
        }
        Announcement::RosterChanged {
            session,
            roster,
            joined,
            left,
        } => {
            let change = match (joined, left) {
                (Some(player), _) => format!("{player} joined"),
                (None, Some(player)) => format!("{player} left"),
                (None, None) => "roster updated".to_string(),
            };
            format!("{session}: {change}; {} signed up.", roster.len())
        }
        Announcement::DayStarted {
            session,
            day,
            living,
        } => format!("{session}: day {day} begins with {} players.", living.len()),
        Announcement::VoteRecorded {
            session,
            voter,
            value,
            previous,
            ..
        } => match previous {
            Some(old) => format!("{session}: {voter} changed vote from {old} to {value}."),
            None => format!("{session}: {voter} voted {value}."),
        },
        Announcement::DayResolved {
            session,
            day,
            result,
            revealed,
        } => match (result.reason, result.eliminated, revealed) {
            (TallyReason::Elimination, Some(player), Some(role)) => format!(
                "{session}: day {day} ends. {player} was voted out with {} votes and was a {role}.",
                result.top_count
            ),
            (TallyReason::Elimination, Some(player), None) => format!(
                "{session}: day {day} ends. {player} was voted out with {} votes.",
                result.top_count
            ),
            (TallyReason::Tie, _, _) => format!(
                "{session}: day {day} ends in a tie between {} players. Nobody is eliminated.",
                result.leaders.len()
            ),
            (TallyReason::MajorityAbstain, _, _) => format!(
                "{session}: day {day} ends. The majority abstained; nobody is eliminated."
            ),
            _ => format!("{session}: day {day} ends with no votes. Nobody is eliminated."),
        },
        Announcement::GameOver {
            session,
            day,
            winner,
            roles,
        } => format!(
            "{session}: game over on day {day}. The {winner} team wins! {} roles revealed.",
            roles.len()
        ),
    }
}

fn render_notice(player: PlayerId, notice: &PrivateNotice) -> String {
    match notice {
        PrivateNotice::RoleAssigned {
            session,
            role,
            teammates,
        } if teammates.is_empty() => format!("[dm {player}] {session}: you are a {role}."),
        PrivateNotice::RoleAssigned {
            session,
            role,
            teammates,
        } => format!(
            "[dm {player}] {session}: you are a {role}; fellow saboteurs: {}.",
            teammates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Logs every effect and keeps a transcript of what was posted.
#[derive(Debug, Default)]
pub struct ConsoleCollaborator {
    transcript: Mutex<Vec<String>>,
    echo: bool,
}

impl ConsoleCollaborator {
    pub fn new(echo: bool) -> Self {
        Self {
            transcript: Mutex::new(Vec::new()),
            echo,
        }
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().clone()
    }

    fn post(&self, line: String) {
        log::info!("{line}");
        if self.echo {
            println!("  {line}");
        }
        self.transcript.lock().push(line);
    }
}

impl Collaborator for ConsoleCollaborator {
    type Error = DeliveryError;

    fn provision_signup_surface(&self, session: &str) -> Result<(), Self::Error> {
        self.post(format!("#{session}-signup created"));
        Ok(())
    }

    fn provision_day_surfaces(&self, session: &str, day: u32) -> Result<(), Self::Error> {
        self.post(format!("#{session}-day-{day} and #{session}-day-{day}-votes created"));
        Ok(())
    }

    fn deliver_private_notification(
        &self,
        player: PlayerId,
        notice: &PrivateNotice,
    ) -> Result<(), Self::Error> {
        self.post(render_notice(player, notice));
        Ok(())
    }

    fn announce(&self, announcement: &Announcement) -> Result<(), Self::Error> {
        self.post(render_announcement(announcement));
        Ok(())
    }
}

/// Fails every `period`-th delivery, succeeding otherwise.
#[derive(Debug)]
pub struct FlakyCollaborator {
    period: usize,
    calls: AtomicUsize,
}

impl FlakyCollaborator {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    fn attempt(&self) -> Result<(), DeliveryError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call % self.period == 0 {
            Err(DeliveryError::Outage(call))
        } else {
            Ok(())
        }
    }
}

impl Collaborator for FlakyCollaborator {
    type Error = DeliveryError;

    fn provision_signup_surface(&self, _session: &str) -> Result<(), Self::Error> {
        self.attempt()
    }

    fn provision_day_surfaces(&self, _session: &str, _day: u32) -> Result<(), Self::Error> {
        self.attempt()
    }

    fn deliver_private_notification(
        &self,
        _player: PlayerId,
        _notice: &PrivateNotice,
    ) -> Result<(), Self::Error> {
        self.attempt()
    }

    fn announce(&self, _announcement: &Announcement) -> Result<(), Self::Error> {
        self.attempt()
    }
}
