//! Structural checks for sessions rebuilt from persisted data.
//!
//! Transitions keep these properties by construction; restored data is only
//! trusted once it passes [`check_invariants`].
use std::collections::BTreeSet;
use thiserror::Error;

use crate::player::PlayerId;
use crate::session::{GameSession, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("`{session}`: {player} appears in the roster more than once")]
    DuplicateRosterEntry { session: String, player: PlayerId },
    #[error("`{session}`: role assignment does not cover the roster exactly")]
    RoleCoverage { session: String },
    #[error("`{session}`: {player} is eliminated without being on the roster")]
    EliminatedOutsider { session: String, player: PlayerId },
    #[error("`{session}`: {player} is eliminated more than once")]
    DuplicateElimination { session: String, player: PlayerId },
    #[error("`{session}`: elimination on day {day} is out of order")]
    EliminationOrder { session: String, day: u32 },
    #[error("`{session}`: ledger stored under day {key} claims day {day}")]
    LedgerDay { session: String, key: u32, day: u32 },
    #[error("`{session}`: day {day} ledger holds a vote from {voter}, who could not vote that day")]
    IneligibleVoter {
        session: String,
        day: u32,
        voter: PlayerId,
    },
    #[error("`{session}`: day {day} ledger has the wrong frozen state")]
    LedgerFreeze { session: String, day: u32 },
    #[error("`{session}`: {phase} session has inconsistent day bookkeeping")]
    DayBookkeeping { session: String, phase: Phase },
    #[error("`{session}`: outcome does not match the {phase} phase")]
    Outcome { session: String, phase: Phase },
    #[error("`{session}`: day {day} result disagrees with its ledger or elimination record")]
    DayResult { session: String, day: u32 },
}

/// Run every check, returning the first violation found.
///
/// # Errors
///
/// Returns the first [`InvariantViolation`] encountered.
pub fn check_invariants(session: &GameSession) -> Result<(), InvariantViolation> {
    check_roster(session)?;
    check_roles(session)?;
    check_eliminations(session)?;
    check_days(session)?;
    check_ledgers(session)?;
    check_results(session)?;
    check_outcome(session)
}

fn check_roster(session: &GameSession) -> Result<(), InvariantViolation> {
    let mut seen = BTreeSet::new();
    for player in &session.roster {
        if !seen.insert(*player) {
            return Err(InvariantViolation::DuplicateRosterEntry {
                session: session.name.clone(),
                player: *player,
            });
        }
    }
    Ok(())
}

fn check_roles(session: &GameSession) -> Result<(), InvariantViolation> {
    let covered = match session.phase {
        Phase::Signup => session.roles.is_empty(),
        Phase::Active | Phase::Ended => {
            session.roles.len() == session.roster.len()
                && session.roster.iter().all(|p| session.roles.contains_key(p))
        }
    };
    if covered {
        Ok(())
    } else {
        Err(InvariantViolation::RoleCoverage {
            session: session.name.clone(),
        })
    }
}

fn check_eliminations(session: &GameSession) -> Result<(), InvariantViolation> {
    let mut seen = BTreeSet::new();
    let mut last_day = 0;
    for elimination in &session.eliminated {
        if !session.roster.contains(&elimination.player) {
            return Err(InvariantViolation::EliminatedOutsider {
                session: session.name.clone(),
                player: elimination.player,
            });
        }
        if !seen.insert(elimination.player) {
            return Err(InvariantViolation::DuplicateElimination {
                session: session.name.clone(),
                player: elimination.player,
            });
        }
        // one elimination per day at most
        if elimination.day <= last_day || elimination.day > session.current_day {
            return Err(InvariantViolation::EliminationOrder {
                session: session.name.clone(),
                day: elimination.day,
            });
        }
        last_day = elimination.day;
    }
    Ok(())
}

fn check_days(session: &GameSession) -> Result<(), InvariantViolation> {
    let days: Vec<u32> = session.ledgers.keys().copied().collect();
    let expected: Vec<u32> = (1..=session.current_day).collect();
    let consistent = match session.phase {
        Phase::Signup => {
            session.current_day == 0 && days.is_empty() && session.eliminated.is_empty()
        }
        Phase::Active | Phase::Ended => session.current_day >= 1 && days == expected,
    };
    if consistent {
        Ok(())
    } else {
        Err(InvariantViolation::DayBookkeeping {
            session: session.name.clone(),
            phase: session.phase,
        })
    }
}

fn check_ledgers(session: &GameSession) -> Result<(), InvariantViolation> {
    for (key, ledger) in &session.ledgers {
        if ledger.day() != *key {
            return Err(InvariantViolation::LedgerDay {
                session: session.name.clone(),
                key: *key,
                day: ledger.day(),
            });
        }
        let open_day = session.phase == Phase::Active && *key == session.current_day;
        if ledger.is_frozen() == open_day {
            return Err(InvariantViolation::LedgerFreeze {
                session: session.name.clone(),
                day: *key,
            });
        }
        for (voter, _) in ledger.iter() {
            let gone_before = session
                .eliminated
                .iter()
                .any(|e| e.player == voter && e.day < *key);
            if !session.roster.contains(&voter) || gone_before {
                return Err(InvariantViolation::IneligibleVoter {
                    session: session.name.clone(),
                    day: *key,
                    voter,
                });
            }
        }
    }
    Ok(())
}

/// Every frozen day has exactly one result, and each result names the same
/// elimination (with the same vote count) as the elimination record.
fn check_results(session: &GameSession) -> Result<(), InvariantViolation> {
    let mismatch = |day: u32| InvariantViolation::DayResult {
        session: session.name.clone(),
        day,
    };
    let frozen: BTreeSet<u32> = session
        .ledgers
        .iter()
        .filter(|(_, ledger)| ledger.is_frozen())
        .map(|(day, _)| *day)
        .collect();
    let resolved: BTreeSet<u32> = session.results.keys().copied().collect();
    if let Some(day) = frozen.symmetric_difference(&resolved).next() {
        return Err(mismatch(*day));
    }
    if let Some(orphan) = session
        .eliminated
        .iter()
        .find(|e| !session.results.contains_key(&e.day))
    {
        return Err(mismatch(orphan.day));
    }
    for (day, result) in &session.results {
        let recorded = session.eliminated.iter().find(|e| e.day == *day);
        let consistent = match (result.eliminated, recorded) {
            (None, None) => true,
            (Some(player), Some(e)) => e.player == player && e.votes == result.top_count,
            _ => false,
        };
        if !consistent {
            return Err(mismatch(*day));
        }
    }
    Ok(())
}

fn check_outcome(session: &GameSession) -> Result<(), InvariantViolation> {
    let ended = session.phase == Phase::Ended;
    if ended == session.outcome.is_some() {
        Ok(())
    } else {
        Err(InvariantViolation::Outcome {
            session: session.name.clone(),
            phase: session.phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::ledger::{VoteLedger, VoteValue};
    use crate::player::Requester;
    use crate::session::Elimination;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn active() -> GameSession {
        let (mut session, _) = GameSession::create("Orbit", PlayerId(1)).unwrap();
        for id in 1..=5 {
            session.join(PlayerId(id)).unwrap();
        }
        session
            .start(
                Requester::player(PlayerId(1)),
                &GameConfig::default(),
                &mut ChaCha20Rng::seed_from_u64(9),
            )
            .unwrap();
        session
    }

    #[test]
    fn sessions_built_by_transitions_pass() {
        let (signup, _) = GameSession::create("Orbit", PlayerId(1)).unwrap();
        assert_eq!(check_invariants(&signup), Ok(()));

        let mut session = active();
        assert_eq!(check_invariants(&session), Ok(()));
        session
            .cast_vote(PlayerId(1), VoteValue::Player(PlayerId(2)))
            .unwrap();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        assert_eq!(check_invariants(&session), Ok(()));
    }

    #[test]
    fn duplicate_roster_entry_is_caught() {
        let mut session = active();
        session.roster.push(PlayerId(2));
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::DuplicateRosterEntry { .. })
        ));
    }

    #[test]
    fn missing_role_is_caught() {
        let mut session = active();
        session.roles.remove(&PlayerId(3));
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::RoleCoverage { .. })
        ));
    }

    #[test]
    fn double_elimination_is_caught() {
        let mut session = active();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        let hit = Elimination {
            player: PlayerId(4),
            day: 1,
            votes: 3,
        };
        session.eliminated.push(hit);
        session.eliminated.push(Elimination { day: 2, ..hit });
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::DuplicateElimination { .. })
        ));
    }

    #[test]
    fn vote_from_eliminated_player_is_caught() {
        let mut session = active();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        session.eliminated.push(Elimination {
            player: PlayerId(5),
            day: 1,
            votes: 2,
        });
        let mut ledger: VoteLedger = [(PlayerId(5), VoteValue::Abstain)].into_iter().collect();
        ledger = VoteLedger { day: 2, ..ledger };
        session.ledgers.insert(2, ledger);
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::IneligibleVoter { day: 2, .. })
        ));
    }

    #[test]
    fn unfrozen_past_ledger_is_caught() {
        let mut session = active();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        session.ledgers.insert(1, VoteLedger::open(1));
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::LedgerFreeze { day: 1, .. })
        ));
    }

    fn after_elimination() -> GameSession {
        let mut session = active();
        for voter in [1, 3, 4] {
            session
                .cast_vote(PlayerId(voter), VoteValue::Player(PlayerId(2)))
                .unwrap();
        }
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        assert_eq!(session.eliminated.len(), 1);
        session
    }

    #[test]
    fn frozen_day_without_result_is_caught() {
        let mut session = active();
        session.end_day(Requester::player(PlayerId(1))).unwrap();
        session.results.remove(&1);
        assert_eq!(
            check_invariants(&session),
            Err(InvariantViolation::DayResult {
                session: "Orbit".into(),
                day: 1
            })
        );
    }

    #[test]
    fn result_naming_a_missing_elimination_is_caught() {
        let mut session = after_elimination();
        session.eliminated.clear();
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::DayResult { day: 1, .. })
        ));
    }

    #[test]
    fn elimination_vote_count_must_match_result() {
        let mut session = after_elimination();
        assert_eq!(check_invariants(&session), Ok(()));
        session.eliminated[0].votes = 9;
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::DayResult { day: 1, .. })
        ));
    }

    #[test]
    fn outcome_without_ended_phase_is_caught() {
        let mut session = active();
        session.outcome = Some(crate::roles::Team::Crew);
        assert!(matches!(
            check_invariants(&session),
            Err(InvariantViolation::Outcome { .. })
        ));
    }
}
