use solaris_game::{
    Announcement, Effect, GameConfig, GameError, Phase, PlayerId, Requester, SessionRegistry,
    TallyReason, Team, VoteValue, check_invariants, members_of,
};

const MODERATOR: Requester = Requester {
    id: PlayerId(900),
    moderator: true,
};

fn started_registry(name: &str, players: i64, seed: u64) -> SessionRegistry {
    let registry = SessionRegistry::with_seed(GameConfig::default(), seed);
    registry.create(name, PlayerId(1)).unwrap();
    for id in 1..=players {
        registry.join(name, PlayerId(id)).unwrap();
    }
    registry.start(name, MODERATOR).unwrap();
    registry
}

fn announcements(effects: &[Effect]) -> Vec<&Announcement> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Announce { announcement } => Some(announcement),
            _ => None,
        })
        .collect()
}

#[test]
fn crew_votes_out_every_saboteur() {
    let registry = started_registry("Hangar", 8, 0x5eed);
    let mut days = 0;
    loop {
        let session = registry.get("Hangar").unwrap();
        if session.phase() == Phase::Ended {
            break;
        }
        let living = session.living();
        let target = members_of(session.roles(), Team::Saboteur)
            .into_iter()
            .find(|p| living.contains(p))
            .expect("a living saboteur while the game runs");
        for voter in session.living_in_join_order() {
            let value = if voter == target {
                VoteValue::Abstain
            } else {
                VoteValue::Player(target)
            };
            registry.cast_vote("Hangar", voter, value).unwrap();
        }
        let outcome = registry.end_day("Hangar", MODERATOR).unwrap();
        check_invariants(&outcome.session).unwrap();
        let resolved = announcements(&outcome.effects)
            .into_iter()
            .find_map(|announcement| match announcement {
                Announcement::DayResolved {
                    result, revealed, ..
                } => Some((result.clone(), *revealed)),
                _ => None,
            })
            .unwrap();
        assert_eq!(resolved.0.reason, TallyReason::Elimination);
        assert_eq!(resolved.0.eliminated, Some(target));
        assert_eq!(resolved.1.map(|role| role.team()), Some(Team::Saboteur));
        days += 1;
    }

    let session = registry.get("Hangar").unwrap();
    assert_eq!(session.outcome(), Some(Team::Crew));
    assert_eq!(days, 2);
    assert_eq!(session.eliminated().len(), 2);
    assert!(session.eliminated().windows(2).all(|w| w[0].day < w[1].day));
}

#[test]
fn saboteurs_win_at_parity() {
    let registry = started_registry("Reactor", 4, 7);
    let session = registry.get("Reactor").unwrap();
    let crew = members_of(session.roles(), Team::Crew);
    let saboteur = members_of(session.roles(), Team::Saboteur)[0];

    // 4 players: 1 saboteur, 3 crew. Two crew eliminations reach parity.
    for (day, victim) in crew.iter().take(2).enumerate() {
        let session = registry.get("Reactor").unwrap();
        assert_eq!(session.current_day(), day as u32 + 1);
        for voter in session.living_in_join_order() {
            if voter != *victim {
                registry
                    .cast_vote("Reactor", voter, VoteValue::Player(*victim))
                    .unwrap();
            }
        }
        registry.end_day("Reactor", MODERATOR).unwrap();
    }

    let session = registry.get("Reactor").unwrap();
    assert_eq!(session.phase(), Phase::Ended);
    assert_eq!(session.outcome(), Some(Team::Saboteur));
    assert!(session.is_alive(saboteur));
    assert_eq!(session.living().len(), 2);
}

#[test]
fn ties_and_silence_never_eliminate() {
    let registry = started_registry("Bridge", 6, 11);
    let session = registry.get("Bridge").unwrap();
    let roster = session.roster().to_vec();

    registry
        .cast_vote("Bridge", roster[0], VoteValue::Player(roster[4]))
        .unwrap();
    registry
        .cast_vote("Bridge", roster[1], VoteValue::Player(roster[5]))
        .unwrap();
    registry
        .cast_vote("Bridge", roster[2], VoteValue::Player(roster[4]))
        .unwrap();
    registry
        .cast_vote("Bridge", roster[3], VoteValue::Player(roster[5]))
        .unwrap();
    registry.cast_vote("Bridge", roster[4], VoteValue::Veto).unwrap();

    let outcome = registry.end_day("Bridge", MODERATOR).unwrap();
    let tie = outcome.session.result(1).unwrap();
    assert_eq!(tie.reason, TallyReason::Tie);
    assert_eq!(tie.leaders.as_slice(), &[roster[4], roster[5]]);
    assert_eq!(tie.veto, 1);
    assert_eq!(outcome.session.current_day(), 2);

    let outcome = registry.end_day("Bridge", MODERATOR).unwrap();
    assert_eq!(
        outcome.session.result(2).unwrap().reason,
        TallyReason::NoVotes
    );
    assert_eq!(outcome.session.current_day(), 3);
    assert!(outcome.session.eliminated().is_empty());
}

#[test]
fn frozen_day_cannot_take_late_votes() {
    let registry = started_registry("Airlock", 5, 3);
    registry.end_day("Airlock", MODERATOR).unwrap();
    let session = registry.get("Airlock").unwrap();
    assert!(session.ledger(1).unwrap().is_frozen());
    registry
        .cast_vote("Airlock", session.roster()[0], VoteValue::Abstain)
        .unwrap();
    let session = registry.get("Airlock").unwrap();
    assert!(session.ledger(1).unwrap().is_empty());
    assert_eq!(session.ledger(2).unwrap().len(), 1);
}

#[test]
fn ended_session_rejects_every_mutation() {
    let registry = started_registry("Dock", 4, 1);
    let session = registry.get("Dock").unwrap();
    let saboteur = members_of(session.roles(), Team::Saboteur)[0];
    for voter in session.roster() {
        if *voter != saboteur {
            registry
                .cast_vote("Dock", *voter, VoteValue::Player(saboteur))
                .unwrap();
        }
    }
    let outcome = registry.end_day("Dock", MODERATOR).unwrap();
    assert!(announcements(&outcome.effects).iter().any(|a| matches!(
        a,
        Announcement::GameOver {
            winner: Team::Crew,
            ..
        }
    )));

    let before = registry.get("Dock").unwrap();
    let errors = [
        registry.join("Dock", PlayerId(50)).unwrap_err(),
        registry.leave("Dock", PlayerId(1)).unwrap_err(),
        registry.start("Dock", MODERATOR).unwrap_err(),
        registry
            .cast_vote("Dock", PlayerId(1), VoteValue::Abstain)
            .unwrap_err(),
        registry.end_day("Dock", MODERATOR).unwrap_err(),
    ];
    for err in errors {
        assert!(
            matches!(
                err,
                GameError::WrongPhase {
                    phase: Phase::Ended,
                    ..
                }
            ),
            "unexpected {err:?}"
        );
    }
    assert_eq!(registry.get("Dock").unwrap(), before);
}
