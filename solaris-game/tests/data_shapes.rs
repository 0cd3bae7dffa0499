use std::hash::Hasher;

use serde_json::Value;
use solaris_game::{
    GameConfig, GameSession, PersistedState, PlayerId, Requester, SessionRegistry, VoteValue,
};
use twox_hash::XxHash64;

fn played_registry(seed: u64) -> SessionRegistry {
    let registry = SessionRegistry::with_seed(GameConfig::default(), seed);
    for name in ["Aurora", "Borealis"] {
        registry.create(name, PlayerId(1)).unwrap();
        for id in 1..=9 {
            registry.join(name, PlayerId(id)).unwrap();
        }
        registry.start(name, Requester::player(PlayerId(1))).unwrap();
        registry
            .cast_vote(name, PlayerId(2), VoteValue::Player(PlayerId(3)))
            .unwrap();
        registry
            .cast_vote(name, PlayerId(4), VoteValue::Abstain)
            .unwrap();
    }
    registry
}

#[test]
fn seeded_registry_snapshot_is_stable() {
    let first = canonical(&played_registry(0x00C0_FFEE).snapshot());
    let second = canonical(&played_registry(0x00C0_FFEE).snapshot());
    assert_eq!(
        snapshot_hash(first.as_bytes()),
        snapshot_hash(second.as_bytes()),
        "seeded snapshot drifted\n{first}"
    );
}

#[test]
fn session_names_draw_independent_roles() {
    let registry = played_registry(0x00C0_FFEE);
    let aurora = registry.get("Aurora").unwrap();
    let borealis = registry.get("Borealis").unwrap();
    let hash_roles = |session: &GameSession| {
        snapshot_hash(serde_json::to_string(session.roles()).unwrap().as_bytes())
    };
    // 9 players share 3 saboteurs and 2 specialists over 2520 layouts; a
    // collision here means the name is not feeding the seed.
    assert_ne!(hash_roles(&aurora), hash_roles(&borealis));
}

#[test]
fn persisted_state_round_trips_losslessly() {
    let state = played_registry(7).snapshot();
    let saved = serde_json::to_string(&state).unwrap();
    let restored: PersistedState = serde_json::from_str(&saved).unwrap();
    assert_eq!(restored, state);
    assert_eq!(
        snapshot_hash(canonical(&restored).as_bytes()),
        snapshot_hash(canonical(&state).as_bytes())
    );
}

fn canonical(state: &PersistedState) -> String {
    let value: Value = serde_json::to_value(state).unwrap();
    serde_json::to_string_pretty(&value).unwrap()
}

fn snapshot_hash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}
