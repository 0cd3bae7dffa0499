//! Property tests for the pure voting and role logic.
//!
//! Properties tested:
//! - A voter never holds more than one ledger entry
//! - Tally results do not depend on vote order
//! - Vetoes never reach a tally bucket
//! - Role assignment covers the roster exactly with the computed team split

use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;

use solaris_game::{
    DistributionPolicy, PlayerId, Role, Team, VoteLedger, VoteValue, assign_roles, members_of,
    tally_votes,
};

fn vote_value(players: i64) -> impl Strategy<Value = VoteValue> {
    prop_oneof![
        (1..=players).prop_map(|id| VoteValue::Player(PlayerId(id))),
        Just(VoteValue::Abstain),
        Just(VoteValue::Veto),
    ]
}

fn votes(players: i64) -> impl Strategy<Value = Vec<(PlayerId, VoteValue)>> {
    prop::collection::vec(
        ((1..=players).prop_map(PlayerId), vote_value(players)),
        0..40,
    )
}

fn living(players: i64) -> BTreeSet<PlayerId> {
    (1..=players).map(PlayerId).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the ledger keeps only the most recent vote per voter
    #[test]
    fn prop_last_vote_wins(casts in votes(8)) {
        let alive = living(8);
        let mut ledger = VoteLedger::open(1);
        for (voter, value) in &casts {
            ledger.cast_vote(*voter, *value, &alive).unwrap();
        }
        let voters: BTreeSet<PlayerId> = casts.iter().map(|(voter, _)| *voter).collect();
        prop_assert_eq!(ledger.len(), voters.len());
        for voter in voters {
            let last = casts.iter().rev().find(|(v, _)| *v == voter).map(|(_, value)| *value);
            prop_assert_eq!(ledger.vote_of(voter), last);
        }
    }

    /// Property: shuffling the ledger entries yields an identical result
    #[test]
    fn prop_tally_is_order_independent(casts in votes(7), seed in any::<u64>()) {
        let alive = living(7);
        let ledger: VoteLedger = casts.iter().copied().collect();
        let mut entries: Vec<_> = ledger.iter().collect();
        let baseline = tally_votes(entries.iter().copied(), &alive);
        entries.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));
        prop_assert_eq!(tally_votes(entries, &alive), baseline);
    }

    /// Property: vetoes are counted on the side and never move the outcome
    #[test]
    fn prop_vetoes_never_change_the_outcome(casts in votes(6)) {
        let alive = living(6);
        let ledger: VoteLedger = casts.iter().copied().collect();
        let with_vetoes = tally_votes(ledger.iter(), &alive);
        let without = tally_votes(
            ledger.iter().filter(|(_, value)| *value != VoteValue::Veto),
            &alive,
        );
        prop_assert_eq!(with_vetoes.eliminated, without.eliminated);
        prop_assert_eq!(with_vetoes.reason, without.reason);
        prop_assert_eq!(with_vetoes.top_count, without.top_count);
        prop_assert_eq!(with_vetoes.abstain, without.abstain);
        prop_assert_eq!(without.veto, 0);
    }

    /// Property: an eliminated player always holds the strict top count
    #[test]
    fn prop_elimination_needs_a_strict_leader(casts in votes(6)) {
        let alive = living(6);
        let ledger: VoteLedger = casts.iter().copied().collect();
        let result = tally_votes(ledger.iter(), &alive);
        if let Some(player) = result.eliminated {
            prop_assert_eq!(result.votes_for(player), result.top_count);
            prop_assert!(result.abstain <= result.top_count);
            let others = result.votes.iter().filter(|(p, _)| **p != player);
            for (_, count) in others {
                prop_assert!(*count < result.top_count);
            }
        }
    }

    /// Property: every player gets exactly one role and team sizes match
    #[test]
    fn prop_roles_cover_roster(size in 3usize..40, pct in 1u32..99, seed in any::<u64>()) {
        let policy = DistributionPolicy { minority_pct: pct, ..DistributionPolicy::default() };
        let roster: Vec<PlayerId> = (1..=size as i64).map(PlayerId).collect();
        let assignment = assign_roles(&roster, &policy, &mut ChaCha20Rng::seed_from_u64(seed));
        let distribution = policy.distribution(size);

        prop_assert_eq!(assignment.len(), size);
        prop_assert_eq!(distribution.total(), size);
        prop_assert!(roster.iter().all(|p| assignment.contains_key(p)));
        let saboteurs = members_of(&assignment, Team::Saboteur).len();
        prop_assert_eq!(saboteurs, distribution.saboteurs);
        prop_assert!(saboteurs >= 1 && saboteurs < size);
        let specialists = assignment
            .values()
            .filter(|role| matches!(role, Role::Specialist(_)))
            .count();
        prop_assert_eq!(specialists, distribution.specialists.len());
    }
}
