use std::fmt;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use solaris_game::{PlayerId, TallyResult, Team, VoteValue};

/// What a simulated voter knows when choosing a vote.
#[derive(Debug, Clone, Copy)]
pub struct VoterView<'a> {
    pub voter: PlayerId,
    pub team: Team,
    /// Living players in join order.
    pub living: &'a [PlayerId],
    /// Fellow saboteurs; empty for crew.
    pub teammates: &'a [PlayerId],
    /// Standings of the day so far.
    pub standings: &'a TallyResult,
}

impl VoterView<'_> {
    /// Players this voter is willing to name: anyone living except
    /// themselves and, for saboteurs, their teammates.
    #[must_use]
    pub fn candidates(&self) -> Vec<PlayerId> {
        self.living
            .iter()
            .copied()
            .filter(|player| *player != self.voter)
            .filter(|player| self.team != Team::Saboteur || !self.teammates.contains(player))
            .collect()
    }

    fn leader(&self) -> Option<(PlayerId, u32)> {
        let candidates = self.candidates();
        self.standings
            .votes
            .iter()
            .filter(|(player, _)| candidates.contains(player))
            .max_by_key(|(player, count)| (**count, std::cmp::Reverse(**player)))
            .map(|(player, count)| (*player, *count))
    }
}

/// Policy interface for simulated voters.
pub trait VotePolicy {
    fn name(&self) -> &'static str;

    fn pick_vote(&mut self, view: &VoterView<'_>) -> VoteValue;
}

/// Built-in voting strategies for simulated players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VotingStrategy {
    Random,
    Bandwagon,
    Cautious,
}

impl VotingStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Bandwagon => "bandwagon",
            Self::Cautious => "cautious",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn VotePolicy + Send> {
        let rng = ChaCha20Rng::seed_from_u64(seed);
        match self {
            Self::Random => Box::new(RandomPolicy { rng }),
            Self::Bandwagon => Box::new(BandwagonPolicy { rng }),
            Self::Cautious => Box::new(CautiousPolicy { rng }),
        }
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct RandomPolicy {
    rng: ChaCha20Rng,
}

struct BandwagonPolicy {
    rng: ChaCha20Rng,
}

struct CautiousPolicy {
    rng: ChaCha20Rng,
}

fn random_target(rng: &mut ChaCha20Rng, view: &VoterView<'_>) -> VoteValue {
    view.candidates()
        .choose(rng)
        .copied()
        .map_or(VoteValue::Abstain, VoteValue::Player)
}

impl VotePolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn pick_vote(&mut self, view: &VoterView<'_>) -> VoteValue {
        match self.rng.gen_range(0..10) {
            0 => VoteValue::Abstain,
            1 => VoteValue::Veto,
            _ => random_target(&mut self.rng, view),
        }
    }
}

impl VotePolicy for BandwagonPolicy {
    fn name(&self) -> &'static str {
        "bandwagon"
    }

    fn pick_vote(&mut self, view: &VoterView<'_>) -> VoteValue {
        match view.leader() {
            Some((leader, _)) => VoteValue::Player(leader),
            None => random_target(&mut self.rng, view),
        }
    }
}

impl VotePolicy for CautiousPolicy {
    fn name(&self) -> &'static str {
        "cautious"
    }

    fn pick_vote(&mut self, view: &VoterView<'_>) -> VoteValue {
        match view.leader() {
            Some((leader, count)) if count >= 2 => VoteValue::Player(leader),
            _ if self.rng.gen_bool(0.5) => VoteValue::Abstain,
            _ => random_target(&mut self.rng, view),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solaris_game::{VoteLedger, resolve};
    use std::collections::BTreeSet;

    fn standings(votes: &[(i64, i64)], living: &[PlayerId]) -> TallyResult {
        let mut ledger = VoteLedger::open(1);
        let set: BTreeSet<PlayerId> = living.iter().copied().collect();
        for (voter, target) in votes {
            ledger
                .cast_vote(PlayerId(*voter), VoteValue::Player(PlayerId(*target)), &set)
                .unwrap();
        }
        resolve(&ledger, &set)
    }

    #[test]
    fn saboteurs_never_name_teammates() {
        let living: Vec<PlayerId> = (1..=6).map(PlayerId).collect();
        let teammates = [PlayerId(1), PlayerId(2)];
        let standings = standings(&[(3, 2), (4, 2), (5, 2)], &living);
        let view = VoterView {
            voter: PlayerId(1),
            team: Team::Saboteur,
            living: &living,
            teammates: &teammates,
            standings: &standings,
        };
        for strategy in [
            VotingStrategy::Random,
            VotingStrategy::Bandwagon,
            VotingStrategy::Cautious,
        ] {
            let mut policy = strategy.create_policy(99);
            for _ in 0..50 {
                let vote = policy.pick_vote(&view);
                assert!(
                    !matches!(vote, VoteValue::Player(p) if teammates.contains(&p)),
                    "{} named a teammate",
                    policy.name()
                );
            }
        }
    }

    #[test]
    fn bandwagon_follows_the_leader() {
        let living: Vec<PlayerId> = (1..=5).map(PlayerId).collect();
        let standings = standings(&[(1, 4), (2, 4), (3, 5)], &living);
        let view = VoterView {
            voter: PlayerId(5),
            team: Team::Crew,
            living: &living,
            teammates: &[],
            standings: &standings,
        };
        let mut policy = VotingStrategy::Bandwagon.create_policy(1);
        assert_eq!(policy.pick_vote(&view), VoteValue::Player(PlayerId(4)));
    }

    #[test]
    fn lone_voter_abstains_without_candidates() {
        let living = [PlayerId(7)];
        let standings = standings(&[], &living);
        let view = VoterView {
            voter: PlayerId(7),
            team: Team::Crew,
            living: &living,
            teammates: &[],
            standings: &standings,
        };
        assert!(view.candidates().is_empty());
        let mut policy = VotingStrategy::Bandwagon.create_policy(3);
        assert_eq!(policy.pick_vote(&view), VoteValue::Abstain);
    }
}
