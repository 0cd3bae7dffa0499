use anyhow::{Result, ensure};
use solaris_game::{TallyReason, Team};

use crate::logic::policy::VotingStrategy;
use crate::logic::simulation::{Opening, SimulationPlan, SimulationSummary};
use crate::script::bundled_script;

#[derive(Debug, Clone)]
pub enum ScenarioKind {
    Simulation(SimulationPlan),
    /// Command scripts, each run line by line against a fresh registry.
    Script(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub kind: ScenarioKind,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Simulation(plan),
        }
    }

    #[must_use]
    pub fn script(name: impl Into<String>, bodies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Script(bodies),
        }
    }
}

const CATALOG: &[(&str, &str)] = &[
    ("smoke", "Five players, three random days, invariants hold"),
    ("full-game", "Eight bandwagon voters play until a team wins"),
    ("tie-handling", "A split first day eliminates nobody"),
    ("abstain-majority", "An all-abstain first day eliminates nobody"),
    ("restart-recovery", "Registry saved and restored after every day"),
    ("concurrent-votes", "Twelve voters cast each day's votes from parallel threads"),
    ("parallel-sessions", "Four games advance side by side in one registry"),
    ("flaky-collaborator", "Every third notification fails; core state is unaffected"),
    ("scripted", "Bundled command scripts replayed through the command layer"),
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG.to_vec()
}

/// Every catalog name, in listing order.
pub fn all_scenario_names() -> Vec<String> {
    CATALOG.iter().map(|(name, _)| (*name).to_string()).collect()
}

fn clean_run(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.violations.is_empty(),
        "invariant violations: {}",
        summary.violations.join("; ")
    );
    ensure!(
        summary.games.iter().all(|g| g.votes_cast > 0),
        "every game should record votes"
    );
    for game in &summary.games {
        ensure!(
            game.eliminated.len() == game.count(TallyReason::Elimination),
            "{}: {} eliminations but {} elimination days",
            game.session,
            game.eliminated.len(),
            game.count(TallyReason::Elimination)
        );
        ensure!(
            game.reasons.len() == game.days as usize,
            "{}: {} results over {} days",
            game.session,
            game.reasons.len(),
            game.days
        );
    }
    Ok(())
}

fn winner_matches_survivors(summary: &SimulationSummary) -> Result<()> {
    clean_run(summary)?;
    for game in &summary.games {
        let counts = game.final_counts;
        match game.winner {
            Some(Team::Crew) => ensure!(
                counts.saboteurs == 0,
                "{}: crew won with {} saboteurs alive",
                game.session,
                counts.saboteurs
            ),
            Some(Team::Saboteur) => ensure!(
                counts.saboteurs * 2 >= counts.total(),
                "{}: saboteurs won while outnumbered ({} of {})",
                game.session,
                counts.saboteurs,
                counts.total()
            ),
            None => ensure!(
                counts.saboteurs > 0 && counts.saboteurs * 2 < counts.total(),
                "{}: no winner declared for a decided game",
                game.session
            ),
        }
    }
    Ok(())
}

fn game_finished(summary: &SimulationSummary) -> Result<()> {
    winner_matches_survivors(summary)?;
    ensure!(
        summary.games.iter().all(|g| g.winner.is_some()),
        "a game was still running after its day limit"
    );
    Ok(())
}

fn first_day_spared(summary: &SimulationSummary) -> Result<()> {
    clean_run(summary)?;
    for game in &summary.games {
        let reason = game.reasons.first().copied();
        ensure!(
            matches!(
                reason,
                Some(TallyReason::Tie | TallyReason::MajorityAbstain)
            ),
            "{}: day 1 resolved as {reason:?}",
            game.session
        );
    }
    Ok(())
}

fn survived_restarts(summary: &SimulationSummary) -> Result<()> {
    winner_matches_survivors(summary)?;
    let decided_on_day_one = summary.games.iter().all(|g| g.days <= 1);
    ensure!(
        summary.restarts > 0 || decided_on_day_one,
        "no restart happened"
    );
    Ok(())
}

fn all_sessions_reported(summary: &SimulationSummary) -> Result<()> {
    winner_matches_survivors(summary)?;
    ensure!(
        summary.games.len() == 4,
        "expected 4 games, saw {}",
        summary.games.len()
    );
    Ok(())
}

fn outages_absorbed(summary: &SimulationSummary) -> Result<()> {
    winner_matches_survivors(summary)?;
    ensure!(
        summary.delivery.failed > 0,
        "flaky collaborator never failed"
    );
    ensure!(
        summary.delivery.delivered > summary.delivery.failed,
        "most deliveries should succeed"
    );
    Ok(())
}

/// Look up a catalog scenario by name.
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let plan = match name {
        "smoke" => SimulationPlan::new(5, VotingStrategy::Random)
            .with_max_days(3)
            .with_expectation(clean_run),
        "full-game" => {
            SimulationPlan::new(8, VotingStrategy::Bandwagon).with_expectation(game_finished)
        }
        "tie-handling" => SimulationPlan::new(6, VotingStrategy::Cautious)
            .with_opening(Opening::Tie)
            .with_expectation(first_day_spared),
        "abstain-majority" => SimulationPlan::new(6, VotingStrategy::Random)
            .with_opening(Opening::Abstain)
            .with_expectation(first_day_spared),
        "restart-recovery" => SimulationPlan::new(7, VotingStrategy::Bandwagon)
            .with_restarts()
            .with_expectation(survived_restarts),
        "concurrent-votes" => SimulationPlan::new(12, VotingStrategy::Random)
            .with_concurrent_votes()
            .with_expectation(winner_matches_survivors),
        "parallel-sessions" => SimulationPlan::new(6, VotingStrategy::Cautious)
            .with_sessions(4)
            .with_expectation(all_sessions_reported),
        "flaky-collaborator" => SimulationPlan::new(6, VotingStrategy::Bandwagon)
            .with_flaky_period(3)
            .with_expectation(outages_absorbed),
        "scripted" => {
            let bodies = ["signup-guards", "npc-game"]
                .iter()
                .filter_map(|key| bundled_script(key))
                .map(str::to_string)
                .collect();
            return Some(TestScenario::script(name, bodies));
        }
        _ => return None,
    };
    Some(TestScenario::simulation(name, plan))
}
