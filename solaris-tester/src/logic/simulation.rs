//! Simulated games played by NPC voters against a real registry.
use anyhow::{Context, Result};
use solaris_game::{
    ActionOutcome, Collaborator, DispatchReport, GameConfig, GameSession, PlayerId, Requester,
    SessionRegistry, SessionStore, TallyReason, Team, TeamCounts, VoteValue, check_invariants,
    derive_session_seed, dispatch_effects, members_of, resolve, team_counts,
};
use std::path::PathBuf;

use crate::collaborator::{ConsoleCollaborator, DeliveryError, FlakyCollaborator};
use crate::common::timestamp_label;
use crate::logic::policy::{VotePolicy, VoterView, VotingStrategy};
use crate::store::JsonFileStore;

pub const DEFAULT_MAX_DAYS: u32 = 30;

type SharedCollaborator = Box<dyn Collaborator<Error = DeliveryError> + Send + Sync>;

/// Canned first-day vote pattern, overriding the policy for day 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    /// Two players trade votes and everyone else vetoes.
    Tie,
    /// Every living player abstains.
    Abstain,
}

pub type Expectation = fn(&SimulationSummary) -> Result<()>;

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub players: usize,
    pub strategy: VotingStrategy,
    pub max_days: u32,
    pub sessions: usize,
    pub opening: Option<Opening>,
    pub flaky_period: Option<usize>,
    pub restart_each_day: bool,
    pub concurrent_votes: bool,
    pub expectations: Vec<Expectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(players: usize, strategy: VotingStrategy) -> Self {
        Self {
            players,
            strategy,
            max_days: DEFAULT_MAX_DAYS,
            sessions: 1,
            opening: None,
            flaky_period: None,
            restart_each_day: false,
            concurrent_votes: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days;
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn with_opening(mut self, opening: Opening) -> Self {
        self.opening = Some(opening);
        self
    }

    #[must_use]
    pub fn with_flaky_period(mut self, period: usize) -> Self {
        self.flaky_period = Some(period);
        self
    }

    #[must_use]
    pub fn with_restarts(mut self) -> Self {
        self.restart_each_day = true;
        self
    }

    #[must_use]
    pub fn with_concurrent_votes(mut self) -> Self {
        self.concurrent_votes = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// How one session played out.
#[derive(Debug, Clone, Default)]
pub struct GameSummary {
    pub session: String,
    pub days: u32,
    pub winner: Option<Team>,
    pub eliminated: Vec<PlayerId>,
    pub reasons: Vec<TallyReason>,
    pub votes_cast: usize,
    pub final_counts: TeamCounts,
}

impl GameSummary {
    #[must_use]
    pub fn count(&self, reason: TallyReason) -> usize {
        self.reasons.iter().filter(|r| **r == reason).count()
    }
}

#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: VotingStrategy,
    pub games: Vec<GameSummary>,
    pub delivery: DispatchReport,
    pub restarts: usize,
    pub violations: Vec<String>,
}

impl SimulationSummary {
    #[must_use]
    pub fn total_days(&self) -> u32 {
        self.games.iter().map(|g| g.days).sum()
    }
}

/// Plays simulation plans against fresh registries.
#[derive(Debug, Clone)]
pub struct GameSimulator {
    config: GameConfig,
    store_path: Option<PathBuf>,
    players_override: Option<usize>,
}

impl GameSimulator {
    #[must_use]
    pub const fn new(config: GameConfig) -> Self {
        Self {
            config,
            store_path: None,
            players_override: None,
        }
    }

    /// Persist restarts to `path` instead of a scratch file.
    #[must_use]
    pub fn with_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_players(mut self, players: usize) -> Self {
        self.players_override = Some(players);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    fn store_for(&self, seed: u64) -> (JsonFileStore, bool) {
        match &self.store_path {
            Some(path) => (JsonFileStore::new(path), false),
            None => {
                let stamp = timestamp_label(chrono::Utc::now());
                let nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos();
                let path = std::env::temp_dir()
                    .join(format!("solaris-sim-{stamp}-{seed}-{nanos}.json"));
                (JsonFileStore::new(path), true)
            }
        }
    }

    /// Play `plan` with registry seed `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if a transition the harness expects to succeed is
    /// rejected, or if a restart cannot save or reload the registry.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let collaborator: SharedCollaborator = match plan.flaky_period {
            Some(period) => Box::new(FlakyCollaborator::new(period)),
            None => Box::new(ConsoleCollaborator::new(false)),
        };
        let players = self.players_override.unwrap_or(plan.players);
        let mut run = Run {
            registry: SessionRegistry::with_seed(self.config.clone(), seed),
            collaborator,
            delivery: DispatchReport::default(),
            violations: Vec::new(),
            restarts: 0,
        };

        let names: Vec<String> = (0..plan.sessions.max(1))
            .map(|index| format!("Sim{seed}-{index}"))
            .collect();
        for (index, name) in names.iter().enumerate() {
            run.setup(name, host_id(index), players)
                .with_context(|| format!("setting up {name}"))?;
        }

        let (store, scratch) = self.store_for(seed);
        let mut policies: Vec<Box<dyn VotePolicy + Send>> = names
            .iter()
            .map(|name| plan.strategy.create_policy(derive_session_seed(seed, name)))
            .collect();
        let mut games: Vec<GameSummary> = names
            .iter()
            .map(|name| GameSummary {
                session: name.clone(),
                ..GameSummary::default()
            })
            .collect();

        let result = run.play_days(plan, &names, &mut policies, &mut games, &store, seed);
        if scratch {
            let _ = std::fs::remove_file(store.path());
        }
        result?;

        for game in &mut games {
            let session = run.registry.get(&game.session)?;
            game.final_counts = team_counts(&session.living(), session.roles());
        }

        Ok(SimulationSummary {
            seed,
            strategy: plan.strategy,
            games,
            delivery: run.delivery,
            restarts: run.restarts,
            violations: run.violations,
        })
    }
}

const fn host_id(index: usize) -> PlayerId {
    PlayerId(1000 * (index as i64 + 1))
}

struct Run {
    registry: SessionRegistry,
    collaborator: SharedCollaborator,
    delivery: DispatchReport,
    violations: Vec<String>,
    restarts: usize,
}

impl Run {
    fn play_days(
        &mut self,
        plan: &SimulationPlan,
        names: &[String],
        policies: &mut [Box<dyn VotePolicy + Send>],
        games: &mut [GameSummary],
        store: &JsonFileStore,
        seed: u64,
    ) -> Result<()> {
        for day in 1..=plan.max_days {
            if plan.concurrent_votes || names.len() > 1 {
                self.play_day_parallel(plan, day, names, policies, games)?;
            } else {
                let sessions = names.iter().zip(policies.iter_mut()).zip(games.iter_mut());
                for ((name, policy), game) in sessions {
                    if game.winner.is_none() {
                        self.play_day(plan, day, name, policy.as_mut(), game)?;
                    }
                }
            }
            if games.iter().all(|game| game.winner.is_some()) {
                break;
            }
            if plan.restart_each_day {
                self.restart(store, seed)?;
            }
        }
        Ok(())
    }

    fn commit(&mut self, outcome: &ActionOutcome) {
        let report = dispatch_effects(self.collaborator.as_ref(), &outcome.effects);
        self.delivery.delivered += report.delivered;
        self.delivery.failed += report.failed;
        if let Err(violation) = check_invariants(&outcome.session) {
            self.violations.push(violation.to_string());
        }
    }

    fn setup(&mut self, name: &str, host: PlayerId, players: usize) -> Result<()> {
        let created = self.registry.create(name, host)?;
        self.commit(&created);
        let joined = self.registry.join(name, host)?;
        self.commit(&joined);
        for seat in 1..players {
            let npc = self.registry.create_npc(&format!("{name}-npc{seat}"), None)?;
            let joined = self.registry.join(name, npc.id)?;
            self.commit(&joined);
        }
        let started = self.registry.start(name, Requester::player(host))?;
        self.commit(&started);
        Ok(())
    }

    fn restart(&mut self, store: &JsonFileStore, seed: u64) -> Result<()> {
        self.registry
            .save_to(store)
            .with_context(|| format!("saving to {}", store.path().display()))?;
        let state = store
            .load()?
            .with_context(|| format!("{} vanished after save", store.path().display()))?;
        let config = self.registry.config().clone();
        self.registry = SessionRegistry::restore(config, seed, state)
            .context("restoring the saved registry")?;
        self.restarts += 1;
        if let Some(saved_at) = store.saved_at()? {
            log::debug!(
                "restarted registry from {} (saved {})",
                store.path().display(),
                timestamp_label(saved_at)
            );
        }
        Ok(())
    }

    fn plan_votes(
        session: &GameSession,
        plan: &SimulationPlan,
        day: u32,
        policy: &mut dyn VotePolicy,
    ) -> Vec<(PlayerId, VoteValue)> {
        let living = session.living_in_join_order();
        if day == 1
            && let Some(opening) = plan.opening
        {
            return opening_votes(opening, &living);
        }
        let living_set = session.living();
        let saboteurs = members_of(session.roles(), Team::Saboteur);
        let mut ledger = session
            .current_ledger()
            .cloned()
            .unwrap_or_else(|| solaris_game::VoteLedger::open(day));
        let mut votes = Vec::with_capacity(living.len());
        for voter in &living {
            let team = session.role_of(*voter).map_or(Team::Crew, |role| role.team());
            let standings = resolve(&ledger, &living_set);
            let view = VoterView {
                voter: *voter,
                team,
                living: &living,
                teammates: &saboteurs,
                standings: &standings,
            };
            let value = policy.pick_vote(&view);
            // Later voters see earlier choices, as they would in chat.
            let _ = ledger.cast_vote(*voter, value, &living_set);
            votes.push((*voter, value));
        }
        votes
    }

    fn record_end_of_day(
        &mut self,
        name: &str,
        host: PlayerId,
        day: u32,
        game: &mut GameSummary,
    ) -> Result<()> {
        let ended = self.registry.end_day(name, Requester::player(host))?;
        self.commit(&ended);
        let session = &ended.session;
        let result = session
            .result(day)
            .with_context(|| format!("{name} has no result for day {day}"))?;
        game.days = day;
        game.reasons.push(result.reason);
        if let Some(player) = result.eliminated {
            game.eliminated.push(player);
        }
        game.winner = session.outcome();
        Ok(())
    }

    fn play_day(
        &mut self,
        plan: &SimulationPlan,
        day: u32,
        name: &str,
        policy: &mut dyn VotePolicy,
        game: &mut GameSummary,
    ) -> Result<()> {
        let session = self.registry.get(name)?;
        for (voter, value) in Self::plan_votes(&session, plan, day, policy) {
            let cast = self.registry.cast_vote(name, voter, value)?;
            self.commit(&cast);
            game.votes_cast += 1;
        }
        self.record_end_of_day(name, session.creator(), day, game)
    }

    /// Every active session's votes for `day` land from their own threads,
    /// then each day is closed in turn.
    fn play_day_parallel(
        &mut self,
        plan: &SimulationPlan,
        day: u32,
        names: &[String],
        policies: &mut [Box<dyn VotePolicy + Send>],
        games: &mut [GameSummary],
    ) -> Result<()> {
        let mut batches = Vec::new();
        for ((name, policy), game) in names.iter().zip(policies.iter_mut()).zip(games.iter()) {
            if game.winner.is_some() {
                continue;
            }
            let session = self.registry.get(name)?;
            let votes = Self::plan_votes(&session, plan, day, policy.as_mut());
            batches.push((name.as_str(), votes));
        }

        let registry = &self.registry;
        let collaborator = self.collaborator.as_ref();
        let outcomes: Vec<Result<(usize, DispatchReport, Vec<String>)>> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = batches
                    .iter()
                    .flat_map(|(name, votes)| {
                        votes.iter().map(move |(voter, value)| {
                            scope.spawn(move || -> Result<(usize, DispatchReport, Vec<String>)> {
                                let cast = registry.cast_vote(name, *voter, *value)?;
                                let report = dispatch_effects(collaborator, &cast.effects);
                                let violations = check_invariants(&cast.session)
                                    .err()
                                    .map(|v| v.to_string())
                                    .into_iter()
                                    .collect();
                                Ok((1, report, violations))
                            })
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(anyhow::anyhow!("vote thread panicked")))
                    })
                    .collect()
            });

        let mut cast_per_session = vec![0usize; names.len()];
        let mut flat = outcomes.into_iter();
        for (name, votes) in &batches {
            let index = names
                .iter()
                .position(|candidate| candidate.as_str() == *name)
                .context("batch for unknown session")?;
            for _ in votes {
                let (cast, report, violations) = flat
                    .next()
                    .context("missing vote outcome")??;
                cast_per_session[index] += cast;
                self.delivery.delivered += report.delivered;
                self.delivery.failed += report.failed;
                self.violations.extend(violations);
            }
        }

        for (index, name) in names.iter().enumerate() {
            let game = &mut games[index];
            if game.winner.is_some() {
                continue;
            }
            game.votes_cast += cast_per_session[index];
            let session = self.registry.get(name)?;
            let ledger_size = session.current_ledger().map_or(0, |ledger| ledger.len());
            let expected = batches
                .iter()
                .find(|(batch, _)| *batch == name.as_str())
                .map_or(0, |(_, votes)| votes.len());
            if ledger_size != expected {
                self.violations.push(format!(
                    "{name} day {day}: ledger holds {ledger_size} votes after {expected} casts"
                ));
            }
            self.record_end_of_day(name, session.creator(), day, game)?;
        }
        Ok(())
    }
}

fn opening_votes(opening: Opening, living: &[PlayerId]) -> Vec<(PlayerId, VoteValue)> {
    match opening {
        Opening::Abstain => living.iter().map(|p| (*p, VoteValue::Abstain)).collect(),
        Opening::Tie => living
            .iter()
            .enumerate()
            .map(|(index, voter)| {
                let value = match (index, living.first(), living.get(1)) {
                    (0, _, Some(second)) => VoteValue::Player(*second),
                    (1, Some(first), _) => VoteValue::Player(*first),
                    _ => VoteValue::Veto,
                };
                (*voter, value)
            })
            .collect(),
    }
}
