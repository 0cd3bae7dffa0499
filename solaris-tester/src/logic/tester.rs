use colored::Colorize;
use serde::{Deserialize, Serialize};
use solaris_game::SessionRegistry;
use std::time::{Duration, Instant};

use crate::collaborator::ConsoleCollaborator;
use crate::commands::CommandRunner;
use crate::logic::scenarios::{ScenarioKind, TestScenario};
use crate::logic::simulation::{GameSimulator, SimulationPlan, SimulationSummary};
use crate::script::run_script;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

#[derive(Debug, Clone)]
pub struct LogicTester {
    simulator: GameSimulator,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(simulator: GameSimulator, verbose: bool) -> Self {
        Self { simulator, verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {})",
                    scenario.name.bright_white(),
                    seed
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let outcome = match &scenario.kind {
                ScenarioKind::Simulation(plan) => self.run_simulation(plan, iteration_seed),
                ScenarioKind::Script(bodies) => self.run_scripts(bodies, iteration_seed),
            };

            match outcome {
                Ok(detail) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) {detail}",
                            i + 1,
                            iterations
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err}", i + 1);
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            err.red()
                        );
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_simulation(&self, plan: &SimulationPlan, seed: u64) -> Result<String, String> {
        let summary = self
            .simulator
            .run_plan(plan, seed)
            .map_err(|err| format!("{err:#}"))?;
        for expectation in &plan.expectations {
            expectation(&summary)
                .map_err(|err| format!("{err} | {}", summarize_games(&summary)))?;
        }
        Ok(summarize_games(&summary))
    }

    fn run_scripts(&self, bodies: &[String], seed: u64) -> Result<String, String> {
        let mut lines = 0;
        let mut rejected = 0;
        for body in bodies {
            let registry = SessionRegistry::with_seed(self.simulator.config().clone(), seed);
            let console = ConsoleCollaborator::new(false);
            let mut runner = CommandRunner::new(&registry, &console);
            let report = run_script(&mut runner, body).map_err(|err| err.to_string())?;
            if self.verbose {
                for reply in &report.replies {
                    println!("     {reply}");
                }
            }
            lines += report.executed;
            rejected += report.rejected;
        }
        Ok(format!("lines:{lines} rejected:{rejected}"))
    }
}

fn summarize_games(summary: &SimulationSummary) -> String {
    summary
        .games
        .iter()
        .map(|game| {
            let winner = game.winner.map_or("none", |team| team.as_str());
            format!(
                "{} days:{} out:{} winner:{} votes:{}",
                game.session,
                game.days,
                game.eliminated.len(),
                winner,
                game.votes_cast
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        durations
            .iter()
            .map(Duration::as_millis)
            .collect::<Vec<u128>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Vec::<u128>::deserialize(deserializer)?
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
