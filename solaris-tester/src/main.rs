mod collaborator;
mod commands;
mod common;
mod logic;
mod script;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinSet;

use common::split_csv;
use logic::{
    GameSimulator, LogicTester, ScenarioResult, TestScenario, all_scenario_names, get_scenario,
    list_scenarios, resolve_seed_inputs,
};
use solaris_game::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "solaris-tester", version = "0.1.0")]
#[command(about = "Simulated games and command scripts for the Solaris game engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers or words)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Override the number of seats in simulated games
    #[arg(long)]
    players: Option<usize>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON file used to persist the registry across simulated restarts
    #[arg(long)]
    store: Option<PathBuf>,

    /// JSON file with game configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command script to run as the `scripted` scenario instead of the bundled ones
    #[arg(long)]
    script: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = load_config(args.config.as_ref())?;
    let scenarios = resolve_scenarios(&args)?;
    let seeds: Vec<u64> = resolve_seed_inputs(&split_csv(&args.seeds))?
        .into_iter()
        .map(|info| info.seed)
        .collect();

    let mut simulator = GameSimulator::new(config);
    if let Some(path) = &args.store {
        simulator = simulator.with_store(path);
    }
    if let Some(players) = args.players {
        simulator = simulator.with_players(players);
    }
    let tester = LogicTester::new(simulator, args.verbose);

    let results = run_scenarios(tester, scenarios, seeds, args.iterations).await?;
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🛰  Solaris Game Tester".bright_cyan().bold());
    println!("{}", "======================".cyan());
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    GameConfig::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for name in all_scenario_names() {
            if !scenarios.contains(&name) {
                scenarios.push(name);
            }
        }
    }
    scenarios
}

fn resolve_scenarios(args: &Args) -> Result<Vec<TestScenario>> {
    let custom_script = args
        .script
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))
        })
        .transpose()?;

    let mut resolved = Vec::new();
    for name in expand_scenarios(&args.scenarios) {
        if name == "scripted"
            && let Some(body) = &custom_script
        {
            resolved.push(TestScenario::script(name, vec![body.clone()]));
            continue;
        }
        match get_scenario(&name) {
            Some(scenario) => resolved.push(scenario),
            None => eprintln!("⚠️  Unknown scenario: {}", name.yellow()),
        }
    }
    Ok(resolved)
}

/// Each scenario runs on the blocking pool; results keep the requested order.
async fn run_scenarios(
    tester: LogicTester,
    scenarios: Vec<TestScenario>,
    seeds: Vec<u64>,
    iterations: usize,
) -> Result<Vec<ScenarioResult>> {
    println!("{}", "🧠 Running Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let mut tasks = JoinSet::new();
    for (index, scenario) in scenarios.into_iter().enumerate() {
        let tester = tester.clone();
        let seeds = seeds.clone();
        tasks.spawn_blocking(move || (index, tester.run_scenario(&scenario, &seeds, iterations)));
    }

    let mut batches = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        batches.push(joined.context("scenario task failed")?);
    }
    batches.sort_by_key(|(index, _)| *index);
    Ok(batches.into_iter().flat_map(|(_, results)| results).collect())
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => logic::reports::generate_json_report(&mut output_target, results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Solaris Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    if args.report != ReportFormat::Json {
        writeln!(&mut output_target)?;
        writeln!(
            &mut output_target,
            "🏁 Total time: {:?}",
            start_time.elapsed()
        )?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            players: None,
            report: ReportFormat::Console,
            output: None,
            store: None,
            config: None,
            script: None,
            verbose: false,
        }
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1337,
            passed,
            iterations_run: 1,
            successful_iterations: usize::from(passed),
            failures: Vec::new(),
            average_duration: Duration::ZERO,
            performance_data: Vec::new(),
        }
    }

    #[test]
    fn expand_scenarios_handles_all() {
        let scenarios = expand_scenarios("smoke,all");
        assert_eq!(scenarios[0], "smoke");
        assert_eq!(scenarios.len(), all_scenario_names().len());
        assert!(scenarios.contains(&"parallel-sessions".to_string()));
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(path.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("restart-recovery"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let args = Args {
            report: ReportFormat::Markdown,
            output: Some(path.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_emits_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let args = Args {
            report: ReportFormat::Json,
            output: Some(path.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value[0]["scenario_name"], "smoke");
    }

    #[test]
    fn load_config_reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"min_players": 5}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.min_players, 5);
        assert_eq!(load_config(None).unwrap(), GameConfig::default());
    }

    #[test]
    fn custom_script_replaces_bundled_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.txt");
        std::fs::write(&path, "@1 new_game Custom\nexpect_phase Custom signup\n").unwrap();
        let args = Args {
            scenarios: "scripted,bogus".to_string(),
            script: Some(path),
            ..base_args()
        };
        let scenarios = resolve_scenarios(&args).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert!(matches!(
            &scenarios[0].kind,
            logic::scenarios::ScenarioKind::Script(bodies) if bodies.len() == 1
        ));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }
}
