//! Text commands mirroring the bot's slash commands.
//!
//! A line reads `[@id | @@id] command args...`. A single `@` marks the issuing
//! player; a doubled `@@` marks a player with moderator standing. NPC and
//! assertion commands need no actor.
use regex::Regex;
use solaris_game::{
    Action, Collaborator, DispatchReport, GameError, NpcError, Phase, PlayerId, Requester,
    SessionRegistry, Team, VoteValue, dispatch_effects,
};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

const INVALID_TARGET: &str =
    "Invalid vote target! Use @mention, an NPC name, 'Abstain', or 'Veto'.";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?(-?\d+)>$").expect("mention pattern compiles"));
static ACTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@(@)?(-?\d+)$").expect("actor pattern compiles"));

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("cannot parse `{line}`: {reason}")]
    Parse { line: String, reason: String },
    #[error("`{0}` needs an acting player (prefix the line with @id)")]
    MissingActor(&'static str),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Npc(#[from] NpcError),
    #[error("expectation failed: {0}")]
    Expectation(String),
}

impl CommandError {
    fn parse(line: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Reply the bot would post for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Game(err) => describe_error(err),
            Self::Npc(NpcError::DuplicateName(name)) => {
                format!("❌ An NPC named {name} already exists!")
            }
            Self::Npc(NpcError::UnknownNpc(name)) => format!("❌ No NPC named {name} exists!"),
            Self::Npc(NpcError::InvalidName(_)) => {
                "❌ NPC names must be a single word of at most 64 characters!".to_string()
            }
            Self::Parse { reason, .. } => format!("❌ {reason}"),
            other => format!("❌ {other}"),
        }
    }
}

/// Render a core error as the reply a player sees.
pub fn describe_error(err: &GameError) -> String {
    let text = match err {
        GameError::WrongPhase {
            action: Action::Join | Action::Leave | Action::Start,
            ..
        } => "This game has already started or ended!".to_string(),
        GameError::WrongPhase {
            action: Action::Archive,
            ..
        } => "Only finished games can be archived!".to_string(),
        GameError::WrongPhase { phase, .. } if *phase == Phase::Signup => {
            "This game has not started yet!".to_string()
        }
        GameError::WrongPhase { .. } => "This game is not currently active!".to_string(),
        GameError::NotAuthorized { .. } => {
            "Only the game creator or a moderator can do that!".to_string()
        }
        GameError::AlreadyJoined { .. } => "You've already joined this game!".to_string(),
        GameError::NotJoined { .. } => "You haven't joined this game!".to_string(),
        GameError::NotALivingPlayer { .. } => {
            "You are not a living player in this game and cannot vote!".to_string()
        }
        GameError::InvalidVoteTarget { .. } => {
            "That player is not in this game or has been eliminated!".to_string()
        }
        GameError::InsufficientPlayers {
            required, joined, ..
        } => format!("Need at least {required} players to start! (currently {joined})"),
        GameError::LedgerFrozen { day, .. } => {
            format!("Voting for day {day} has already closed!")
        }
        GameError::UnknownSession { session } => format!("No game named {session} was found!"),
        GameError::DuplicateSessionName { session } => {
            format!("A game named {session} is already running!")
        }
        GameError::InvalidSessionName { .. } => {
            "Game names must be between 1 and 64 characters!".to_string()
        }
    };
    format!("❌ {text}")
}

/// Who a vote names, before NPC names are resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTarget {
    Mention(PlayerId),
    Npc(String),
    Abstain,
    Veto,
}

impl FromStr for VoteTarget {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("abstain") {
            return Ok(Self::Abstain);
        }
        if raw.eq_ignore_ascii_case("veto") {
            return Ok(Self::Veto);
        }
        if let Some(caps) = MENTION.captures(raw) {
            return caps[1]
                .parse::<i64>()
                .map(|id| Self::Mention(PlayerId(id)))
                .map_err(|_| INVALID_TARGET.to_string());
        }
        if raw.is_empty() || raw.starts_with('<') || raw.starts_with('@') {
            return Err(INVALID_TARGET.to_string());
        }
        Ok(Self::Npc(raw.to_string()))
    }
}

impl VoteTarget {
    fn resolve(&self, registry: &SessionRegistry) -> Result<VoteValue, CommandError> {
        Ok(match self {
            Self::Mention(id) => VoteValue::Player(*id),
            Self::Npc(name) => VoteValue::Player(npc_id(registry, name)?),
            Self::Abstain => VoteValue::Abstain,
            Self::Veto => VoteValue::Veto,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewGame { session: String },
    Join { session: String },
    Leave { session: String },
    Start { session: String },
    Vote { session: String, target: VoteTarget },
    EndDay { session: String },
    NpcCreate { name: String, persona: Option<String> },
    NpcDelete { name: String },
    NpcJoin { session: String, npc: String },
    NpcVote { session: String, npc: String, target: VoteTarget },
    ExpectPhase { session: String, phase: Phase },
    ExpectWinner { session: String, winner: Option<Team> },
    ExpectAlive { session: String, count: usize },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewGame { .. } => "new_game",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Start { .. } => "start",
            Self::Vote { .. } => "vote",
            Self::EndDay { .. } => "end_day",
            Self::NpcCreate { .. } => "npc_create",
            Self::NpcDelete { .. } => "npc_delete",
            Self::NpcJoin { .. } => "npc_join",
            Self::NpcVote { .. } => "npc_vote",
            Self::ExpectPhase { .. } => "expect_phase",
            Self::ExpectWinner { .. } => "expect_winner",
            Self::ExpectAlive { .. } => "expect_alive",
        }
    }

    const fn needs_actor(&self) -> bool {
        matches!(
            self,
            Self::NewGame { .. }
                | Self::Join { .. }
                | Self::Leave { .. }
                | Self::Start { .. }
                | Self::Vote { .. }
                | Self::EndDay { .. }
        )
    }
}

/// One parsed line: the command plus whoever issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub actor: Option<Requester>,
    pub command: Command,
}

impl FromStr for Invocation {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace().peekable();
        let actor = match tokens.peek().copied().and_then(|first| ACTOR.captures(first)) {
            Some(caps) => {
                let id = caps[2]
                    .parse::<i64>()
                    .map_err(|err| CommandError::parse(line, err.to_string()))?;
                let moderator = caps.get(1).is_some();
                tokens.next();
                Some(Requester {
                    id: PlayerId(id),
                    moderator,
                })
            }
            None => None,
        };
        let rest: Vec<&str> = tokens.collect();
        let (verb, args) = rest
            .split_first()
            .ok_or_else(|| CommandError::parse(line, "empty command"))?;
        let command = parse_command(line, verb, args)?;
        if command.needs_actor() && actor.is_none() {
            return Err(CommandError::MissingActor(command.name()));
        }
        Ok(Self { actor, command })
    }
}

fn arg<'a>(line: &str, args: &[&'a str], index: usize, what: &str) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .ok_or_else(|| CommandError::parse(line, format!("missing {what}")))
}

fn exact(line: &str, args: &[&str], expected: usize) -> Result<(), CommandError> {
    if args.len() > expected {
        return Err(CommandError::parse(
            line,
            format!("unexpected `{}`", args[expected..].join(" ")),
        ));
    }
    Ok(())
}

fn parse_phase(line: &str, raw: &str) -> Result<Phase, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "signup" => Ok(Phase::Signup),
        "active" => Ok(Phase::Active),
        "ended" => Ok(Phase::Ended),
        other => Err(CommandError::parse(line, format!("unknown phase `{other}`"))),
    }
}

fn parse_winner(line: &str, raw: &str) -> Result<Option<Team>, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "crew" => Ok(Some(Team::Crew)),
        "saboteur" | "saboteurs" => Ok(Some(Team::Saboteur)),
        "none" => Ok(None),
        other => Err(CommandError::parse(line, format!("unknown team `{other}`"))),
    }
}

fn parse_target(line: &str, raw: &str) -> Result<VoteTarget, CommandError> {
    raw.parse::<VoteTarget>()
        .map_err(|reason| CommandError::parse(line, reason))
}

fn parse_command(line: &str, verb: &str, args: &[&str]) -> Result<Command, CommandError> {
    let session = |index| arg(line, args, index, "session name").map(str::to_string);
    let command = match verb.to_ascii_lowercase().as_str() {
        "new_game" => {
            exact(line, args, 1)?;
            Command::NewGame {
                session: session(0)?,
            }
        }
        "join" => {
            exact(line, args, 1)?;
            Command::Join {
                session: session(0)?,
            }
        }
        "leave" => {
            exact(line, args, 1)?;
            Command::Leave {
                session: session(0)?,
            }
        }
        "start" => {
            exact(line, args, 1)?;
            Command::Start {
                session: session(0)?,
            }
        }
        "end_day" => {
            exact(line, args, 1)?;
            Command::EndDay {
                session: session(0)?,
            }
        }
        "vote" => {
            exact(line, args, 2)?;
            Command::Vote {
                session: session(0)?,
                target: parse_target(line, arg(line, args, 1, "vote target")?)?,
            }
        }
        "npc_create" => {
            let name = arg(line, args, 0, "NPC name")?.to_string();
            let persona = (args.len() > 1).then(|| args[1..].join(" "));
            Command::NpcCreate { name, persona }
        }
        "npc_delete" => {
            exact(line, args, 1)?;
            Command::NpcDelete {
                name: arg(line, args, 0, "NPC name")?.to_string(),
            }
        }
        "npc_join" => {
            exact(line, args, 2)?;
            Command::NpcJoin {
                session: session(0)?,
                npc: arg(line, args, 1, "NPC name")?.to_string(),
            }
        }
        "npc_vote" => {
            exact(line, args, 3)?;
            Command::NpcVote {
                session: session(0)?,
                npc: arg(line, args, 1, "NPC name")?.to_string(),
                target: parse_target(line, arg(line, args, 2, "vote target")?)?,
            }
        }
        "expect_phase" => {
            exact(line, args, 2)?;
            Command::ExpectPhase {
                session: session(0)?,
                phase: parse_phase(line, arg(line, args, 1, "phase")?)?,
            }
        }
        "expect_winner" => {
            exact(line, args, 2)?;
            Command::ExpectWinner {
                session: session(0)?,
                winner: parse_winner(line, arg(line, args, 1, "team")?)?,
            }
        }
        "expect_alive" => {
            exact(line, args, 2)?;
            let raw = arg(line, args, 1, "living count")?;
            Command::ExpectAlive {
                session: session(0)?,
                count: raw
                    .parse()
                    .map_err(|_| CommandError::parse(line, format!("`{raw}` is not a count")))?,
            }
        }
        other => return Err(CommandError::parse(line, format!("unknown command `{other}`"))),
    };
    Ok(command)
}

fn npc_id(registry: &SessionRegistry, name: &str) -> Result<PlayerId, NpcError> {
    registry
        .npc(name)
        .map(|npc| npc.id)
        .ok_or_else(|| NpcError::UnknownNpc(name.to_string()))
}

/// Executes commands against a registry and hands the resulting effects to a
/// collaborator once each action has committed.
pub struct CommandRunner<'a, C: Collaborator + ?Sized> {
    registry: &'a SessionRegistry,
    collaborator: &'a C,
    delivery: DispatchReport,
}

impl<'a, C: Collaborator + ?Sized> CommandRunner<'a, C> {
    pub fn new(registry: &'a SessionRegistry, collaborator: &'a C) -> Self {
        Self {
            registry,
            collaborator,
            delivery: DispatchReport::default(),
        }
    }

    /// Effects delivered and failed so far.
    pub const fn delivery(&self) -> DispatchReport {
        self.delivery
    }

    fn dispatch(&mut self, effects: &[solaris_game::Effect]) {
        let report = dispatch_effects(self.collaborator, effects);
        self.delivery.delivered += report.delivered;
        self.delivery.failed += report.failed;
    }

    /// Parse and execute one line.
    pub fn run_line(&mut self, line: &str) -> Result<String, CommandError> {
        let invocation: Invocation = line.parse()?;
        self.execute(&invocation)
    }

    /// Execute a parsed command, returning the bot's confirmation text.
    pub fn execute(&mut self, invocation: &Invocation) -> Result<String, CommandError> {
        let command = &invocation.command;
        let actor = || {
            invocation
                .actor
                .ok_or(CommandError::MissingActor(command.name()))
        };
        let registry = self.registry;
        let (reply, effects) = match command {
            Command::NewGame { session } => {
                let outcome = registry.create(session, actor()?.id)?;
                (
                    format!("✅ Game {} created! Signups are open.", outcome.session.name()),
                    outcome.effects,
                )
            }
            Command::Join { session } => {
                let outcome = registry.join(session, actor()?.id)?;
                (
                    format!(
                        "✅ Joined {} ({} players).",
                        outcome.session.name(),
                        outcome.session.roster().len()
                    ),
                    outcome.effects,
                )
            }
            Command::Leave { session } => {
                let outcome = registry.leave(session, actor()?.id)?;
                (format!("✅ Left {}.", outcome.session.name()), outcome.effects)
            }
            Command::Start { session } => {
                let outcome = registry.start(session, actor()?)?;
                (
                    format!(
                        "✅ {} has started with {} players! Day 1 begins.",
                        outcome.session.name(),
                        outcome.session.roster().len()
                    ),
                    outcome.effects,
                )
            }
            Command::Vote { session, target } => {
                let voter = actor()?.id;
                let value = target.resolve(registry)?;
                let outcome = registry.cast_vote(session, voter, value)?;
                (format!("✅ Vote recorded: {value}."), outcome.effects)
            }
            Command::EndDay { session } => {
                let outcome = registry.end_day(session, actor()?)?;
                let reply = match outcome.session.outcome() {
                    Some(team) => format!("🏁 {} is over. The {team} team wins!", outcome.session.name()),
                    None => format!(
                        "✅ Day {} of {} begins.",
                        outcome.session.current_day(),
                        outcome.session.name()
                    ),
                };
                (reply, outcome.effects)
            }
            Command::NpcCreate { name, persona } => {
                let npc = registry.create_npc(name, persona.as_deref())?;
                (format!("✅ Created NPC {} ({}).", npc.name, npc.id), Vec::new())
            }
            Command::NpcDelete { name } => {
                let (npc, effects) = registry.delete_npc(name)?;
                (format!("✅ Deleted NPC {}.", npc.name), effects)
            }
            Command::NpcJoin { session, npc } => {
                let id = npc_id(registry, npc)?;
                let outcome = registry.join(session, id)?;
                (
                    format!("✅ {npc} joined {}.", outcome.session.name()),
                    outcome.effects,
                )
            }
            Command::NpcVote {
                session,
                npc,
                target,
            } => {
                let voter = npc_id(registry, npc)?;
                let value = target.resolve(registry)?;
                let outcome = registry.cast_vote(session, voter, value)?;
                (format!("✅ {npc} voted {value}."), outcome.effects)
            }
            Command::ExpectPhase { session, phase } => {
                let actual = registry.get(session)?.phase();
                if actual != *phase {
                    return Err(CommandError::Expectation(format!(
                        "{session} is in {actual} phase, expected {phase}"
                    )));
                }
                (format!("✔ {session} is in {phase} phase."), Vec::new())
            }
            Command::ExpectWinner { session, winner } => {
                let actual = registry.get(session)?.outcome();
                if actual != *winner {
                    return Err(CommandError::Expectation(format!(
                        "{session} winner is {}, expected {}",
                        team_label(actual),
                        team_label(*winner)
                    )));
                }
                (
                    format!("✔ {session} winner is {}.", team_label(actual)),
                    Vec::new(),
                )
            }
            Command::ExpectAlive { session, count } => {
                let living = registry.get(session)?.living().len();
                if living != *count {
                    return Err(CommandError::Expectation(format!(
                        "{session} has {living} living players, expected {count}"
                    )));
                }
                (format!("✔ {session} has {living} living players."), Vec::new())
            }
        };
        self.dispatch(&effects);
        Ok(reply)
    }
}

fn team_label(team: Option<Team>) -> &'static str {
    team.map_or("none", Team::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ConsoleCollaborator;
    use solaris_game::GameConfig;

    #[test]
    fn vote_targets_parse_like_the_bot() {
        let parse = |raw: &str| raw.parse::<VoteTarget>();
        assert_eq!(parse("<@42>"), Ok(VoteTarget::Mention(PlayerId(42))));
        assert_eq!(parse("<@!42>"), Ok(VoteTarget::Mention(PlayerId(42))));
        assert_eq!(parse("<@-3>"), Ok(VoteTarget::Mention(PlayerId(-3))));
        assert_eq!(parse("ABSTAIN"), Ok(VoteTarget::Abstain));
        assert_eq!(parse("veto"), Ok(VoteTarget::Veto));
        assert_eq!(parse("Ada"), Ok(VoteTarget::Npc("Ada".into())));
        assert!(parse("<@abc>").is_err());
        assert_eq!(parse("@42"), Err(INVALID_TARGET.to_string()));
    }

    #[test]
    fn actor_prefix_sets_moderator_flag() {
        let inv: Invocation = "@@9 end_day Nebula".parse().unwrap();
        assert_eq!(inv.actor, Some(Requester::moderator(PlayerId(9))));
        assert_eq!(
            inv.command,
            Command::EndDay {
                session: "Nebula".into()
            }
        );

        let inv: Invocation = "@3 vote Nebula <@!4>".parse().unwrap();
        assert_eq!(inv.actor, Some(Requester::player(PlayerId(3))));
    }

    #[test]
    fn player_commands_require_an_actor() {
        assert!(matches!(
            "join Nebula".parse::<Invocation>(),
            Err(CommandError::MissingActor("join"))
        ));
        let inv: Invocation = "npc_create Ada A cheerful engineer".parse().unwrap();
        assert_eq!(
            inv.command,
            Command::NpcCreate {
                name: "Ada".into(),
                persona: Some("A cheerful engineer".into())
            }
        );
    }

    #[test]
    fn malformed_lines_are_parse_errors() {
        for line in ["", "@1", "@1 dance Nebula", "@1 vote Nebula", "@1 join A B"] {
            assert!(
                matches!(line.parse::<Invocation>(), Err(CommandError::Parse { .. })),
                "{line:?} should not parse"
            );
        }
    }

    #[test]
    fn errors_render_bot_replies() {
        let err = GameError::WrongPhase {
            session: "Nebula".into(),
            phase: Phase::Active,
            action: Action::Join,
        };
        assert_eq!(describe_error(&err), "❌ This game has already started or ended!");
        let err = GameError::WrongPhase {
            session: "Nebula".into(),
            phase: Phase::Ended,
            action: Action::CastVote,
        };
        assert_eq!(describe_error(&err), "❌ This game is not currently active!");
        let err = GameError::AlreadyJoined {
            session: "Nebula".into(),
            player: PlayerId(1),
        };
        assert_eq!(describe_error(&err), "❌ You've already joined this game!");
    }

    #[test]
    fn runner_drives_a_session_and_dispatches_effects() {
        let registry = SessionRegistry::with_seed(GameConfig::default(), 5);
        let console = ConsoleCollaborator::new(false);
        let mut runner = CommandRunner::new(&registry, &console);

        runner.run_line("@1 new_game Nebula").unwrap();
        runner.run_line("npc_create Ada").unwrap();
        runner.run_line("npc_create Bo").unwrap();
        runner.run_line("@1 join Nebula").unwrap();
        runner.run_line("npc_join Nebula Ada").unwrap();
        runner.run_line("npc_join Nebula bo").unwrap();
        runner.run_line("expect_phase Nebula signup").unwrap();

        let err = runner.run_line("@2 start Nebula").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Game(GameError::NotAuthorized { .. })
        ));
        runner.run_line("@1 start Nebula").unwrap();
        runner.run_line("expect_phase Nebula active").unwrap();
        runner.run_line("@1 vote Nebula Ada").unwrap();
        runner.run_line("npc_vote Nebula Ada abstain").unwrap();
        runner.run_line("npc_vote Nebula Bo veto").unwrap();
        runner.run_line("@@7 end_day Nebula").unwrap();

        let session = registry.get("Nebula").unwrap();
        assert!(!session.is_alive(PlayerId(-1)));
        runner.run_line("expect_alive Nebula 2").unwrap();
        assert!(matches!(
            runner.run_line("expect_alive Nebula 3"),
            Err(CommandError::Expectation(_))
        ));

        assert_eq!(runner.delivery().failed, 0);
        assert_eq!(runner.delivery().delivered, console.transcript().len());
    }

    #[test]
    fn unknown_npc_vote_reports_npc_error() {
        let registry = SessionRegistry::with_seed(GameConfig::default(), 5);
        let console = ConsoleCollaborator::new(false);
        let mut runner = CommandRunner::new(&registry, &console);
        runner.run_line("@1 new_game Nebula").unwrap();
        let err = runner.run_line("npc_join Nebula Ghost").unwrap_err();
        assert!(matches!(err, CommandError::Npc(NpcError::UnknownNpc(_))));
        assert_eq!(err.user_message(), "❌ No NPC named Ghost exists!");
    }
}
