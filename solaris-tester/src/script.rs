//! Line-oriented command scripts.
//!
//! Blank lines and `#` comments are skipped. A line prefixed with `!` must be
//! rejected by the game; the script fails if it succeeds instead.
use solaris_game::Collaborator;
use thiserror::Error;

use crate::commands::{CommandError, CommandRunner};

/// Scripts shipped with the tester, by name.
pub const BUNDLED_SCRIPTS: &[(&str, &str)] = &[
    ("signup-guards", include_str!("../scripts/signup_guards.txt")),
    ("npc-game", include_str!("../scripts/npc_game.txt")),
];

pub fn bundled_script(name: &str) -> Option<&'static str> {
    BUNDLED_SCRIPTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, body)| *body)
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line_no}: {source}")]
    Command {
        line_no: usize,
        #[source]
        source: CommandError,
    },
    #[error("line {line_no}: `{line}` should have been rejected")]
    UnexpectedSuccess { line_no: usize, line: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub executed: usize,
    pub rejected: usize,
    pub replies: Vec<String>,
}

/// Run every line of `script` in order, stopping at the first failure.
pub fn run_script<C: Collaborator + ?Sized>(
    runner: &mut CommandRunner<'_, C>,
    script: &str,
) -> Result<ScriptReport, ScriptError> {
    let mut report = ScriptReport::default();
    for (index, raw) in script.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.strip_prefix('!') {
            Some(rejected) => match runner.run_line(rejected.trim()) {
                Ok(_) => {
                    return Err(ScriptError::UnexpectedSuccess {
                        line_no,
                        line: line.to_string(),
                    });
                }
                Err(err @ (CommandError::Parse { .. } | CommandError::MissingActor(_))) => {
                    return Err(ScriptError::Command {
                        line_no,
                        source: err,
                    });
                }
                Err(err) => {
                    log::debug!("line {line_no} rejected as expected: {err}");
                    report.rejected += 1;
                    report.replies.push(err.user_message());
                }
            },
            None => {
                let reply = runner
                    .run_line(line)
                    .map_err(|source| ScriptError::Command { line_no, source })?;
                report.replies.push(reply);
            }
        }
        report.executed += 1;
    }
    Ok(report)
}
