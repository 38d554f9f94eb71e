//! Interactive conflict resolution on the terminal

use crate::mods::{format_conflicts, ConflictResolver, Decision, FileConflict};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::io::{self, BufRead, IsTerminal, Write};

/// Asks on stderr, per conflicting file, whether the new mod should take it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptResolver;

#[async_trait]
impl ConflictResolver for PromptResolver {
    async fn resolve(&self, conflicts: &[FileConflict]) -> Decision {
        let conflicts = conflicts.to_vec();
        let answer = tokio::task::spawn_blocking(move || {
            if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
                bail!(
                    "Cannot prompt for conflicts in non-interactive mode. Use --replace-all or --skip-all."
                );
            }
            let stdin = io::stdin();
            ask(&conflicts, &mut stdin.lock(), &mut io::stderr())
        })
        .await;

        match answer {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => Decision::Error(e.to_string()),
            Err(e) => Decision::Error(format!("prompt task failed: {}", e)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Replace,
    Skip,
    ReplaceRest,
    SkipRest,
    Cancel,
}

fn parse_answer(input: &str) -> Option<Answer> {
    match input.trim().to_ascii_lowercase().as_str() {
        "r" | "replace" => Some(Answer::Replace),
        "s" | "skip" | "" => Some(Answer::Skip),
        "a" | "all" => Some(Answer::ReplaceRest),
        "n" | "none" => Some(Answer::SkipRest),
        "c" | "cancel" => Some(Answer::Cancel),
        _ => None,
    }
}

fn ask(conflicts: &[FileConflict], input: &mut impl BufRead, out: &mut impl Write) -> Result<Decision> {
    writeln!(out, "{}", format_conflicts(conflicts))?;

    let mut replace = Vec::new();
    let mut rest: Option<bool> = None;

    for conflict in conflicts {
        let take = match rest {
            Some(take) => take,
            None => loop {
                write!(
                    out,
                    "{} is owned by {}. [r]eplace, [S]kip, replace [a]ll, skip all [n], [c]ancel: ",
                    conflict.file, conflict.current_mod_id
                )?;
                out.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    bail!("Input closed while resolving conflicts");
                }
                match parse_answer(&line) {
                    Some(Answer::Replace) => break true,
                    Some(Answer::Skip) => break false,
                    Some(Answer::ReplaceRest) => {
                        rest = Some(true);
                        break true;
                    }
                    Some(Answer::SkipRest) => {
                        rest = Some(false);
                        break false;
                    }
                    Some(Answer::Cancel) => return Ok(Decision::Cancel),
                    None => writeln!(out, "Unrecognised answer '{}'", line.trim())?,
                }
            },
        };
        if take {
            replace.push(conflict.clone());
        }
    }

    Ok(Decision::Replace(replace))
}
