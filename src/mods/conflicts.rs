//! File ownership conflict detection and resolution

use super::error::InstallError;
use super::plan::InstallPlan;
use super::types::{FileConflict, TrackedMod};
use crate::managed::OwnershipIndex;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// Answer from a conflict resolver.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Overwrite the listed conflicts; every other conflict is skipped
    Replace(Vec<FileConflict>),
    /// Abort before anything is touched
    Cancel,
    /// The resolver itself failed
    Error(String),
}

/// External decision maker for conflicting files.
///
/// Called at most once per install with the full conflict list. The call may
/// wait on user input for as long as it needs.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(&self, conflicts: &[FileConflict]) -> Decision;
}

/// Resolver that hands every conflicting file to the new mod.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceAll;

#[async_trait]
impl ConflictResolver for ReplaceAll {
    async fn resolve(&self, conflicts: &[FileConflict]) -> Decision {
        Decision::Replace(conflicts.to_vec())
    }
}

/// Resolver that leaves every conflicting file with its current owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipAll;

#[async_trait]
impl ConflictResolver for SkipAll {
    async fn resolve(&self, _conflicts: &[FileConflict]) -> Decision {
        Decision::Replace(Vec::new())
    }
}

/// Per-path outcome of conflict resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictChoices {
    pub skip: HashSet<String>,
    pub replace: HashSet<String>,
}

impl ConflictChoices {
    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip.contains(path)
    }
}

/// Result of passing conflicts through the decision gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// Install may proceed; conflicts carry their recorded choice
    Proceed {
        choices: ConflictChoices,
        conflicts: Vec<FileConflict>,
    },
    Cancelled,
}

/// Find planned destinations already owned by a different mod.
pub fn detect_conflicts(
    plan: &InstallPlan,
    tracked: &TrackedMod,
    ownership: &OwnershipIndex,
) -> Vec<FileConflict> {
    let conflicts: Vec<FileConflict> = plan
        .destinations()
        .filter_map(|path| {
            let owner = ownership.owner_of(path)?;
            if owner == &tracked.id {
                return None;
            }
            Some(FileConflict {
                file: path.to_string(),
                current_mod_id: owner.clone(),
                new_mod_id: tracked.id.clone(),
                choice_name: None,
            })
        })
        .collect();

    if !conflicts.is_empty() {
        tracing::info!(
            "{} conflicting files for {}",
            conflicts.len(),
            tracked.display_name
        );
    }
    conflicts
}

/// Turn a resolver decision into per-path choices.
///
/// Replacements naming files outside the conflict list are ignored.
pub fn apply_decision(
    tracked: &TrackedMod,
    mut conflicts: Vec<FileConflict>,
    decision: Decision,
) -> Result<GateOutcome, InstallError> {
    let replacements = match decision {
        Decision::Cancel => {
            tracing::info!("Install of {} cancelled at conflict resolution", tracked.display_name);
            return Ok(GateOutcome::Cancelled);
        }
        Decision::Error(message) => {
            return Err(InstallError::Resolver {
                mod_id: tracked.id.clone(),
                message,
            })
        }
        Decision::Replace(replacements) => replacements,
    };

    let wanted: HashSet<&str> = replacements.iter().map(|c| c.file.as_str()).collect();
    let mut choices = ConflictChoices::default();

    for conflict in &mut conflicts {
        if wanted.contains(conflict.file.as_str()) {
            conflict.choice_name = Some(tracked.display_name.clone());
            choices.replace.insert(conflict.file.clone());
        } else {
            conflict.choice_name = Some(conflict.current_mod_id.to_string());
            choices.skip.insert(conflict.file.clone());
        }
    }

    for extra in replacements
        .iter()
        .filter(|r| !choices.replace.contains(&r.file))
    {
        tracing::warn!("Ignoring replacement for non-conflicting file {}", extra.file);
    }

    Ok(GateOutcome::Proceed { choices, conflicts })
}

/// Format a conflict list for display, grouped by current owner
pub fn format_conflicts(conflicts: &[FileConflict]) -> String {
    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for conflict in conflicts {
        grouped
            .entry(conflict.current_mod_id.to_string())
            .or_default()
            .push(&conflict.file);
    }

    let mut lines = Vec::new();
    for (owner, files) in grouped {
        lines.push(format!("Owned by {} ({} files)", owner, files.len()));
        for file in files.iter().take(5) {
            lines.push(format!("  - {}", file));
        }
        if files.len() > 5 {
            lines.push(format!("  ... and {} more", files.len() - 5));
        }
    }
    lines.join("\n")
}
