//! Reversal of a recorded install

use super::error::{CompensationFailure, UndoAction};
use super::mover::{transfer_file, Transfer};
use crate::managed::ManagedModFiles;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Uninstall progress for a single mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalState {
    Installed,
    Removing,
    /// Everything removed and restored; the record is gone
    Removed,
    /// Some entries could not be undone and stay recorded
    RemovalFailed,
}

impl RemovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalState::Installed => "installed",
            RemovalState::Removing => "removing",
            RemovalState::Removed => "removed",
            RemovalState::RemovalFailed => "removal failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RemovalState::Removed | RemovalState::RemovalFailed)
    }
}

/// What an uninstall did.
#[derive(Debug)]
pub struct RemovalReport {
    pub state: RemovalState,
    pub removed: usize,
    pub restored: usize,
    pub failures: Vec<CompensationFailure>,
    /// Entries that could not be undone
    pub remaining: ManagedModFiles,
}

/// Remove a mod's installed files and put its backups back.
///
/// Failures are logged and the sweep continues; entries that failed remain
/// in the returned record.
pub async fn remove_files(files: &ManagedModFiles, game_dir: &Path) -> RemovalReport {
    let mut state = RemovalState::Installed;
    advance(&mut state, RemovalState::Removing);

    let mut remaining = ManagedModFiles::default();
    let mut failures = Vec::new();
    let mut removed = 0usize;
    let mut restored = 0usize;

    for (key, f) in &files.moved_files {
        let installed = PathBuf::from(&f.to);
        match remove_if_present(&installed).await {
            Ok(()) => removed += 1,
            Err(source) => {
                tracing::warn!("Failed to remove [{}]: {}", installed.display(), source);
                failures.push(CompensationFailure {
                    action: UndoAction::RemoveInstalled,
                    path: installed,
                    source,
                });
                remaining.moved_files.insert(key.clone(), f.clone());
            }
        }
    }

    for (key, f) in &files.backed_up_files {
        let original = PathBuf::from(&f.from);
        let backup = PathBuf::from(&f.to);

        if !fs::try_exists(&backup).await.unwrap_or(false) {
            tracing::warn!(
                "Backup [{}] for {} is missing, nothing to restore",
                backup.display(),
                key
            );
            continue;
        }

        if let Err(source) = remove_if_present(&original).await {
            tracing::warn!("Failed to remove [{}]: {}", original.display(), source);
            failures.push(CompensationFailure {
                action: UndoAction::ClearOccupant,
                path: original,
                source,
            });
            remaining.backed_up_files.insert(key.clone(), f.clone());
            continue;
        }

        match transfer_file(Transfer::Cut, &backup, &original).await {
            Ok(()) => restored += 1,
            Err(source) => {
                tracing::warn!(
                    "Failed to move [{}] to [{}]: {}",
                    backup.display(),
                    original.display(),
                    source
                );
                failures.push(CompensationFailure {
                    action: UndoAction::RestoreBackup,
                    path: original,
                    source,
                });
                remaining.backed_up_files.insert(key.clone(), f.clone());
            }
        }
    }

    let leftover = remove_created_dirs(&files.created_dirs, game_dir).await;
    if !failures.is_empty() {
        remaining.created_dirs = leftover;
    }

    let next = if failures.is_empty() {
        RemovalState::Removed
    } else {
        RemovalState::RemovalFailed
    };
    advance(&mut state, next);

    RemovalReport {
        state,
        removed,
        restored,
        failures,
        remaining,
    }
}

fn advance(state: &mut RemovalState, next: RemovalState) {
    if state.is_final() {
        tracing::warn!("Removal already {}, not moving to {}", state.as_str(), next.as_str());
        return;
    }
    tracing::debug!("Removal {} -> {}", state.as_str(), next.as_str());
    *state = next;
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove directories an install created, deepest first, if they are empty.
///
/// Returns the ones still standing.
async fn remove_created_dirs(dirs: &BTreeSet<String>, root: &Path) -> BTreeSet<String> {
    let mut leftover = BTreeSet::new();
    for dir in dirs.iter().rev() {
        let path = Path::new(dir);
        if path == root || !path.starts_with(root) {
            tracing::warn!("Not removing {} outside {}", dir, root.display());
            continue;
        }
        match fs::remove_dir(path).await {
            Ok(()) => tracing::debug!("Removed created directory {}", dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!("Leaving directory {}: {}", dir, e);
                leftover.insert(dir.clone());
            }
        }
    }
    leftover
}
