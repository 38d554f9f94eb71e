//! Compensation for interrupted installs
//!
//! Undoes a [`Journal`] newest first: installed files are taken back out of
//! the target, then backups are returned to their original paths. Every
//! entry is attempted; failures are collected rather than stopping the sweep.

use super::error::{CompensationFailure, UndoAction};
use super::mover::{transfer_file, Journal, Transfer};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reverse every action in `journal`, returning the steps that failed.
pub async fn compensate(journal: &Journal) -> Vec<CompensationFailure> {
    let mut failures = Vec::new();

    tracing::info!(
        "Rolling back {} installed and {} backed up files",
        journal.moved.len(),
        journal.backed_up.len()
    );

    for entry in journal.moved.iter().rev() {
        let installed = PathBuf::from(&entry.file.to);

        if journal.payload_transfer == Transfer::Cut {
            let payload = PathBuf::from(&entry.file.from);
            match transfer_file(Transfer::Cut, &installed, &payload).await {
                Ok(()) => {
                    tracing::debug!("Returned {} to its payload", entry.path);
                    continue;
                }
                Err(source) => {
                    let failure = CompensationFailure {
                        action: UndoAction::ReturnToPayload,
                        path: installed.clone(),
                        source,
                    };
                    tracing::error!("{}", failure);
                    failures.push(failure);
                }
            }
        }

        // the payload copy is kept (or lost); the target must not keep it
        match remove_if_present(&installed).await {
            Ok(()) => tracing::debug!("Removed installed {}", entry.path),
            Err(source) => {
                let failure = CompensationFailure {
                    action: UndoAction::RemoveInstalled,
                    path: installed,
                    source,
                };
                tracing::error!("{}", failure);
                failures.push(failure);
            }
        }
    }

    for entry in journal.backed_up.iter().rev() {
        let original = PathBuf::from(&entry.file.from);
        let backup = PathBuf::from(&entry.file.to);
        match transfer_file(Transfer::Cut, &backup, &original).await {
            Ok(()) => tracing::debug!("Restored {}", entry.path),
            Err(source) => {
                let failure = CompensationFailure {
                    action: UndoAction::RestoreBackup,
                    path: original,
                    source,
                };
                tracing::error!("{}", failure);
                failures.push(failure);
            }
        }
    }

    for dir in journal.created_dirs.iter().rev() {
        // only succeeds once empty
        if fs::remove_dir(dir).await.is_ok() {
            tracing::debug!("Removed created directory {}", dir.display());
        }
    }

    failures
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::conflicts::ConflictChoices;
    use crate::mods::error::InstallError;
    use crate::mods::mover::{InstallTargets, MoveOptions, Mover};
    use crate::mods::plan::{InstallPlan, PlannedFile};
    use crate::mods::types::ModId;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn failure_on_third_of_five_restores_everything() {
        let tmp = TempDir::new().unwrap();
        let staged = tmp.path().join("staged");
        let targets = InstallTargets {
            game_dir: tmp.path().join("game"),
            backup_dir: tmp.path().join("backup"),
        };
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::create_dir_all(targets.target("data")).unwrap();

        // two payload files, the second replacing a vanilla file; the third
        // payload file is missing
        std::fs::write(staged.join("1.dat"), "one").unwrap();
        std::fs::write(staged.join("2.dat"), "two").unwrap();
        std::fs::write(staged.join("4.dat"), "four").unwrap();
        std::fs::write(staged.join("5.dat"), "five").unwrap();
        std::fs::write(targets.target("data/2.dat"), "vanilla").unwrap();

        let plan = InstallPlan {
            mod_id: ModId::new("local", "m"),
            files: ["1.dat", "2.dat", "3.dat", "4.dat", "5.dat"]
                .iter()
                .map(|n| PlannedFile {
                    source: staged.join(n),
                    destination: format!("data/{}", n),
                })
                .collect(),
        };

        let interrupted = Mover::new(&targets, MoveOptions::default())
            .run(&plan, &ConflictChoices::default(), &HashSet::new())
            .await
            .unwrap_err();

        match &interrupted.cause {
            InstallError::MoveFailure { from, source, .. } => {
                assert_eq!(from, &staged.join("3.dat"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected cause {:?}", other),
        }
        assert_eq!(interrupted.journal.moved.len(), 2);
        assert_eq!(interrupted.journal.backed_up.len(), 1);

        let failures = compensate(&interrupted.journal).await;
        assert!(failures.is_empty());

        assert!(!targets.target("data/1.dat").exists());
        assert_eq!(
            std::fs::read_to_string(targets.target("data/2.dat")).unwrap(),
            "vanilla"
        );
        assert!(!targets.backup("data/2.dat").exists());
        // payload is back where it was staged
        assert_eq!(std::fs::read_to_string(staged.join("1.dat")).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(staged.join("2.dat")).unwrap(), "two");
    }

    #[tokio::test]
    async fn duplicate_installs_are_removed_and_failures_collected() {
        let tmp = TempDir::new().unwrap();
        let game = tmp.path().join("game");
        std::fs::create_dir_all(&game).unwrap();
        std::fs::write(game.join("a.dat"), "a").unwrap();

        let journal = Journal {
            backed_up: vec![crate::mods::mover::BackupEntry {
                path: "b.dat".to_string(),
                file: crate::mods::ModFile::new(
                    game.join("b.dat").to_string_lossy(),
                    tmp.path().join("backup/missing.dat").to_string_lossy(),
                ),
                retain: true,
            }],
            moved: vec![crate::mods::mover::MovedEntry {
                path: "a.dat".to_string(),
                file: crate::mods::ModFile::new("/staged/a.dat", game.join("a.dat").to_string_lossy()),
            }],
            created_dirs: Vec::new(),
            payload_transfer: Transfer::Duplicate,
        };

        let failures = compensate(&journal).await;
        assert!(!game.join("a.dat").exists());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].action, UndoAction::RestoreBackup);
        assert_eq!(failures[0].path, game.join("b.dat"));
    }

    #[tokio::test]
    async fn unreturnable_payload_is_still_removed_from_target() {
        let tmp = TempDir::new().unwrap();
        let game = tmp.path().join("game");
        std::fs::create_dir_all(game.join("data/new")).unwrap();
        std::fs::write(game.join("data/new/a.dat"), "a").unwrap();
        // payload directory replaced by a file, so nothing can go back there
        std::fs::write(tmp.path().join("staged"), "blocked").unwrap();

        let journal = Journal {
            backed_up: Vec::new(),
            moved: vec![crate::mods::mover::MovedEntry {
                path: "data/new/a.dat".to_string(),
                file: crate::mods::ModFile::new(
                    tmp.path().join("staged/a.dat").to_string_lossy(),
                    game.join("data/new/a.dat").to_string_lossy(),
                ),
            }],
            created_dirs: vec![game.join("data/new")],
            payload_transfer: Transfer::Cut,
        };

        let failures = compensate(&journal).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].action, UndoAction::ReturnToPayload);
        assert!(!game.join("data/new/a.dat").exists());
        assert!(!game.join("data/new").exists());
        assert!(game.join("data").is_dir());
    }
}
