//! Backup-then-move installation of planned files
//!
//! Every action taken is written to a [`Journal`] so a failed run can be
//! undone by the compensator and a successful one recorded in the store.

use super::conflicts::ConflictChoices;
use super::error::InstallError;
use super::plan::InstallPlan;
use super::types::ModFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Progress callback for installation updates
pub type ProgressCallback = Box<dyn Fn(MoveProgress) + Send + Sync>;

/// How a file is carried from one place to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Copy, then delete the original
    Cut,
    /// Copy and keep the original
    Duplicate,
}

/// Move phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    BackingUp,
    Moving,
    RollingBack,
    Complete,
}

#[derive(Debug, Clone)]
pub struct MoveProgress {
    pub phase: MovePhase,
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: Option<String>,
}

/// Where an install writes.
#[derive(Debug, Clone)]
pub struct InstallTargets {
    /// Root of the target application
    pub game_dir: PathBuf,
    /// Backup root for the mod being installed
    pub backup_dir: PathBuf,
}

impl InstallTargets {
    pub fn target(&self, relative: &str) -> PathBuf {
        self.game_dir.join(relative)
    }

    pub fn backup(&self, relative: &str) -> PathBuf {
        self.backup_dir.join(relative)
    }

    /// Scratch location for a mod's own file displaced by a reinstall
    pub fn displaced(&self, relative: &str) -> PathBuf {
        self.backup_dir.join(".reinstall").join(relative)
    }
}

/// Installer behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    /// Treat a failed backup as fatal instead of recording it and continuing
    pub stop_on_backup_failure: bool,
    /// How payload files reach the target
    pub payload_transfer: Transfer,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            stop_on_backup_failure: false,
            payload_transfer: Transfer::Cut,
        }
    }
}

/// A prior file moved out of the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: String,
    /// `from` is the original target, `to` the backup location
    pub file: ModFile,
    /// False for content displaced during a reinstall (the mod's own file, or
    /// a path it already holds a backup for); discarded once the install
    /// succeeds
    pub retain: bool,
}

/// A payload file placed at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedEntry {
    pub path: String,
    /// `from` is the payload file, `to` the destination
    pub file: ModFile,
}

/// Actions completed so far, in order.
#[derive(Debug, Clone)]
pub struct Journal {
    pub backed_up: Vec<BackupEntry>,
    pub moved: Vec<MovedEntry>,
    /// Target directories that did not exist before, parents first
    pub created_dirs: Vec<PathBuf>,
    pub payload_transfer: Transfer,
}

impl Journal {
    fn new(payload_transfer: Transfer) -> Self {
        Self {
            backed_up: Vec::new(),
            moved: Vec::new(),
            created_dirs: Vec::new(),
            payload_transfer,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.backed_up.is_empty() && self.moved.is_empty()
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct MoveReport {
    pub journal: Journal,
    pub skipped: usize,
    /// Recorded backup failures
    pub warnings: Vec<InstallError>,
}

/// A run stopped by a fatal error.
#[derive(Debug)]
pub struct Interrupted {
    pub cause: InstallError,
    pub journal: Journal,
    pub warnings: Vec<InstallError>,
}

/// Moves planned files into a target directory.
pub struct Mover<'a> {
    targets: &'a InstallTargets,
    options: MoveOptions,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> Mover<'a> {
    pub fn new(targets: &'a InstallTargets, options: MoveOptions) -> Self {
        Self {
            targets,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Install every planned file not marked as skipped.
    ///
    /// `own_paths` are destinations this mod already owns; their current
    /// content is displaced rather than backed up.
    pub async fn run(
        &self,
        plan: &InstallPlan,
        choices: &ConflictChoices,
        own_paths: &HashSet<String>,
    ) -> Result<MoveReport, Interrupted> {
        let mut journal = Journal::new(self.options.payload_transfer);
        let mut warnings = Vec::new();
        let mut skipped = 0usize;
        let total = plan.len();

        for (idx, planned) in plan.files.iter().enumerate() {
            let rel = planned.destination.as_str();
            if choices.is_skipped(rel) {
                tracing::debug!("Skipping {} (kept by current owner)", rel);
                skipped += 1;
                continue;
            }

            let target = self.targets.target(rel);

            if occupied(&target).await {
                self.report(MovePhase::BackingUp, idx, total, rel);
                // an existing backup already holds what preceded this mod
                let retain = !own_paths.contains(rel)
                    && !fs::try_exists(self.targets.backup(rel)).await.unwrap_or(false);
                let backup = if retain {
                    self.targets.backup(rel)
                } else {
                    self.targets.displaced(rel)
                };

                match backup_with_retry(&target, &backup).await {
                    Ok(()) => journal.backed_up.push(BackupEntry {
                        path: rel.to_string(),
                        file: ModFile::new(
                            target.to_string_lossy(),
                            backup.to_string_lossy(),
                        ),
                        retain,
                    }),
                    Err(err) => {
                        tracing::warn!("{}", err);
                        if self.options.stop_on_backup_failure || err.is_fatal() {
                            return Err(Interrupted {
                                cause: err,
                                journal,
                                warnings,
                            });
                        }
                        warnings.push(err);
                    }
                }
            }

            self.report(MovePhase::Moving, idx, total, rel);
            journal
                .created_dirs
                .extend(missing_parents(&self.targets.game_dir, &target).await);
            if let Err(source) =
                transfer_file(self.options.payload_transfer, &planned.source, &target).await
            {
                let cause = InstallError::MoveFailure {
                    from: planned.source.clone(),
                    to: target,
                    source,
                };
                tracing::error!("{}", cause);
                return Err(Interrupted {
                    cause,
                    journal,
                    warnings,
                });
            }

            tracing::debug!("Installed {}", rel);
            journal.moved.push(MovedEntry {
                path: rel.to_string(),
                file: ModFile::new(planned.source.to_string_lossy(), target.to_string_lossy()),
            });
        }

        if let Some(cb) = self.progress {
            cb(MoveProgress {
                phase: MovePhase::Complete,
                files_processed: total,
                total_files: total,
                current_file: None,
            });
        }

        Ok(MoveReport {
            journal,
            skipped,
            warnings,
        })
    }

    fn report(&self, phase: MovePhase, idx: usize, total: usize, rel: &str) {
        if let Some(cb) = self.progress {
            cb(MoveProgress {
                phase,
                files_processed: idx,
                total_files: total,
                current_file: Some(rel.to_string()),
            });
        }
    }
}

async fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .await
        .map(|m| !m.is_dir())
        .unwrap_or(false)
}

/// Ancestors of `path` below `root` that do not exist yet, outermost first.
async fn missing_parents(root: &Path, path: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || fs::try_exists(dir).await.unwrap_or(true) {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }
    missing.reverse();
    missing
}

async fn backup_with_retry(target: &Path, backup: &Path) -> Result<(), InstallError> {
    if let Err(first) = transfer_file(Transfer::Cut, target, backup).await {
        tracing::warn!(
            "Backup of {} failed, retrying: {}",
            target.display(),
            first
        );
        transfer_file(Transfer::Cut, target, backup)
            .await
            .map_err(|source| InstallError::BackupFailure {
                target: target.to_path_buf(),
                backup: backup.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

/// Copy `from` to `to`, creating parent directories and carrying over the
/// source permissions. `Transfer::Cut` removes the source afterwards.
pub async fn transfer_file(kind: Transfer, from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }

    let metadata = fs::metadata(from).await?;
    let mut input = fs::File::open(from).await?;
    let mut output = fs::File::create(to).await?;
    tokio::io::copy(&mut input, &mut output).await?;
    output.flush().await?;
    output.sync_all().await?;
    drop(output);
    drop(input);

    fs::set_permissions(to, metadata.permissions()).await?;

    if kind == Transfer::Cut {
        fs::remove_file(from).await?;
    }
    Ok(())
}
