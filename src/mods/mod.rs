//! Mod management - installation, conflict handling and removal
//!
//! An install runs plan -> conflict detection -> decision -> move, with
//! compensation on failure. The managed-state store is written once, after
//! the move succeeded, so it never reflects a half-applied install.

mod conflicts;
mod error;
mod mover;
pub mod paths;
mod plan;
mod rollback;
mod types;
mod uninstall;

pub use conflicts::*;
pub use error::*;
pub use mover::*;
pub use paths::InstallLayout;
pub use plan::*;
pub use rollback::compensate;
pub use types::*;
pub use uninstall::*;

use crate::config::{Config, GameConfig};
use crate::managed::{ManagedModFiles, ManagedStore};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Install compiled and checked for conflicts, waiting for a decision.
#[derive(Debug, Clone)]
pub struct PendingInstall {
    pub tracked: TrackedMod,
    pub plan: InstallPlan,
    pub conflicts: Vec<FileConflict>,
}

/// Summary of a completed install
#[derive(Debug)]
pub struct InstallSummary {
    pub mod_id: ModId,
    pub files_installed: usize,
    pub files_skipped: usize,
    pub files_backed_up: usize,
    /// Conflicts with the choice made for each
    pub conflicts: Vec<FileConflict>,
    /// Non-fatal failures, such as backups that could not be made
    pub warnings: Vec<InstallError>,
}

/// Result of an install attempt
#[derive(Debug)]
pub enum InstallOutcome {
    Installed(InstallSummary),
    /// Cancelled at conflict resolution; nothing was touched
    Cancelled,
}

/// Mod manager for a single target game directory
pub struct ModManager {
    config: Arc<RwLock<Config>>,
    store: Arc<RwLock<ManagedStore>>,
    game: GameConfig,
}

impl ModManager {
    /// Create a new ModManager
    pub fn new(config: Arc<RwLock<Config>>, store: Arc<RwLock<ManagedStore>>, game: GameConfig) -> Self {
        Self { config, store, game }
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    pub fn store(&self) -> &Arc<RwLock<ManagedStore>> {
        &self.store
    }

    /// Compile the install plan and detect conflicts without touching disk.
    pub async fn plan(
        &self,
        tracked: &TrackedMod,
        downloads: &[DownloadFiles],
    ) -> Result<PendingInstall, InstallError> {
        let mod_dir = self
            .config
            .read()
            .await
            .game_mods_dir(&self.game.id)
            .join(tracked.dir_suffix());

        let plan = InstallPlan::compile(&tracked.id, &mod_dir, downloads, &self.game.layout)?;
        let conflicts = detect_conflicts(&plan, tracked, self.store.read().await.ownership());

        tracing::info!(
            "Planned {} files for {} ({} conflicts)",
            plan.len(),
            tracked.display_name,
            conflicts.len()
        );

        Ok(PendingInstall {
            tracked: tracked.clone(),
            plan,
            conflicts,
        })
    }

    /// Complete a planned install with the given conflict decision.
    pub async fn apply(
        &self,
        pending: PendingInstall,
        decision: Decision,
        progress: Option<ProgressCallback>,
    ) -> Result<InstallOutcome, InstallError> {
        let PendingInstall {
            tracked,
            plan,
            conflicts,
        } = pending;

        match apply_decision(&tracked, conflicts, decision)? {
            GateOutcome::Cancelled => Ok(InstallOutcome::Cancelled),
            GateOutcome::Proceed { choices, conflicts } => {
                self.execute(&tracked, &plan, choices, conflicts, progress.as_ref())
                    .await
                    .map(InstallOutcome::Installed)
            }
        }
    }

    /// Plan, resolve conflicts through `resolver` and install.
    pub async fn install(
        &self,
        tracked: &TrackedMod,
        downloads: &[DownloadFiles],
        resolver: &dyn ConflictResolver,
        progress: Option<ProgressCallback>,
    ) -> Result<InstallOutcome, InstallError> {
        let pending = self.plan(tracked, downloads).await?;
        let decision = if pending.conflicts.is_empty() {
            Decision::Replace(Vec::new())
        } else {
            resolver.resolve(&pending.conflicts).await
        };
        self.apply(pending, decision, progress).await
    }

    /// Install and mark the mod enabled.
    pub async fn enable(
        &self,
        tracked: &mut TrackedMod,
        downloads: &[DownloadFiles],
        resolver: &dyn ConflictResolver,
    ) -> Result<InstallOutcome, InstallError> {
        let outcome = self.install(tracked, downloads, resolver, None).await?;
        if matches!(outcome, InstallOutcome::Installed(_)) {
            tracked.enabled = true;
        }
        Ok(outcome)
    }

    /// Uninstall and mark the mod disabled once fully removed.
    pub async fn disable(&self, tracked: &mut TrackedMod) -> Result<RemovalReport, InstallError> {
        let report = self.uninstall(&tracked.id).await?;
        if report.state == RemovalState::Removed {
            tracked.enabled = false;
        }
        Ok(report)
    }

    async fn execute(
        &self,
        tracked: &TrackedMod,
        plan: &InstallPlan,
        mut choices: ConflictChoices,
        conflicts: Vec<FileConflict>,
        progress: Option<&ProgressCallback>,
    ) -> Result<InstallSummary, InstallError> {
        let (targets, options) = {
            let config = self.config.read().await;
            let targets = InstallTargets {
                game_dir: self.game.install_path(),
                backup_dir: config
                    .game_backups_dir(&self.game.id)
                    .join(tracked.dir_suffix()),
            };
            (targets, config.install.move_options())
        };

        // held until the store is written: one install or uninstall at a time
        let mut store = self.store.write().await;

        // ownership may have moved since planning
        for path in plan.destinations() {
            let Some(owner) = store.owner_of(path) else {
                continue;
            };
            if owner != &tracked.id && !choices.replace.contains(path) && choices.skip.insert(path.to_string()) {
                tracing::warn!("{} was claimed by {} after planning, skipping", path, owner);
            }
        }

        let own_paths: HashSet<String> = store
            .get(&tracked.id)
            .map(|r| r.moved_files.keys().cloned().collect())
            .unwrap_or_default();

        tracing::info!("Installing {} into {}", tracked.display_name, targets.game_dir.display());

        let report = match Mover::new(&targets, options)
            .with_progress(progress)
            .run(plan, &choices, &own_paths)
            .await
        {
            Ok(report) => report,
            Err(interrupted) => {
                if let Some(cb) = progress {
                    cb(MoveProgress {
                        phase: MovePhase::RollingBack,
                        files_processed: interrupted.journal.moved.len(),
                        total_files: plan.len(),
                        current_file: None,
                    });
                }
                let compensation = compensate(&interrupted.journal).await;
                tracing::error!(
                    "Install of {} rolled back ({} rollback failures)",
                    tracked.display_name,
                    compensation.len()
                );
                return Err(InstallError::RolledBack {
                    mod_id: tracked.id.clone(),
                    cause: Box::new(interrupted.cause),
                    compensation,
                    warnings: interrupted.warnings,
                });
            }
        };

        let MoveReport {
            journal,
            skipped,
            warnings,
        } = report;

        let mut record = store.get(&tracked.id).cloned().unwrap_or_default();
        let mut backed_up = 0usize;
        for entry in journal.backed_up {
            if entry.retain {
                backed_up += 1;
                record
                    .backed_up_files
                    .entry(entry.path)
                    .or_insert(entry.file);
            } else if let Err(e) = tokio::fs::remove_file(&entry.file.to).await {
                tracing::warn!("Failed to discard displaced file {}: {}", entry.file.to, e);
            }
        }
        let files_installed = journal.moved.len();
        for entry in journal.moved {
            record.moved_files.insert(entry.path, entry.file);
        }
        record.created_dirs.extend(
            journal
                .created_dirs
                .iter()
                .map(|dir| dir.to_string_lossy().to_string()),
        );

        hand_over(&mut store, &tracked.id, &choices.replace);
        store.upsert(tracked.id.clone(), record);
        store
            .persist()
            .await
            .map_err(|source| InstallError::Persistence {
                path: store.path().to_path_buf(),
                source,
            })?;

        tracing::info!(
            "Installed {} files for {} ({} skipped, {} backed up)",
            files_installed,
            tracked.display_name,
            skipped,
            backed_up
        );

        Ok(InstallSummary {
            mod_id: tracked.id.clone(),
            files_installed,
            files_skipped: skipped,
            files_backed_up: backed_up,
            conflicts,
            warnings,
        })
    }

    /// Remove a mod's files, restore what it replaced and update the store.
    pub async fn uninstall(&self, mod_id: &ModId) -> Result<RemovalReport, InstallError> {
        let mut store = self.store.write().await;
        let mut files = store
            .get(mod_id)
            .cloned()
            .ok_or_else(|| InstallError::NotManaged {
                mod_id: mod_id.clone(),
            })?;

        tracing::info!(
            "Uninstalling {} ({} files, {} backups)",
            mod_id,
            files.moved_files.len(),
            files.backed_up_files.len()
        );

        // backups under a path another mod now owns belong beneath that mod
        let mut held = ManagedModFiles::default();
        let mut pass_failures = Vec::new();
        let foreign: Vec<(String, ModFile, ModId)> = files
            .backed_up_files
            .iter()
            .filter_map(|(path, backup)| match store.owner_of(path) {
                Some(owner) if owner != mod_id => Some((path.clone(), backup.clone(), owner.clone())),
                _ => None,
            })
            .collect();
        for (path, backup, owner) in foreign {
            files.backed_up_files.remove(&path);
            if let Err(failure) = pass_down(&mut store, &owner, &path, backup.clone()).await {
                tracing::warn!("{}", failure);
                pass_failures.push(failure);
                held.backed_up_files.insert(path, backup);
            }
        }

        let mut report = remove_files(&files, &self.game.install_path()).await;
        if !pass_failures.is_empty() {
            report.remaining.backed_up_files.append(&mut held.backed_up_files);
            report.failures.append(&mut pass_failures);
            report.state = RemovalState::RemovalFailed;
        }

        if report.state == RemovalState::Removed {
            store.remove(mod_id);
        } else {
            store.upsert(mod_id.clone(), report.remaining.clone());
        }
        store
            .persist()
            .await
            .map_err(|source| InstallError::Persistence {
                path: store.path().to_path_buf(),
                source,
            })?;

        match report.state {
            RemovalState::Removed => tracing::info!("Uninstalled {}", mod_id),
            _ => tracing::warn!(
                "Uninstall of {} incomplete: {} failures",
                mod_id,
                report.failures.len()
            ),
        }
        Ok(report)
    }

    /// Managed mods with their installed and backed up file counts
    pub async fn list_managed(&self) -> Vec<(ModId, usize, usize)> {
        self.store
            .read()
            .await
            .iter()
            .map(|(id, files)| (id.clone(), files.moved_files.len(), files.backed_up_files.len()))
            .collect()
    }

    /// Mod currently owning a target path
    pub async fn owner_of(&self, path: &str) -> Option<ModId> {
        self.store
            .read()
            .await
            .owner_of(&paths::normalize(path))
            .cloned()
    }
}

/// Hand a leaving mod's backup of `path` to the mod that now owns it.
///
/// If the owner holds a backup of the leaving mod's file, that backup is
/// overwritten with the older content; otherwise the entry moves over as is.
async fn pass_down(
    store: &mut ManagedStore,
    owner: &ModId,
    path: &str,
    backup: ModFile,
) -> Result<(), CompensationFailure> {
    let source = PathBuf::from(&backup.to);
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::warn!("Backup [{}] for {} is missing, nothing to pass on", backup.to, path);
        return Ok(());
    }

    let mut record = store.get(owner).cloned().unwrap_or_default();
    match record.backed_up_files.get(path) {
        Some(theirs) => {
            let dest = PathBuf::from(&theirs.to);
            transfer_file(Transfer::Cut, &source, &dest)
                .await
                .map_err(|e| CompensationFailure {
                    action: UndoAction::RestoreBackup,
                    path: dest,
                    source: e,
                })?;
        }
        None => {
            record.backed_up_files.insert(path.to_string(), backup);
            store.upsert(owner.clone(), record);
        }
    }
    tracing::debug!("Passed backup of {} on to {}", path, owner);
    Ok(())
}

/// Drop replaced paths from their previous owners' moved files.
///
/// Their backups stay where they are; a previous owner keeps its record even
/// when it no longer places any file.
fn hand_over(store: &mut ManagedStore, new_owner: &ModId, replaced: &HashSet<String>) {
    let mut previous: Vec<(ModId, Vec<String>)> = Vec::new();
    for path in replaced {
        let Some(owner) = store.owner_of(path) else {
            continue;
        };
        if owner == new_owner {
            continue;
        }
        match previous.iter_mut().find(|(id, _)| id == owner) {
            Some((_, paths)) => paths.push(path.clone()),
            None => previous.push((owner.clone(), vec![path.clone()])),
        }
    }

    for (owner, paths) in previous {
        let mut record: ManagedModFiles = store.get(&owner).cloned().unwrap_or_default();
        for path in &paths {
            record.moved_files.remove(path);
        }
        tracing::debug!("{} hands {} files to {}", owner, paths.len(), new_owner);
        store.upsert(owner, record);
    }
}
