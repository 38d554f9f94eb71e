//! CLI command action handlers

use super::{App, PromptResolver};
use crate::mods::{
    format_conflicts, ConflictResolver, InstallError, InstallOutcome, ModId, MovePhase,
    ProgressCallback, RemovalState, ReplaceAll, SkipAll,
};
use anyhow::{bail, Result};
use std::path::Path;

impl App {
    // ========== Install Commands ==========

    pub async fn cmd_plan(&self, manifest: &Path) -> Result<()> {
        let manifest = Self::load_manifest(manifest).await?;
        let pending = self
            .mods
            .plan(&manifest.tracked, &manifest.downloads)
            .await?;

        println!(
            "Install plan for {} ({})",
            pending.tracked.display_name, pending.tracked.id
        );
        println!("{:-<60}", "");
        for file in &pending.plan.files {
            println!("  {} <- {}", file.destination, file.source.display());
        }
        println!("{} files", pending.plan.len());

        if pending.conflicts.is_empty() {
            println!("No conflicts.");
        } else {
            println!("\n{} conflicts:", pending.conflicts.len());
            println!("{}", format_conflicts(&pending.conflicts));
        }
        Ok(())
    }

    pub async fn cmd_install(&self, manifest: &Path, replace_all: bool, skip_all: bool) -> Result<()> {
        if replace_all && skip_all {
            bail!("--replace-all and --skip-all cannot be combined");
        }
        let manifest = Self::load_manifest(manifest).await?;
        let resolver: Box<dyn ConflictResolver> = if replace_all {
            Box::new(ReplaceAll)
        } else if skip_all {
            Box::new(SkipAll)
        } else {
            Box::new(PromptResolver)
        };

        let progress: ProgressCallback = Box::new(|p| match p.phase {
            MovePhase::Complete => tracing::debug!("Moved {} files", p.total_files),
            phase => tracing::trace!(
                "{:?} [{}/{}] {}",
                phase,
                p.files_processed + 1,
                p.total_files,
                p.current_file.unwrap_or_default()
            ),
        });

        println!("Installing {}...", manifest.tracked.display_name);
        let outcome = self
            .mods
            .install(&manifest.tracked, &manifest.downloads, resolver.as_ref(), Some(progress))
            .await;

        match outcome {
            Ok(InstallOutcome::Cancelled) => println!("Install cancelled, nothing was changed."),
            Ok(InstallOutcome::Installed(summary)) => {
                println!(
                    "Installed {} files ({} skipped, {} backed up)",
                    summary.files_installed, summary.files_skipped, summary.files_backed_up
                );
                for conflict in &summary.conflicts {
                    println!(
                        "  {} -> {}",
                        conflict.file,
                        conflict.choice_name.as_deref().unwrap_or("?")
                    );
                }
                for warning in &summary.warnings {
                    println!("  warning: {}", warning);
                }
            }
            Err(InstallError::RolledBack {
                mod_id,
                cause,
                compensation,
                warnings,
            }) => {
                println!("Install of {} failed: {}", mod_id, cause);
                for warning in &warnings {
                    println!("  warning: {}", warning);
                }
                if compensation.is_empty() && warnings.is_empty() {
                    println!("All changes were rolled back.");
                } else if compensation.is_empty() {
                    println!("Recorded changes were rolled back; files that could not be backed up were not restored.");
                } else {
                    println!("Rollback was incomplete:");
                    for failure in &compensation {
                        println!("  {}", failure);
                    }
                }
                bail!("Install of {} failed", mod_id);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub async fn cmd_uninstall(&self, mod_id: &str) -> Result<()> {
        let mod_id: ModId = mod_id.parse().map_err(anyhow::Error::msg)?;
        let report = self.mods.uninstall(&mod_id).await?;

        println!(
            "{}: {} files removed, {} restored",
            mod_id, report.removed, report.restored
        );
        if report.state != RemovalState::Removed {
            for failure in &report.failures {
                println!("  {}", failure);
            }
            bail!(
                "Uninstall of {} {}; {} entries are still recorded",
                mod_id,
                report.state.as_str(),
                report.remaining.moved_files.len() + report.remaining.backed_up_files.len()
            );
        }
        Ok(())
    }

    // ========== Query Commands ==========

    pub async fn cmd_status(&self) -> Result<()> {
        let game = self.mods.game();
        let managed = self.mods.list_managed().await;

        println!("Game:     {} ({})", game.name, game.id);
        println!("Target:   {}", game.install_dir);
        println!("Store:    {}", self.store.read().await.path().display());
        println!("{:-<60}", "");

        if managed.is_empty() {
            println!("No managed mods.");
            return Ok(());
        }
        for (id, installed, backed_up) in managed {
            println!("  {:<30} {:>5} files {:>5} backups", id.to_string(), installed, backed_up);
        }
        Ok(())
    }

    pub async fn cmd_owner(&self, path: &str) -> Result<()> {
        match self.mods.owner_of(path).await {
            Some(owner) => println!("{} is owned by {}", path, owner),
            None => println!("{} is not managed", path),
        }
        Ok(())
    }
}
