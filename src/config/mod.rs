//! Configuration management for ModKeeper
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/modkeeper/config.toml
//! - Data: ~/.local/share/modkeeper/

mod paths;

pub use paths::Paths;

use crate::mods::{InstallLayout, MoveOptions, Transfer};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active game identifier
    pub active_game: Option<String>,

    /// Target applications mods can be installed into
    pub games: Vec<GameConfig>,

    /// Installer settings
    pub install: InstallConfig,

    /// Override for the staged payloads root directory
    pub mods_dir_override: Option<String>,

    /// Override for the backups root directory
    pub backups_dir_override: Option<String>,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_game: None,
            games: Vec::new(),
            install: InstallConfig::default(),
            mods_dir_override: None,
            backups_dir_override: None,
            paths: Paths::new(),
        }
    }
}

/// A target application directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Game ID (e.g., "ff6pr")
    pub id: String,
    /// Display name
    pub name: String,
    /// Install root that mod files are placed under
    pub install_dir: String,
    /// Directory tokens used when re-rooting walked directories
    pub layout: InstallLayout,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            install_dir: String::new(),
            layout: InstallLayout::default(),
        }
    }
}

impl GameConfig {
    pub fn install_path(&self) -> PathBuf {
        PathBuf::from(&self.install_dir)
    }
}

/// Installer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Abort (and roll back) when a prior file cannot be backed up
    pub stop_on_backup_failure: bool,

    /// Copy payload files instead of moving them out of the staging area
    pub keep_payload: bool,
}

impl InstallConfig {
    pub fn move_options(&self) -> MoveOptions {
        MoveOptions {
            stop_on_backup_failure: self.stop_on_backup_failure,
            payload_transfer: if self.keep_payload {
                Transfer::Duplicate
            } else {
                Transfer::Cut
            },
        }
    }
}

impl Config {
    /// Look up a configured game
    pub fn game(&self, id: &str) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.id == id)
    }

    /// Resolve configured mods directory (override or default XDG path)
    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.mods_dir())
    }

    /// Resolve configured backups directory (override or default XDG path)
    pub fn backups_dir(&self) -> PathBuf {
        self.backups_dir_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.backups_dir())
    }

    /// Staged payloads for a specific game
    pub fn game_mods_dir(&self, game_id: &str) -> PathBuf {
        self.mods_dir().join(game_id)
    }

    /// Backups for a specific game
    pub fn game_backups_dir(&self, game_id: &str) -> PathBuf {
        self.backups_dir().join(game_id)
    }

    /// Ensure required directories exist, including overrides.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create default application directories")?;
        std::fs::create_dir_all(self.mods_dir()).context("Failed to create mods directory")?;
        std::fs::create_dir_all(self.backups_dir())
            .context("Failed to create backups directory")?;
        Ok(())
    }

    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        Self::load_with(Paths::new()).await
    }

    /// Load configuration using the given paths
    pub async fn load_with(paths: Paths) -> Result<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            // Create default config
            let config = Config {
                paths: paths.clone(),
                ..Config::default()
            };
            config.save().await?;
            config
        };

        config.paths = paths;
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_creates_default_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::rooted(tmp.path().to_path_buf());

        let mut config = Config::load_with(paths.clone()).await.unwrap();
        assert!(paths.config_file().exists());
        assert!(config.games.is_empty());

        config.games.push(GameConfig {
            id: "ff6pr".to_string(),
            name: "Final Fantasy VI".to_string(),
            install_dir: "/games/ff6".to_string(),
            layout: InstallLayout {
                base_install_dir: Some("FINAL FANTASY VI_Data".to_string()),
                ..InstallLayout::default()
            },
        });
        config.install.keep_payload = true;
        config.save().await.unwrap();

        let loaded = Config::load_with(paths).await.unwrap();
        let game = loaded.game("ff6pr").unwrap();
        assert_eq!(game.install_path(), PathBuf::from("/games/ff6"));
        assert_eq!(
            game.layout.base_install_dir.as_deref(),
            Some("FINAL FANTASY VI_Data")
        );
        assert_eq!(loaded.install.move_options().payload_transfer, Transfer::Duplicate);
        assert_eq!(
            loaded.game_backups_dir("ff6pr"),
            tmp.path().join("data/backups/ff6pr")
        );
    }
}
