//! XDG-compliant path management

use directories::ProjectDirs;
use std::path::PathBuf;

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a new Paths instance
    pub fn new() -> Self {
        match ProjectDirs::from("", "", "modkeeper") {
            Some(dirs) => Self {
                config_dir: dirs.config_dir().to_path_buf(),
                data_dir: dirs.data_dir().to_path_buf(),
            },
            None => Self::rooted(PathBuf::from(".modkeeper")),
        }
    }

    /// Paths rooted under a single directory (portable installs, tests)
    pub fn rooted(root: PathBuf) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/modkeeper/
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Main config file: ~/.config/modkeeper/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/modkeeper/
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Staged mod payloads: ~/.local/share/modkeeper/mods/
    pub fn mods_dir(&self) -> PathBuf {
        self.data_dir().join("mods")
    }

    /// Backups of displaced game files: ~/.local/share/modkeeper/backups/
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir().join("backups")
    }

    /// Managed file records: ~/.local/share/modkeeper/managed/
    pub fn managed_dir(&self) -> PathBuf {
        self.data_dir().join("managed")
    }

    /// Managed file record for a specific game
    pub fn managed_file(&self, game_id: &str) -> PathBuf {
        self.managed_dir().join(format!("{}.json", game_id))
    }

    /// Log directory: ~/.local/share/modkeeper/logs/
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    // ========== Utility Methods ==========

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.mods_dir())?;
        std::fs::create_dir_all(self.backups_dir())?;
        std::fs::create_dir_all(self.managed_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}
