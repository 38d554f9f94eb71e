//! Application wiring and orchestration

mod actions;
mod prompt;

pub use prompt::PromptResolver;

use crate::config::{Config, GameConfig};
use crate::managed::ManagedStore;
use crate::mods::{ModManifest, ModManager};

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Arc<RwLock<Config>>,

    /// Managed files for the selected game
    pub store: Arc<RwLock<ManagedStore>>,

    /// Mod manager
    pub mods: Arc<ModManager>,
}

impl App {
    /// Create a new App for `game_id`, or the configured active game
    pub async fn new(config: Config, game_id: Option<&str>) -> Result<Self> {
        // Ensure directories exist
        config.ensure_dirs().context("Failed to create directories")?;

        let game = select_game(&config, game_id)?;
        tracing::info!("Using game {} at {}", game.id, game.install_dir);

        let store_path = config.paths.managed_file(&game.id);
        let store = ManagedStore::load(&store_path)
            .await
            .context("Failed to load managed files")?;
        let store = Arc::new(RwLock::new(store));

        let config = Arc::new(RwLock::new(config));
        let mods = Arc::new(ModManager::new(config.clone(), store.clone(), game));

        Ok(Self {
            config,
            store,
            mods,
        })
    }

    /// Read a mod manifest describing a staged payload
    pub async fn load_manifest(path: &Path) -> Result<ModManifest> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }
}

fn select_game(config: &Config, game_id: Option<&str>) -> Result<GameConfig> {
    let id = match game_id.or(config.active_game.as_deref()) {
        Some(id) => id,
        None => match config.games.as_slice() {
            [only] => only.id.as_str(),
            [] => bail!(
                "No games configured. Add a [[games]] entry to {}",
                config.paths.config_file().display()
            ),
            _ => bail!("No game selected. Use --game <id> or set active_game in the config."),
        },
    };

    let game = config
        .game(id)
        .cloned()
        .with_context(|| format!("Game '{}' is not configured", id))?;
    if game.install_dir.trim().is_empty() {
        bail!("Game '{}' has no install_dir", game.id);
    }
    Ok(game)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use tempfile::TempDir;

    fn game(id: &str) -> GameConfig {
        GameConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            install_dir: format!("/games/{}", id),
            ..GameConfig::default()
        }
    }

    fn config(games: Vec<GameConfig>) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            games,
            paths: Paths::rooted(tmp.path().to_path_buf()),
            ..Config::default()
        };
        (tmp, config)
    }

    #[test]
    fn single_game_is_selected_implicitly() {
        let (_tmp, config) = config(vec![game("ff6")]);
        assert_eq!(select_game(&config, None).unwrap().id, "ff6");
    }

    #[test]
    fn explicit_game_beats_active_game() {
        let (_tmp, mut config) = config(vec![game("ff5"), game("ff6")]);
        config.active_game = Some("ff5".to_string());
        assert_eq!(select_game(&config, Some("ff6")).unwrap().id, "ff6");
        assert_eq!(select_game(&config, None).unwrap().id, "ff5");
    }

    #[test]
    fn ambiguous_or_unknown_game_fails() {
        let (_tmp, config) = config(vec![game("ff5"), game("ff6")]);
        assert!(select_game(&config, None).is_err());
        assert!(select_game(&config, Some("ff4")).is_err());
    }

    #[tokio::test]
    async fn manifest_loads_from_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mod.json");
        std::fs::write(
            &path,
            r#"{
                "mod": { "id": "local:skins", "display_name": "Skins" },
                "downloads": [
                    { "DownloadName": "main", "Files": [{ "From": "a.png", "To": "data" }] }
                ]
            }"#,
        )
        .unwrap();

        let manifest = App::load_manifest(&path).await.unwrap();
        assert_eq!(manifest.tracked.display_name, "Skins");
        assert_eq!(manifest.downloads[0].files[0].to, "data");
    }
}
