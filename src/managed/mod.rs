//! Managed-state store
//!
//! Durable record of which files each installed mod placed and which prior
//! files it moved aside. Persisted as JSON per game; the ownership index is
//! derived from it and kept in step with every write.

use crate::mods::{ModFile, ModId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;

/// Files managed on behalf of one mod, keyed by target-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedModFiles {
    /// Original target path -> where its prior content was moved
    #[serde(rename = "BackedUpFiles", default)]
    pub backed_up_files: BTreeMap<String, ModFile>,
    /// Target path -> the payload file now occupying it
    #[serde(rename = "MovedFiles", default)]
    pub moved_files: BTreeMap<String, ModFile>,
    /// Target directories the mod's installs created
    #[serde(rename = "CreatedDirs", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub created_dirs: BTreeSet<String>,
}

impl ManagedModFiles {
    pub fn is_empty(&self) -> bool {
        self.backed_up_files.is_empty() && self.moved_files.is_empty() && self.created_dirs.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManagedState {
    version: u32,
    saved_at: Option<String>,
    #[serde(default)]
    mods: BTreeMap<ModId, ManagedModFiles>,
}

/// Target path -> owning mod, derived from every record's moved files.
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    owners: HashMap<String, ModId>,
}

impl OwnershipIndex {
    fn rebuild(mods: &BTreeMap<ModId, ManagedModFiles>) -> Self {
        let mut index = Self::default();
        for (mod_id, files) in mods {
            index.claim(mod_id, files);
        }
        index
    }

    fn claim(&mut self, mod_id: &ModId, files: &ManagedModFiles) {
        for path in files.moved_files.keys() {
            if let Some(previous) = self.owners.insert(path.clone(), mod_id.clone()) {
                if &previous != mod_id {
                    tracing::warn!("{} claimed by both {} and {}", path, previous, mod_id);
                }
            }
        }
    }

    fn release(&mut self, mod_id: &ModId) {
        self.owners.retain(|_, owner| owner != mod_id);
    }

    pub fn owner_of(&self, path: &str) -> Option<&ModId> {
        self.owners.get(path)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Store of managed files for one target directory.
#[derive(Debug)]
pub struct ManagedStore {
    path: PathBuf,
    mods: BTreeMap<ModId, ManagedModFiles>,
    index: OwnershipIndex,
}

impl ManagedStore {
    /// Empty store that will persist to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mods: BTreeMap::new(),
            index: OwnershipIndex::default(),
        }
    }

    /// Load the store from disk, or start empty if no file exists yet.
    ///
    /// Moved-file entries whose target no longer exists are dropped so a
    /// store that fell behind the filesystem converges on load.
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Self::new(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read managed files: {}", path.display()))?;
        let state: ManagedState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse managed files: {}", path.display()))?;

        let mut mods = state.mods;
        let mut dropped = 0usize;
        let mut emptied = Vec::new();
        for (mod_id, files) in mods.iter_mut() {
            if files.moved_files.is_empty() {
                continue;
            }
            files.moved_files.retain(|key, f| {
                let present = Path::new(&f.to).exists();
                if !present {
                    tracing::warn!("{} no longer present for {}, dropping entry", key, mod_id);
                    dropped += 1;
                }
                present
            });
            if files.moved_files.is_empty() && files.backed_up_files.is_empty() {
                emptied.push(mod_id.clone());
            }
        }
        // records with nothing left on disk; ones saved empty are kept
        for mod_id in emptied {
            mods.remove(&mod_id);
        }

        tracing::info!(
            "Loaded managed files for {} mods from {} ({} stale entries dropped)",
            mods.len(),
            path.display(),
            dropped
        );

        Ok(Self {
            path: path.to_path_buf(),
            index: OwnershipIndex::rebuild(&mods),
            mods,
        })
    }

    /// Write the store to disk, replacing the previous file.
    pub async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create managed files directory")?;
        }

        let state = ManagedState {
            version: STATE_VERSION,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            mods: self.mods.clone(),
        };
        let content =
            serde_json::to_string_pretty(&state).context("Failed to serialize managed files")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        tracing::debug!("Persisted managed files to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, mod_id: &ModId) -> Option<&ManagedModFiles> {
        self.mods.get(mod_id)
    }

    /// Insert or replace a mod's record and refresh its ownership claims.
    pub fn upsert(&mut self, mod_id: ModId, files: ManagedModFiles) {
        self.index.release(&mod_id);
        self.index.claim(&mod_id, &files);
        self.mods.insert(mod_id, files);
    }

    pub fn remove(&mut self, mod_id: &ModId) -> Option<ManagedModFiles> {
        self.index.release(mod_id);
        self.mods.remove(mod_id)
    }

    pub fn ownership(&self) -> &OwnershipIndex {
        &self.index
    }

    pub fn owner_of(&self, path: &str) -> Option<&ModId> {
        self.index.owner_of(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModId, &ManagedModFiles)> {
        self.mods.iter()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(target: &Path, rel: &str) -> ManagedModFiles {
        let mut files = ManagedModFiles::default();
        files.moved_files.insert(
            rel.to_string(),
            ModFile::new("/staged/x", target.join(rel).to_string_lossy()),
        );
        files
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("game/data")).unwrap();
        std::fs::write(tmp.path().join("game/data/x.dat"), "x").unwrap();

        let path = tmp.path().join("managed/game.json");
        let id = ModId::new("nexus", "1");
        let mut store = ManagedStore::new(path.clone());
        let mut files = record(&tmp.path().join("game"), "data/x.dat");
        files.backed_up_files.insert(
            "data/x.dat".to_string(),
            ModFile::new("/game/data/x.dat", "/backup/data/x.dat"),
        );
        store.upsert(id.clone(), files.clone());
        store.persist().await.unwrap();

        let loaded = ManagedStore::load(&path).await.unwrap();
        assert_eq!(loaded.get(&id), Some(&files));
        assert_eq!(loaded.owner_of("data/x.dat"), Some(&id));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"nexus:1\""));
        assert!(raw.contains("\"BackedUpFiles\""));
        assert!(raw.contains("\"MovedFiles\""));
    }

    #[tokio::test]
    async fn load_drops_missing_targets() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("game.json");
        let mut store = ManagedStore::new(path.clone());
        store.upsert(ModId::new("local", "gone"), record(tmp.path(), "data/gone.dat"));
        store.persist().await.unwrap();

        let loaded = ManagedStore::load(&path).await.unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.ownership().is_empty());
    }

    #[tokio::test]
    async fn load_keeps_records_saved_without_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("game.json");
        let id = ModId::new("local", "replaced");
        let mut store = ManagedStore::new(path.clone());
        let mut files = ManagedModFiles::default();
        files.backed_up_files.insert(
            "data/x.dat".to_string(),
            ModFile::new("/game/data/x.dat", "/backup/data/x.dat"),
        );
        store.upsert(id.clone(), files.clone());
        store.upsert(ModId::new("local", "empty"), ManagedModFiles::default());
        store.persist().await.unwrap();

        let loaded = ManagedStore::load(&path).await.unwrap();
        assert_eq!(loaded.get(&id), Some(&files));
        assert!(loaded.get(&ModId::new("local", "empty")).is_some());
        assert!(loaded.ownership().is_empty());
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ManagedStore::load(&tmp.path().join("none.json")).await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn upsert_and_remove_keep_index_in_step() {
        let tmp = TempDir::new().unwrap();
        let mut store = ManagedStore::new(tmp.path().join("s.json"));
        let a = ModId::new("local", "a");

        store.upsert(a.clone(), record(tmp.path(), "one.dat"));
        assert_eq!(store.owner_of("one.dat"), Some(&a));

        store.upsert(a.clone(), record(tmp.path(), "two.dat"));
        assert_eq!(store.owner_of("one.dat"), None);
        assert_eq!(store.owner_of("two.dat"), Some(&a));

        store.remove(&a);
        assert!(store.ownership().is_empty());
    }
}
