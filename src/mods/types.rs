//! Mod identity and payload descriptors

use super::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier of an installed mod: where it came from plus the
/// source-specific id. Serialized as `kind:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ModId {
    pub kind: String,
    pub id: String,
}

impl ModId {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ModId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, id)) if is_component(kind) && is_component(id) => Ok(Self::new(kind, id)),
            _ => Err(format!("Invalid mod id '{}', expected <kind>:<id>", s)),
        }
    }
}

/// Usable as a single directory name
fn is_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

impl From<ModId> for String {
    fn from(id: ModId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ModId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single file mapping.
///
/// In a payload descriptor `from` is relative to the extracted download and
/// `to` is relative to the target root (or a directory when it has no
/// extension). In managed records both are full paths on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModFile {
    pub from: String,
    pub to: String,
}

impl ModFile {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A directory mapping inside a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModDir {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub recursive: bool,
}

/// The files and directories one named download contributes to an install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DownloadFiles {
    pub download_name: String,
    #[serde(default)]
    pub files: Vec<ModFile>,
    #[serde(default)]
    pub dirs: Vec<ModDir>,
}

/// A planned destination that is already owned by another installed mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConflict {
    /// Canonical target-relative path
    pub file: String,
    pub current_mod_id: ModId,
    pub new_mod_id: ModId,
    /// Display name of the mod chosen to own the file, once decided
    pub choice_name: Option<String>,
}

/// A mod known to the manager, with its staging directory suffix and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedMod {
    pub id: ModId,
    pub display_name: String,
    /// Directory under the game's mods dir holding the staged downloads
    #[serde(default)]
    pub dir_suffix: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

impl TrackedMod {
    pub fn new(id: ModId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            dir_suffix: None,
            enabled: false,
        }
    }

    /// Staging directory suffix, defaulting to `<kind>/<id>`
    pub fn dir_suffix(&self) -> String {
        let suffix = self
            .dir_suffix
            .as_deref()
            .map(paths::normalize)
            .filter(|s| !s.is_empty());
        suffix.unwrap_or_else(|| paths::join(&paths::normalize(&self.id.kind), &paths::normalize(&self.id.id)))
    }
}

/// On-disk description of a mod handed to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    #[serde(rename = "mod")]
    pub tracked: TrackedMod,
    pub downloads: Vec<DownloadFiles>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_id_parses_and_displays() {
        let id: ModId = "nexus:1234".parse().unwrap();
        assert_eq!(id, ModId::new("nexus", "1234"));
        assert_eq!(id.to_string(), "nexus:1234");
        assert!("nexus".parse::<ModId>().is_err());
        assert!(":12".parse::<ModId>().is_err());
    }

    #[test]
    fn path_like_ids_are_rejected() {
        assert!("local:../../x".parse::<ModId>().is_err());
        assert!("..:x".parse::<ModId>().is_err());
        assert!("local:a\\b".parse::<ModId>().is_err());
        assert!(serde_json::from_str::<ModId>("\"local:..\"").is_err());
    }

    #[test]
    fn dir_suffix_stays_under_mods_dir() {
        let mut tracked = TrackedMod::new(ModId::new("local", "../../x"), "Escape");
        assert_eq!(tracked.dir_suffix(), "local/x");

        tracked.dir_suffix = Some("../../etc/skins".to_string());
        assert_eq!(tracked.dir_suffix(), "etc/skins");

        tracked.dir_suffix = Some("..".to_string());
        assert_eq!(tracked.dir_suffix(), "local/x");
    }

    #[test]
    fn manifest_uses_pascal_case_file_fields() {
        let raw = r#"{
            "mod": { "id": "local:skins", "display_name": "Skins" },
            "downloads": [{
                "DownloadName": "main",
                "Files": [{ "From": "x.dat", "To": "data/x.dat" }],
                "Dirs": [{ "From": "textures", "To": "assets", "Recursive": true }]
            }]
        }"#;
        let manifest: ModManifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.tracked.id, ModId::new("local", "skins"));
        assert_eq!(manifest.tracked.dir_suffix(), "local/skins");
        assert!(manifest.downloads[0].dirs[0].recursive);
        assert_eq!(manifest.downloads[0].files[0], ModFile::new("x.dat", "data/x.dat"));
    }
}
