//! Target path resolution
//!
//! Every destination is kept as a canonical target-relative string: forward
//! slashes, no leading slash, no `.`/`..` segments. Ownership lookups compare
//! these strings directly, so all destinations must pass through here.

use serde::{Deserialize, Serialize};

/// Game specific directory tokens used when re-rooting walked directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallLayout {
    /// Install root directory name that payloads may embed (e.g. `Game_Data`)
    pub base_install_dir: Option<String>,
    /// Assets directory that lives under the base install dir
    pub streaming_assets_dir: String,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            base_install_dir: None,
            streaming_assets_dir: "StreamingAssets".to_string(),
        }
    }
}

/// Normalize a raw path fragment into canonical form.
pub fn normalize(fragment: &str) -> String {
    fragment
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two canonical fragments.
pub fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Final segment of a fragment.
pub fn base_name(fragment: &str) -> &str {
    fragment
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Whether the last segment of the fragment carries a file extension.
///
/// Fragments without one are treated as directories.
pub fn has_extension(fragment: &str) -> bool {
    base_name(fragment).contains('.')
}

/// Resolve the destination of an explicit file mapping.
pub fn file_destination(from: &str, to: &str) -> String {
    let to = normalize(to);
    if has_extension(&to) {
        to
    } else {
        join(&to, &normalize(base_name(from)))
    }
}

/// Re-root a file found while walking a directory mapping.
///
/// `relative` is the file's path below the mapping's `From` directory. The
/// base install directory token is added when the path starts with the
/// assets directory but lacks it, and collapsed to one occurrence when the
/// payload repeats it.
pub fn reroot(dir_to: &str, relative: &str, layout: &InstallLayout) -> String {
    let to = join(&normalize(dir_to), &normalize(relative));
    let Some(base) = layout.base_install_dir.as_deref().filter(|b| !b.is_empty()) else {
        return to;
    };

    let mut segments: Vec<&str> = to.split('/').collect();
    let dir_count = segments.len().saturating_sub(1);
    let occurrences = segments[..dir_count].iter().filter(|s| **s == base).count();

    if occurrences == 0 {
        if segments.first() == Some(&layout.streaming_assets_dir.as_str()) {
            return join(base, &to);
        }
        return to;
    }

    let mut extra = occurrences.saturating_sub(1);
    let mut i = 0;
    while extra > 0 && i < segments.len() - 1 {
        if segments[i] == base {
            segments.remove(i);
            extra -= 1;
        } else {
            i += 1;
        }
    }
    segments.join("/")
}

/// Whether `needle` appears in `path` as a run of whole segments.
pub fn contains_segments(path: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack: Vec<&str> = path.split('/').collect();
    let needle: Vec<&str> = needle.split('/').collect();
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}
