//! Install plan compilation
//!
//! Expands a mod's download descriptors into the flat list of files that an
//! install would place, in declaration order.

use super::error::InstallError;
use super::paths::{self, InstallLayout};
use super::types::{DownloadFiles, ModDir, ModId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file an install will place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Staged payload file on disk
    pub source: PathBuf,
    /// Canonical target-relative destination
    pub destination: String,
}

/// Compiled install plan for a single mod.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub mod_id: ModId,
    pub files: Vec<PlannedFile>,
}

impl InstallPlan {
    /// Compile the plan for `downloads` staged under `mod_dir`.
    ///
    /// When two descriptors resolve to the same destination the later one
    /// wins, keeping the position of the first.
    pub fn compile(
        mod_id: &ModId,
        mod_dir: &Path,
        downloads: &[DownloadFiles],
        layout: &InstallLayout,
    ) -> Result<Self, InstallError> {
        let mut files: Vec<PlannedFile> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut push = |file: PlannedFile| match index.get(&file.destination) {
            Some(&i) => {
                tracing::debug!(
                    "{} declared twice for {}, using {}",
                    file.destination,
                    mod_id,
                    file.source.display()
                );
                files[i] = file;
            }
            None => {
                index.insert(file.destination.clone(), files.len());
                files.push(file);
            }
        };

        for download in downloads {
            let download_dir = mod_dir.join(paths::normalize(&download.download_name));

            for f in &download.files {
                push(PlannedFile {
                    source: download_dir.join(paths::normalize(&f.from)),
                    destination: paths::file_destination(&f.from, &f.to),
                });
            }

            for d in &download.dirs {
                for file in compile_dir(mod_id, &download_dir, d, layout)? {
                    push(file);
                }
            }
        }

        tracing::debug!("Compiled {} planned files for {}", files.len(), mod_id);
        Ok(Self {
            mod_id: mod_id.clone(),
            files,
        })
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.destination.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn compile_dir(
    mod_id: &ModId,
    download_dir: &Path,
    dir: &ModDir,
    layout: &InstallLayout,
) -> Result<Vec<PlannedFile>, InstallError> {
    let root = download_dir.join(paths::normalize(&dir.from));
    if !root.is_dir() {
        return Err(InstallError::MissingPayloadDirectory {
            mod_id: mod_id.clone(),
            path: root,
        });
    }

    let read_err = |path: &Path, source: std::io::Error| InstallError::PayloadRead {
        mod_id: mod_id.clone(),
        path: path.to_path_buf(),
        source,
    };

    let mut planned = Vec::new();

    if !dir.recursive {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(|e| read_err(&root, e))? {
            let entry = entry.map_err(|e| read_err(&root, e))?;
            let file_type = entry.file_type().map_err(|e| read_err(&entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            entries.push(entry.path());
        }
        entries.sort();

        for source in entries {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            planned.push(PlannedFile {
                destination: paths::join(&paths::normalize(&dir.to), &paths::normalize(&name)),
                source,
            });
        }
        return Ok(planned);
    }

    let declared_to = paths::normalize(&dir.to);
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            read_err(&path, source)
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let walked = entry.path().to_string_lossy().replace('\\', "/");
        let relative = entry.path().strip_prefix(&root).map_err(|_| {
            InstallError::PathReconciliation {
                mod_id: mod_id.clone(),
                to: declared_to.clone(),
                walked: walked.clone(),
            }
        })?;
        let destination =
            paths::reroot(&declared_to, &relative.to_string_lossy(), layout);

        if !paths::contains_segments(&destination, &declared_to) {
            return Err(InstallError::PathReconciliation {
                mod_id: mod_id.clone(),
                to: declared_to,
                walked,
            });
        }

        planned.push(PlannedFile {
            source: entry.into_path(),
            destination,
        });
    }

    Ok(planned)
}
