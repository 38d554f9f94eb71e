//! Install engine errors

use super::types::ModId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Payload directory for {mod_id} not found: {}", path.display())]
    MissingPayloadDirectory { mod_id: ModId, path: PathBuf },

    #[error("Failed to read payload of {mod_id} at {}: {source}", path.display())]
    PayloadRead {
        mod_id: ModId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to find `To` dir [{to}] in walked file [{walked}] for {mod_id}")]
    PathReconciliation {
        mod_id: ModId,
        to: String,
        walked: String,
    },

    #[error("Failed to back up [{}] to [{}]: {source}", target.display(), backup.display())]
    BackupFailure {
        target: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move [{}] to [{}]: {source}", from.display(), to.display())]
    MoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{mod_id} has no managed files")]
    NotManaged { mod_id: ModId },

    #[error("Conflict resolver failed for {mod_id}: {message}")]
    Resolver { mod_id: ModId, message: String },

    #[error("Failed to persist managed files to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Install of {mod_id} failed and was rolled back ({} rollback failures): {cause}", compensation.len())]
    RolledBack {
        mod_id: ModId,
        #[source]
        cause: Box<InstallError>,
        compensation: Vec<CompensationFailure>,
        /// Non-fatal failures recorded before the install stopped
        warnings: Vec<InstallError>,
    },
}

impl InstallError {
    /// Whether this error stops the installer and triggers compensation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, InstallError::BackupFailure { .. })
    }
}

/// Which undo step failed during compensation or uninstall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    /// Removing an installed file
    RemoveInstalled,
    /// Returning an installed file to its payload location
    ReturnToPayload,
    /// Clearing the current occupant of a backed up path
    ClearOccupant,
    /// Moving a backup back to its original path
    RestoreBackup,
}

impl UndoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndoAction::RemoveInstalled => "remove",
            UndoAction::ReturnToPayload => "return to payload",
            UndoAction::ClearOccupant => "clear",
            UndoAction::RestoreBackup => "restore",
        }
    }
}

/// A single undo step that could not be completed.
#[derive(Error, Debug)]
#[error("failed to {} [{}]: {source}", action.as_str(), path.display())]
pub struct CompensationFailure {
    pub action: UndoAction,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
