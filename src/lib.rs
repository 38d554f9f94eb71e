//! ModKeeper - installs staged mod payloads into a target directory
//!
//! This crate provides:
//! - Install plans compiled from per-download file and directory mappings
//! - File ownership tracking with interactive or scripted conflict resolution
//! - Backups of displaced files and compensation when an install fails
//! - Uninstall that restores what each mod replaced

pub mod app;
pub mod config;
pub mod managed;
pub mod mods;

pub use app::App;
pub use config::Config;
