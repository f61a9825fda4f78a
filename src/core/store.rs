//! Workspace handle for modeward's on-disk state.
//!
//! A `Store` pins the workspace root (where collaborator documents such as
//! `agents/agent.yaml` and `channels/*.yaml` live) and the state directory
//! modeward itself writes to. Only the state directory is ever mutated.

use crate::core::config::Settings;
use std::path::{Path, PathBuf};

pub const AUDIT_LOG_NAME: &str = "audit.log";
pub const MODE_FILE_NAME: &str = "mode";
pub const PROPOSALS_DIR_NAME: &str = "proposals";
pub const NOTES_FILE_NAME: &str = "notes.md";

#[derive(Debug, Clone)]
pub struct Store {
    /// Workspace root; collaborator documents are resolved against it.
    pub root: PathBuf,
    /// Directory holding the audit log, mode file, notes and proposals.
    pub state_dir: PathBuf,
}

impl Store {
    pub fn new(root: &Path, settings: &Settings) -> Self {
        Self {
            root: root.to_path_buf(),
            state_dir: root.join(&settings.paths.state_dir),
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.state_dir.join(AUDIT_LOG_NAME)
    }

    pub fn mode_path(&self) -> PathBuf {
        self.state_dir.join(MODE_FILE_NAME)
    }

    pub fn proposals_dir(&self) -> PathBuf {
        self.state_dir.join(PROPOSALS_DIR_NAME)
    }

    pub fn notes_path(&self) -> PathBuf {
        self.state_dir.join(NOTES_FILE_NAME)
    }

    /// Resolve a workspace-relative collaborator path.
    pub fn resolve(&self, rel: &Path) -> PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }
}
