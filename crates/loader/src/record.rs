//! Command file records and the change events emitted for them.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A known command file and the modification time last observed for it.
///
/// Identity is the file path compared case-insensitively (see [`CommandRecord::key`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub path: PathBuf,
    pub last_modified: DateTime<Utc>,
}

impl CommandRecord {
    pub fn new(path: impl Into<PathBuf>, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }

    /// Case-insensitive identity key for this record's path.
    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    /// Command name: the file's base name without extension.
    pub fn name(&self) -> String {
        command_name(&self.path)
    }
}

/// Case-insensitive identity key for a command file path.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Base name of a command file without its extension.
pub fn command_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Update,
    Remove,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Add => write!(f, "add"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Remove => write!(f, "remove"),
        }
    }
}

/// One change delivered to a tenant: what happened, and to what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent<T> {
    pub action: ChangeAction,
    pub payload: T,
}

impl<T> ChangeEvent<T> {
    pub fn new(action: ChangeAction, payload: T) -> Self {
        Self { action, payload }
    }

    pub fn add(payload: T) -> Self {
        Self::new(ChangeAction::Add, payload)
    }

    pub fn update(payload: T) -> Self {
        Self::new(ChangeAction::Update, payload)
    }

    pub fn remove(payload: T) -> Self {
        Self::new(ChangeAction::Remove, payload)
    }
}
