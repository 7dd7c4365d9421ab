//! Error types for the command loader.

use std::path::PathBuf;

use crate::compiler::CompileError;

/// Errors that can occur during registration and reload cycles.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The tenant already has a registry entry.
    #[error("Commands for tenant '{0}' have been loaded already")]
    DuplicateTenant(String),

    /// Tenant names become directory names and must be a single path component.
    #[error("Invalid tenant name '{0}'")]
    InvalidTenant(String),

    /// A command file failed to compile during the initial load.
    #[error("Failed to load command file: {}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    /// The registration callback refused a command during the initial load.
    #[error("Tenant '{tenant}' rejected command file: {}", path.display())]
    Rejected { tenant: String, path: PathBuf },

    /// A command directory could not be listed.
    #[error("Failed to scan command directory {}: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A command file's modification time could not be read.
    #[error("Failed to read metadata for {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
