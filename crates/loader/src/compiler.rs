//! The seam to whatever turns a command file into an invocable command.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::record::command_name;

/// Errors raised while compiling a command file.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Filesystem I/O error (including non-UTF-8 source).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file was read but does not define a usable command.
    #[error("Invalid command: {0}")]
    Invalid(String),
}

/// Builds commands from command files.
///
/// One compiler is shared by every tenant of a [`CommandLoader`](crate::CommandLoader),
/// so implementations must be thread-safe.
pub trait CommandCompiler: Send + Sync + 'static {
    type Command: Send + 'static;

    /// Compile the file at `path`, last written at `last_modified`.
    fn compile(
        &self,
        path: &Path,
        last_modified: DateTime<Utc>,
    ) -> Result<Self::Command, CompileError>;

    /// A placeholder carrying only the command's name, used to signal removal
    /// without compiling anything.
    fn tombstone(&self, name: &str) -> Self::Command;
}

/// Command produced by [`SourceCompiler`]: the file's text, named by its stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCommand {
    pub name: String,
    /// `None` for tombstones.
    pub path: Option<PathBuf>,
    pub source: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl SourceCommand {
    pub fn is_tombstone(&self) -> bool {
        self.path.is_none()
    }
}

/// Minimal compiler that loads command files as UTF-8 source text.
///
/// Files that are empty or contain only whitespace are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCompiler;

impl CommandCompiler for SourceCompiler {
    type Command = SourceCommand;

    fn compile(
        &self,
        path: &Path,
        last_modified: DateTime<Utc>,
    ) -> Result<SourceCommand, CompileError> {
        let source = fs::read_to_string(path)?;
        if source.trim().is_empty() {
            return Err(CompileError::Invalid(format!(
                "command file '{}' is empty",
                path.display()
            )));
        }
        Ok(SourceCommand {
            name: command_name(path),
            path: Some(path.to_path_buf()),
            source,
            last_modified: Some(last_modified),
        })
    }

    fn tombstone(&self, name: &str) -> SourceCommand {
        SourceCommand {
            name: name.to_string(),
            path: None,
            source: String::new(),
            last_modified: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn compiles_source_named_by_stem() {
        let dir = TempDir::new().expect("create tempdir");
        let path = dir.path().join("Greet.py");
        fs::write(&path, "print('hi')\n").unwrap();
        let now = Utc::now();

        let cmd = SourceCompiler.compile(&path, now).unwrap();
        assert_eq!(cmd.name, "Greet");
        assert_eq!(cmd.source, "print('hi')\n");
        assert_eq!(cmd.last_modified, Some(now));
        assert!(!cmd.is_tombstone());
    }

    #[test]
    fn rejects_blank_and_missing_files() {
        let dir = TempDir::new().expect("create tempdir");
        let path = dir.path().join("blank.py");
        fs::write(&path, "  \n").unwrap();

        assert!(matches!(
            SourceCompiler.compile(&path, Utc::now()),
            Err(CompileError::Invalid(_))
        ));
        assert!(matches!(
            SourceCompiler.compile(&dir.path().join("missing.py"), Utc::now()),
            Err(CompileError::Io(_))
        ));
    }

    #[test]
    fn tombstone_carries_only_the_name() {
        let cmd = SourceCompiler.tombstone("farewell");
        assert_eq!(cmd.name, "farewell");
        assert!(cmd.is_tombstone());
        assert!(cmd.source.is_empty());
    }
}
