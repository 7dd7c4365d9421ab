//! Command file discovery.
//!
//! Scans are non-recursive. A tenant sees the shared directory's files followed
//! by the files of its own `{command_dir}/{tenant}` subdirectory.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::extensions::CommandExtensionSet;
use crate::loader::{LoaderError, Result};
use crate::record::path_key;

/// List the command files directly inside `dir`, sorted by file name.
///
/// A missing directory yields an empty list. Entries that are not regular files
/// (after following symlinks) or whose extension is not recognized are ignored.
pub fn scan(dir: &Path, extensions: &CommandExtensionSet) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let scan_err = |source: io::Error| LoaderError::Scan {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_err)? {
        let path = entry.map_err(scan_err)?.path();

        if !extensions.matches(&path) {
            continue;
        }

        // Dangling symlinks and entries removed mid-scan are skipped.
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(path),
            _ => continue,
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// A tenant's private command directory.
pub fn tenant_dir(command_dir: &Path, tenant: &str) -> PathBuf {
    command_dir.join(tenant)
}

/// Shared candidates followed by tenant candidates, keeping the first of any
/// paths that are equal ignoring case.
pub fn merge_candidates(shared: &[PathBuf], tenant: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::with_capacity(shared.len() + tenant.len());
    shared
        .iter()
        .cloned()
        .chain(tenant)
        .filter(|p| seen.insert(path_key(p)))
        .collect()
}

/// Effective candidate set for one tenant: `scan(command_dir) ∪ scan(command_dir/tenant)`.
pub fn tenant_candidates(
    command_dir: &Path,
    tenant: &str,
    extensions: &CommandExtensionSet,
) -> Result<Vec<PathBuf>> {
    let shared = scan(command_dir, extensions)?;
    let own = scan(&tenant_dir(command_dir, tenant), extensions)?;
    Ok(merge_candidates(&shared, own))
}

/// Last write time of a file.
pub fn last_modified(path: &Path) -> io::Result<DateTime<Utc>> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn python() -> CommandExtensionSet {
        CommandExtensionSet::new(["py"])
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().expect("create tempdir");
        let files = scan(&dir.path().join("nope"), &python()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn scan_filters_extensions_and_skips_subdirectories() {
        let dir = TempDir::new().expect("create tempdir");
        fs::write(dir.path().join("b.py"), "x").unwrap();
        fs::write(dir.path().join("A.PY"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("dir.py")).unwrap();
        let sub = dir.path().join("Echo");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("nested.py"), "x").unwrap();

        let files = scan(dir.path(), &python()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PY", "b.py"]);
    }

    #[test]
    fn tenant_candidates_list_shared_first() {
        let dir = TempDir::new().expect("create tempdir");
        fs::write(dir.path().join("greet.py"), "x").unwrap();
        let sub = dir.path().join("Echo");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("farewell.py"), "x").unwrap();

        let files = tenant_candidates(dir.path(), "Echo", &python()).unwrap();
        assert_eq!(files, vec![dir.path().join("greet.py"), sub.join("farewell.py")]);

        // Another tenant without a subdirectory only sees shared files.
        let files = tenant_candidates(dir.path(), "Other", &python()).unwrap();
        assert_eq!(files, vec![dir.path().join("greet.py")]);
    }

    #[test]
    fn merge_drops_case_insensitive_duplicates() {
        let shared = vec![PathBuf::from("/c/Greet.py")];
        let merged = merge_candidates(
            &shared,
            vec![PathBuf::from("/c/greet.PY"), PathBuf::from("/c/other.py")],
        );
        assert_eq!(
            merged,
            vec![PathBuf::from("/c/Greet.py"), PathBuf::from("/c/other.py")]
        );
    }
}
