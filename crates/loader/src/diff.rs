//! Snapshot diffing: previous records vs. files on disk now.
//!
//! Events come out in a fixed order: every Add/Update in candidate order,
//! then every Remove in previous-snapshot order. A path present in the
//! candidates is never removed in the same batch.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::loader::{LoaderError, Result};
use crate::record::{path_key, ChangeEvent, CommandRecord};
use crate::scanner;

/// Result of comparing a snapshot against a fresh scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub events: Vec<ChangeEvent<CommandRecord>>,
    /// Snapshot to keep if `events` is non-empty.
    pub next: Vec<CommandRecord>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

struct Entry {
    record: CommandRecord,
    seen: bool,
}

/// Diff `previous` against `candidates`, reading modification times from disk.
pub fn diff(previous: &[CommandRecord], candidates: &[PathBuf]) -> Result<Diff> {
    diff_with(previous, candidates, scanner::last_modified)
}

/// Diff with an explicit modification-time source.
///
/// A candidate whose timestamp lookup fails with `NotFound` vanished after the
/// scan listed it and is treated as absent. Any other lookup error aborts the diff.
pub fn diff_with<F>(
    previous: &[CommandRecord],
    candidates: &[PathBuf],
    mut modified: F,
) -> Result<Diff>
where
    F: FnMut(&Path) -> io::Result<DateTime<Utc>>,
{
    let mut index: IndexMap<String, Entry> = previous
        .iter()
        .map(|r| {
            (
                r.key(),
                Entry {
                    record: r.clone(),
                    seen: false,
                },
            )
        })
        .collect();

    let mut events = Vec::new();

    for path in candidates {
        let last_modified = match modified(path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(LoaderError::Stat {
                    path: path.clone(),
                    source,
                })
            }
        };

        let key = path_key(path);
        match index.get_mut(&key) {
            // Same path listed twice in one scan: first listing wins.
            Some(entry) if entry.seen => {}
            Some(entry) => {
                entry.seen = true;
                if entry.record.last_modified != last_modified {
                    // Keeps a case-only rename's new spelling.
                    entry.record = CommandRecord::new(path.clone(), last_modified);
                    events.push(ChangeEvent::update(entry.record.clone()));
                }
            }
            None => {
                let record = CommandRecord::new(path.clone(), last_modified);
                events.push(ChangeEvent::add(record.clone()));
                index.insert(key, Entry { record, seen: true });
            }
        }
    }

    let mut next = Vec::with_capacity(index.len());
    for entry in index.into_values() {
        if entry.seen {
            next.push(entry.record);
        } else {
            events.push(ChangeEvent::remove(entry.record));
        }
    }

    Ok(Diff { events, next })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use super::*;
    use crate::record::ChangeAction;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn rec(path: &str, secs: i64) -> CommandRecord {
        CommandRecord::new(path, ts(secs))
    }

    /// Modification-time source backed by a fixed table.
    fn clock(times: &[(&str, i64)]) -> impl FnMut(&Path) -> io::Result<DateTime<Utc>> {
        let table: HashMap<PathBuf, DateTime<Utc>> = times
            .iter()
            .map(|(p, s)| (PathBuf::from(*p), ts(*s)))
            .collect();
        move |path: &Path| {
            table
                .get(path)
                .copied()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(|p| PathBuf::from(*p)).collect()
    }

    #[test]
    fn unchanged_files_produce_no_events() {
        let previous = vec![rec("/c/greet.py", 100), rec("/c/Echo/farewell.py", 100)];
        let candidates = paths(&["/c/greet.py", "/c/Echo/farewell.py"]);
        let diff = diff_with(
            &previous,
            &candidates,
            clock(&[("/c/greet.py", 100), ("/c/Echo/farewell.py", 100)]),
        )
        .unwrap();

        assert!(diff.is_empty());
        assert_eq!(diff.next, previous);
    }

    #[test]
    fn new_file_is_added_once() {
        let previous = vec![rec("/c/greet.py", 100)];
        let candidates = paths(&["/c/greet.py", "/c/hello.py"]);
        let diff = diff_with(
            &previous,
            &candidates,
            clock(&[("/c/greet.py", 100), ("/c/hello.py", 150)]),
        )
        .unwrap();

        assert_eq!(diff.events, vec![ChangeEvent::add(rec("/c/hello.py", 150))]);
        assert_eq!(diff.next, vec![rec("/c/greet.py", 100), rec("/c/hello.py", 150)]);
    }

    #[test]
    fn modified_file_is_updated_and_refreshed() {
        let previous = vec![rec("/c/greet.py", 100)];
        let candidates = paths(&["/c/greet.py"]);
        let diff = diff_with(&previous, &candidates, clock(&[("/c/greet.py", 200)])).unwrap();

        assert_eq!(diff.events, vec![ChangeEvent::update(rec("/c/greet.py", 200))]);
        assert_eq!(diff.next, vec![rec("/c/greet.py", 200)]);
    }

    #[test]
    fn deleted_file_is_removed() {
        let previous = vec![rec("/c/greet.py", 100), rec("/c/gone.py", 100)];
        let candidates = paths(&["/c/greet.py"]);
        let diff = diff_with(&previous, &candidates, clock(&[("/c/greet.py", 100)])).unwrap();

        assert_eq!(diff.events, vec![ChangeEvent::remove(rec("/c/gone.py", 100))]);
        assert_eq!(diff.next, vec![rec("/c/greet.py", 100)]);
    }

    #[test]
    fn echo_scenario_orders_removes_last() {
        let previous = vec![rec("/c/greet.py", 100), rec("/c/Echo/farewell.py", 100)];
        let candidates = paths(&["/c/greet.py", "/c/hello.py"]);
        let diff = diff_with(
            &previous,
            &candidates,
            clock(&[("/c/greet.py", 200), ("/c/hello.py", 150)]),
        )
        .unwrap();

        assert_eq!(
            diff.events,
            vec![
                ChangeEvent::update(rec("/c/greet.py", 200)),
                ChangeEvent::add(rec("/c/hello.py", 150)),
                ChangeEvent::remove(rec("/c/Echo/farewell.py", 100)),
            ]
        );
        assert_eq!(diff.next, vec![rec("/c/greet.py", 200), rec("/c/hello.py", 150)]);
    }

    #[test]
    fn removes_follow_every_add_and_update() {
        let previous = vec![rec("/c/a.py", 1), rec("/c/b.py", 1), rec("/c/c.py", 1)];
        let candidates = paths(&["/c/b.py", "/c/d.py", "/c/e.py"]);
        let diff = diff_with(
            &previous,
            &candidates,
            clock(&[("/c/b.py", 2), ("/c/d.py", 1), ("/c/e.py", 1)]),
        )
        .unwrap();

        let actions: Vec<_> = diff.events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ChangeAction::Update,
                ChangeAction::Add,
                ChangeAction::Add,
                ChangeAction::Remove,
                ChangeAction::Remove,
            ]
        );
        // Removes follow the previous snapshot's order.
        assert_eq!(diff.events[3].payload.path, PathBuf::from("/c/a.py"));
        assert_eq!(diff.events[4].payload.path, PathBuf::from("/c/c.py"));
    }

    #[test]
    fn path_identity_ignores_case() {
        let previous = vec![rec("/c/Greet.py", 100)];
        let candidates = paths(&["/c/greet.PY"]);
        let diff = diff_with(&previous, &candidates, clock(&[("/c/greet.PY", 100)])).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn case_only_rename_keeps_the_new_spelling() {
        let previous = vec![rec("/c/Greet.py", 100)];
        let candidates = paths(&["/c/greet.py"]);
        let diff = diff_with(&previous, &candidates, clock(&[("/c/greet.py", 200)])).unwrap();

        assert_eq!(diff.events, vec![ChangeEvent::update(rec("/c/greet.py", 200))]);
        assert_eq!(diff.next, vec![rec("/c/greet.py", 200)]);
    }

    #[test]
    fn vanished_candidate_is_treated_as_absent() {
        let previous = vec![rec("/c/greet.py", 100)];
        // Listed by the scan but gone before its timestamp could be read.
        let diff = diff_with(&previous, &paths(&["/c/greet.py"]), clock(&[])).unwrap();
        assert_eq!(diff.events, vec![ChangeEvent::remove(rec("/c/greet.py", 100))]);
        assert!(diff.next.is_empty());
    }

    #[test]
    fn stat_errors_abort_the_diff() {
        let err = diff_with(&[], &paths(&["/c/greet.py"]), |_: &Path| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();
        assert!(matches!(err, LoaderError::Stat { .. }));
    }

    #[test]
    fn empty_snapshot_and_no_candidates() {
        let diff = diff_with(&[], &[], clock(&[])).unwrap();
        assert!(diff.is_empty());
        assert!(diff.next.is_empty());
    }
}
