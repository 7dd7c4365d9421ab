//! Filesystem watcher that nudges the scheduler when command files change.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::extensions::CommandExtensionSet;
use crate::loader::Result;

use super::core::SchedulerHandle;

/// Whether a watcher event touches a recognized command file.
pub fn is_relevant(event: &Event, extensions: &CommandExtensionSet) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    );
    kind_matches && event.paths.iter().any(|p| extensions.matches(p))
}

/// Watch `dir` (recursively, so tenant subdirectories are covered) and nudge
/// the scheduler on every relevant change.
///
/// The watcher only shortens the wait before the next cycle; the cycle's diff
/// still decides what changed. Keep the returned watcher alive for as long as
/// nudges are wanted.
pub fn watch_command_dir(
    dir: &Path,
    extensions: CommandExtensionSet,
    handle: SchedulerHandle,
) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_relevant(&event, &extensions) => {
            debug!(paths = ?event.paths, kind = ?event.kind, "command file changed");
            handle.nudge();
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "filesystem watcher error"),
    })?;

    watcher.watch(dir, RecursiveMode::Recursive)?;

    info!(path = %dir.display(), "watching command directory for changes (recursive)");
    Ok(watcher)
}
