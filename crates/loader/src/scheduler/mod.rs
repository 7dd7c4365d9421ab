//! Background rescans on a fixed interval.
//!
//! One thread runs every cycle. The timer is disarmed while a cycle runs and
//! re-armed once it returns, whether it succeeded, failed, or panicked. A
//! [`SchedulerHandle`] can nudge the thread to rescan early; the `notify`
//! watcher in [`watch_command_dir`] uses this to react to file edits.

mod core;
mod watcher;


pub use self::core::{ReloadCycle, ReloadScheduler, SchedulerConfig, SchedulerHandle};
pub use self::watcher::{is_relevant, watch_command_dir};
