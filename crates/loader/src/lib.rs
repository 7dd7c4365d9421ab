//! Hot-reloading command loader for multi-tenant servers.
//!
//! This crate provides:
//! - Command file discovery over a shared directory plus per-tenant overrides
//! - A snapshot diff engine producing ordered Add/Update/Remove batches
//! - A tenant registry with all-or-nothing initial loads
//! - A single background scheduler that rescans every tenant periodically,
//!   optionally nudged early by a `notify` watcher

pub mod compiler;
pub mod diff;
pub mod extensions;
pub mod loader;
pub mod record;
pub mod scanner;
pub mod scheduler;
pub mod translator;

pub use compiler::{CommandCompiler, CompileError, SourceCommand, SourceCompiler};
pub use extensions::CommandExtensionSet;
pub use loader::{CommandLoader, CycleReport, LoaderError, Result, UpdateSink};
pub use record::{ChangeAction, ChangeEvent, CommandRecord};
pub use scheduler::{ReloadCycle, ReloadScheduler, SchedulerConfig, SchedulerHandle};
