//! Tenant registry with all-or-nothing initial loads and scheduled rescans.
//!
//! Every tenant sees the shared command directory plus its own subdirectory.
//! Registration compiles everything once; each later cycle diffs the
//! directories against the tenant's snapshot and hands the resulting batch to
//! the tenant's update sink.

mod core;
mod error;


pub use self::core::{CommandLoader, CycleReport, UpdateSink};
pub use self::error::{LoaderError, Result};
