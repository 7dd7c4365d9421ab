//! Turns path/time change events into command change events.

use tracing::{debug, warn};

use crate::compiler::CommandCompiler;
use crate::record::{ChangeAction, ChangeEvent, CommandRecord};

/// Commands ready for an update sink, plus the number of events dropped.
#[derive(Debug)]
pub struct Translation<T> {
    pub events: Vec<ChangeEvent<T>>,
    pub failures: usize,
}

/// Translate a detected batch for `tenant`, preserving event order.
///
/// Removes become tombstones and never touch the compiler. Adds and updates are
/// compiled; a compile failure is logged and that event is dropped while the
/// rest of the batch goes through.
pub fn translate<C: CommandCompiler>(
    compiler: &C,
    tenant: &str,
    batch: &[ChangeEvent<CommandRecord>],
) -> Translation<C::Command> {
    let mut events = Vec::with_capacity(batch.len());
    let mut failures = 0;

    for event in batch {
        let record = &event.payload;
        match event.action {
            ChangeAction::Remove => {
                events.push(ChangeEvent::remove(compiler.tombstone(&record.name())));
            }
            action => match compiler.compile(&record.path, record.last_modified) {
                Ok(command) => events.push(ChangeEvent::new(action, command)),
                Err(e) => {
                    failures += 1;
                    warn!(
                        tenant = %tenant,
                        path = %record.path.display(),
                        action = %action,
                        error = %e,
                        "failed to load command file, skipping"
                    );
                    continue;
                }
            },
        }
        debug!(
            tenant = %tenant,
            path = %record.path.display(),
            action = %event.action,
            "translated command change"
        );
    }

    Translation { events, failures }
}
