//! Core [`CommandLoader`] struct: the tenant registry and the reload cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use dynacmd_core::Config;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compiler::CommandCompiler;
use crate::diff;
use crate::extensions::CommandExtensionSet;
use crate::record::{ChangeEvent, CommandRecord};
use crate::scanner;
use crate::translator;

use super::error::{LoaderError, Result};

/// Receives each tenant's translated change batches.
pub type UpdateSink<T> = Arc<dyn Fn(Vec<ChangeEvent<T>>) + Send + Sync>;

/// Reads a command file's modification time.
pub(crate) type ModifiedSource = Arc<dyn Fn(&Path) -> io::Result<DateTime<Utc>> + Send + Sync>;

type Registry<T> = BTreeMap<String, Arc<TenantState<T>>>;

/// Counters for one reload cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub tenants_scanned: usize,
    /// Add/Update/Remove events found by the diff, across all tenants.
    pub events_detected: usize,
    /// Events handed to update sinks after translation.
    pub events_delivered: usize,
    /// Add/Update events dropped because the file failed to compile.
    pub compile_failures: usize,
}

struct TenantState<T> {
    name: String,
    /// Replaced wholesale by the cycle that changes it.
    known: RwLock<Vec<CommandRecord>>,
    sink: UpdateSink<T>,
}

struct Shared<C: CommandCompiler> {
    command_dir: PathBuf,
    extensions: CommandExtensionSet,
    compiler: C,
    modified: ModifiedSource,
    /// Keyed by lowercased tenant name.
    tenants: RwLock<Registry<C::Command>>,
    /// Keys whose initial load is in progress, so a name loads at most once.
    pending: Mutex<BTreeSet<String>>,
    /// Held for the whole of a cycle; cycles never overlap.
    cycle: Mutex<()>,
}

/// Claim on a tenant key while its initial load runs; released on drop.
struct PendingRegistration<'a> {
    pending: &'a Mutex<BTreeSet<String>>,
    key: String,
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Keeps every registered tenant's commands in sync with the command directory.
///
/// Cloning is cheap and every clone drives the same registry, so one loader is
/// built at startup and handed to whatever registers tenants and to the
/// [`ReloadScheduler`](crate::ReloadScheduler).
pub struct CommandLoader<C: CommandCompiler> {
    shared: Arc<Shared<C>>,
}

impl<C: CommandCompiler> Clone for CommandLoader<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: CommandCompiler> CommandLoader<C> {
    /// Create a loader for the shared command directory `command_dir`.
    ///
    /// The directory does not need to exist yet.
    pub fn new(
        command_dir: impl Into<PathBuf>,
        extensions: CommandExtensionSet,
        compiler: C,
    ) -> Self {
        Self::with_modified_source(
            command_dir,
            extensions,
            compiler,
            Arc::new(scanner::last_modified),
        )
    }

    /// Like [`new`](Self::new), reading modification times through `modified`.
    pub(crate) fn with_modified_source(
        command_dir: impl Into<PathBuf>,
        extensions: CommandExtensionSet,
        compiler: C,
        modified: ModifiedSource,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                command_dir: command_dir.into(),
                extensions,
                compiler,
                modified,
                tenants: RwLock::new(BTreeMap::new()),
                pending: Mutex::new(BTreeSet::new()),
                cycle: Mutex::new(()),
            }),
        }
    }

    /// Create a loader from the process configuration.
    pub fn from_config(config: &Config, compiler: C) -> Self {
        Self::new(
            config.command_dir(),
            CommandExtensionSet::from_languages(&config.languages),
            compiler,
        )
    }

    /// Register a tenant and load its commands.
    ///
    /// Every command file visible to the tenant is compiled and passed to
    /// `on_command`, in scan order. The tenant only enters the registry if all
    /// of them compile and are accepted; on failure nothing is recorded, but
    /// commands already passed to `on_command` are the caller's to roll back.
    ///
    /// If the shared command directory does not exist the tenant is registered
    /// with no commands and will pick them up on later cycles.
    ///
    /// No lock is held while `on_command` runs, so it may register other
    /// tenants. Registering the same name again, including from inside its own
    /// `on_command`, fails with [`LoaderError::DuplicateTenant`].
    ///
    /// Returns the number of commands loaded.
    pub fn register<R, S>(&self, tenant: &str, mut on_command: R, sink: S) -> Result<usize>
    where
        R: FnMut(C::Command) -> bool,
        S: Fn(Vec<ChangeEvent<C::Command>>) + Send + Sync + 'static,
    {
        validate_tenant(tenant)?;

        let key = tenant_key(tenant);
        let _claim = self.claim(tenant, &key)?;

        let known = if self.shared.command_dir.is_dir() {
            self.initial_load(tenant, &mut on_command)?
        } else {
            info!(
                tenant = %tenant,
                path = %self.shared.command_dir.display(),
                "command directory does not exist, registering with no commands"
            );
            Vec::new()
        };

        let count = known.len();
        self.write_tenants()?.insert(
            key,
            Arc::new(TenantState {
                name: tenant.to_string(),
                known: RwLock::new(known),
                sink: Arc::new(sink),
            }),
        );

        info!(tenant = %tenant, commands = count, "registered tenant");
        Ok(count)
    }

    /// Reserve `key` for an initial load, failing if it is registered or loading.
    fn claim(&self, tenant: &str, key: &str) -> Result<PendingRegistration<'_>> {
        // A panic while held leaves a consistent set behind.
        let mut pending = self
            .shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pending.contains(key) || self.read_tenants()?.contains_key(key) {
            return Err(LoaderError::DuplicateTenant(tenant.to_string()));
        }
        pending.insert(key.to_string());
        Ok(PendingRegistration {
            pending: &self.shared.pending,
            key: key.to_string(),
        })
    }

    /// Compile and hand over every candidate, stopping at the first failure.
    fn initial_load<R>(&self, tenant: &str, on_command: &mut R) -> Result<Vec<CommandRecord>>
    where
        R: FnMut(C::Command) -> bool,
    {
        let candidates =
            scanner::tenant_candidates(&self.shared.command_dir, tenant, &self.shared.extensions)?;
        let mut known = Vec::with_capacity(candidates.len());

        for path in candidates {
            let last_modified = match (self.shared.modified)(&path) {
                Ok(t) => t,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(
                        tenant = %tenant,
                        path = %path.display(),
                        "command vanished before load"
                    );
                    continue;
                }
                Err(source) => return Err(LoaderError::Stat { path, source }),
            };

            let command = self
                .shared
                .compiler
                .compile(&path, last_modified)
                .map_err(|source| LoaderError::Compile {
                    path: path.clone(),
                    source,
                })?;

            if !on_command(command) {
                warn!(tenant = %tenant, path = %path.display(), "command rejected, aborting load");
                return Err(LoaderError::Rejected {
                    tenant: tenant.to_string(),
                    path,
                });
            }

            info!(tenant = %tenant, path = %path.display(), "loaded command");
            known.push(CommandRecord::new(path, last_modified));
        }

        Ok(known)
    }

    /// Rescan every registered tenant once, in name order.
    ///
    /// The tenant list is copied at the start; tenants registered while the
    /// cycle runs are picked up by the next one. Compile failures drop single
    /// events. Any other error stops the cycle, leaving the remaining tenants
    /// unscanned until the next cycle.
    ///
    /// Calls from several clones run one after another. Update sinks run
    /// inside the cycle and must not start another one.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        // Guards no data, so a panic in an earlier sink leaves nothing to repair.
        let _cycle = self
            .shared
            .cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let tenants: Vec<_> = self.read_tenants()?.values().cloned().collect();
        let mut report = CycleReport::default();
        if tenants.is_empty() {
            return Ok(report);
        }

        let shared = scanner::scan(&self.shared.command_dir, &self.shared.extensions)?;
        for tenant in &tenants {
            self.rescan_tenant(tenant, &shared, &mut report)?;
        }

        Ok(report)
    }

    fn rescan_tenant(
        &self,
        tenant: &TenantState<C::Command>,
        shared: &[PathBuf],
        report: &mut CycleReport,
    ) -> Result<()> {
        let own = scanner::scan(
            &scanner::tenant_dir(&self.shared.command_dir, &tenant.name),
            &self.shared.extensions,
        )?;
        let candidates = scanner::merge_candidates(shared, own);

        let diff = {
            let known = tenant
                .known
                .read()
                .map_err(|e| LoaderError::LockPoisoned(format!("tenant snapshot: {}", e)))?;
            diff::diff_with(&known, &candidates, |path: &Path| {
                (self.shared.modified)(path)
            })?
        };
        report.tenants_scanned += 1;

        if diff.is_empty() {
            debug!(tenant = %tenant.name, "no command changes");
            return Ok(());
        }
        report.events_detected += diff.events.len();

        *tenant
            .known
            .write()
            .map_err(|e| LoaderError::LockPoisoned(format!("tenant snapshot: {}", e)))? = diff.next;

        let translation =
            translator::translate(&self.shared.compiler, &tenant.name, &diff.events);
        report.compile_failures += translation.failures;
        if translation.events.is_empty() {
            debug!(
                tenant = %tenant.name,
                "every changed command failed to load, nothing to deliver"
            );
            return Ok(());
        }

        report.events_delivered += translation.events.len();
        info!(
            tenant = %tenant.name,
            detected = diff.events.len(),
            delivered = translation.events.len(),
            "delivering command updates"
        );
        (tenant.sink)(translation.events);
        Ok(())
    }

    /// Registered tenant names, in cycle order.
    pub fn tenants(&self) -> Result<Vec<String>> {
        Ok(self.read_tenants()?.values().map(|t| t.name.clone()).collect())
    }

    /// The records currently known for `tenant` (case-insensitive lookup).
    pub fn snapshot(&self, tenant: &str) -> Result<Option<Vec<CommandRecord>>> {
        let tenants = self.read_tenants()?;
        let Some(state) = tenants.get(&tenant_key(tenant)) else {
            return Ok(None);
        };
        let known = state
            .known
            .read()
            .map_err(|e| LoaderError::LockPoisoned(format!("tenant snapshot: {}", e)))?;
        Ok(Some(known.clone()))
    }

    /// Shared command directory.
    pub fn command_dir(&self) -> &Path {
        &self.shared.command_dir
    }

    pub fn extensions(&self) -> &CommandExtensionSet {
        &self.shared.extensions
    }

    pub fn compiler(&self) -> &C {
        &self.shared.compiler
    }

    fn read_tenants(&self) -> Result<RwLockReadGuard<'_, Registry<C::Command>>> {
        self.shared
            .tenants
            .read()
            .map_err(|e| LoaderError::LockPoisoned(format!("tenant registry: {}", e)))
    }

    fn write_tenants(&self) -> Result<RwLockWriteGuard<'_, Registry<C::Command>>> {
        self.shared
            .tenants
            .write()
            .map_err(|e| LoaderError::LockPoisoned(format!("tenant registry: {}", e)))
    }
}

fn tenant_key(tenant: &str) -> String {
    tenant.to_lowercase()
}

/// A tenant name must name exactly one directory under the command directory.
fn validate_tenant(tenant: &str) -> Result<()> {
    let mut components = Path::new(tenant).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None)
            if name == OsStr::new(tenant) && tenant.trim() == tenant =>
        {
            Ok(())
        }
        _ => Err(LoaderError::InvalidTenant(tenant.to_string())),
    }
}
