//! Reactive Runtime
//!
//! The runtime is the coordinator that connects cells, computations and the
//! update scheduler. It is constructed explicitly and handed to everything
//! that needs it; there is no global registry, so every test can start from
//! a fresh runtime.
//!
//! # How It Works
//!
//! 1. A computation registers with the runtime when it is created.
//!
//! 2. While a computation runs, the runtime's tracker records every cell it
//!    reads. When the run ends the recorded set replaces the previous one.
//!
//! 3. When a cell changes, the runtime:
//!    a. Finds every computation with a related read record
//!    b. Marks each one dirty
//!    c. Hands it to the scheduler (or defers it, if it is running)
//!
//! 4. Coalesced updates wait in the task queue until the host calls
//!    [`Runtime::drain_pending_updates`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::computation::{Computation, ComputationInner};
use super::context::TrackingContext;
use super::id::{ComputationId, ObjectId};
use super::ledger::{CellKey, Path};
use super::tracker::Tracker;
use crate::config::RuntimeConfig;
use crate::error::Diagnostic;
use crate::instance::Disposable;
use crate::scheduler::UpdateScheduler;

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) tracker: Mutex<Tracker>,
    pub(crate) scheduler: UpdateScheduler,
    registry: Mutex<HashMap<ComputationId, Weak<ComputationInner>>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

/// Handle to a reactive runtime. Clones share the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let scheduler = UpdateScheduler::new(config.loop_limit);
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                tracker: Mutex::new(Tracker::new()),
                scheduler,
                registry: Mutex::new(HashMap::new()),
                diagnostics: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    /// Run `f` as `computation`, recording every cell it reads.
    ///
    /// The recorded set replaces the computation's previous dependencies.
    pub fn track<R>(&self, computation: &Computation, f: impl FnOnce() -> R) -> R {
        let context = TrackingContext::enter(&self.inner, Some(computation.id()));
        let result = f();
        let reads = context.finish();

        if !computation.is_disposed() {
            self.inner
                .tracker
                .lock()
                .replace_dependencies(computation.id(), reads);
        }
        result
    }

    /// Run `f` without attributing its reads to any computation.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let context = TrackingContext::enter(&self.inner, None);
        let result = f();
        context.finish();
        result
    }

    /// Whether a computation is currently collecting reads.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.lock().is_tracking()
    }

    /// The computation currently collecting reads, if any.
    pub fn current_computation(&self) -> Option<ComputationId> {
        self.inner.tracker.lock().current()
    }

    pub(crate) fn record_read(&self, key: CellKey) {
        self.inner.tracker.lock().record_read(key);
    }

    /// Mark dirty every computation that read `path` on `owner` (or a
    /// related path), and hand each to the scheduler.
    pub fn notify(&self, owner: ObjectId, path: &Path) {
        let affected = self.inner.tracker.lock().affected(owner, path);
        if affected.is_empty() {
            return;
        }

        let computations: Vec<Computation> = {
            let registry = self.inner.registry.lock();
            affected
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .map(Computation::from_inner)
                .collect()
        };

        tracing::trace!(%owner, %path, count = computations.len(), "cell changed");

        for computation in &computations {
            computation.invalidate();
        }
    }

    /// Whether `computation` read `path` on `owner` during its last run.
    pub fn depends_on(&self, computation: &Computation, owner: ObjectId, path: &Path) -> bool {
        self.inner
            .tracker
            .lock()
            .depends_on(computation.id(), &CellKey::new(owner, path.clone()))
    }

    pub(crate) fn register(&self, computation: &Arc<ComputationInner>) {
        self.inner
            .registry
            .lock()
            .insert(computation.id(), Arc::downgrade(computation));
    }

    pub(crate) fn unregister(&self, id: ComputationId) {
        self.inner.registry.lock().remove(&id);
        self.inner.tracker.lock().clear_dependencies(id);
    }

    /// Release every read record of cells owned by `owner`.
    pub(crate) fn forget_owner(&self, owner: ObjectId) {
        self.inner.tracker.lock().forget_owner(owner);
    }

    /// Number of live computations.
    pub fn computation_count(&self) -> usize {
        self.inner
            .registry
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Run every coalesced update queued since the previous drain.
    ///
    /// Must be called by the host once per frame. Updates queued while
    /// draining wait for the next call. Returns the number of re-runs.
    pub fn drain_pending_updates(&self) -> usize {
        self.inner.scheduler.drain()
    }

    /// Number of coalesced updates waiting for the next drain.
    pub fn pending_updates(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Log and record a recovered error.
    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::Instantiation { type_name, reason } => {
                tracing::error!(type_name = %type_name, reason = %reason, "{diagnostic}");
            }
            Diagnostic::UnboundedUpdateLoop { label, owner, runs } => {
                tracing::error!(label = %label, owner = ?owner, runs, "{diagnostic}");
            }
            Diagnostic::MissingBindingTarget { .. } => {
                tracing::warn!("{diagnostic}");
            }
        }
        self.inner.diagnostics.lock().push(diagnostic);
    }

    /// Recovered errors reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diagnostics.lock().clone()
    }

    /// Recovered errors reported so far, clearing the log.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.diagnostics.lock())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("computations", &self.computation_count())
            .field("pending_updates", &self.pending_updates())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ledger, Cell};
    use crate::scheduler::UpdateMode;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn notify_reaches_readers_only() {
        let rt = Runtime::default();
        let read = Cell::new(&rt, 1);
        let unread = Cell::new(&rt, 1);
        let seen = Arc::new(AtomicI32::new(0));

        let computation = {
            let read = read.clone();
            let seen = seen.clone();
            Computation::new(&rt, "reader", UpdateMode::Immediate, move || {
                seen.store(read.get(), Ordering::SeqCst);
            })
        };
        computation.start();

        unread.set(5);
        assert_eq!(computation.run_count(), 1);

        read.set(9);
        assert_eq!(computation.run_count(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn dependencies_are_replaced_not_merged() {
        let rt = Runtime::default();
        let flag = Cell::new(&rt, true);
        let left = Cell::new(&rt, 0);
        let right = Cell::new(&rt, 0);

        let computation = {
            let (flag, left, right) = (flag.clone(), left.clone(), right.clone());
            Computation::new(&rt, "branch", UpdateMode::Immediate, move || {
                if flag.get() {
                    left.get();
                } else {
                    right.get();
                }
            })
        };
        computation.start();
        assert!(rt.depends_on(&computation, left.key().owner, &left.key().path));

        flag.set(false);
        assert!(!rt.depends_on(&computation, left.key().owner, &left.key().path));
        assert!(rt.depends_on(&computation, right.key().owner, &right.key().path));

        let runs = computation.run_count();
        left.set(1);
        assert_eq!(computation.run_count(), runs);
        right.set(1);
        assert_eq!(computation.run_count(), runs + 1);
    }

    #[test]
    fn ledger_primitives_drive_notification() {
        let rt = Runtime::default();
        let owner = ObjectId::new();
        let name = Path::parse("props.name").unwrap();
        let title = Path::parse("props.title").unwrap();

        let computation = {
            let rt2 = rt.clone();
            let name = name.clone();
            Computation::new(&rt, "props", UpdateMode::Immediate, move || {
                ledger::record_event(&rt2, owner, &name);
            })
        };
        computation.start();

        ledger::record_change(&rt, owner, &title);
        assert_eq!(computation.run_count(), 1);

        ledger::record_change(&rt, owner, &Path::parse("props").unwrap());
        assert_eq!(computation.run_count(), 2);
    }

    #[test]
    fn dropped_computation_unregisters() {
        let rt = Runtime::default();
        let computation = Computation::new(&rt, "temp", UpdateMode::Immediate, || {});
        assert_eq!(rt.computation_count(), 1);
        drop(computation);
        assert_eq!(rt.computation_count(), 0);
    }

    #[test]
    fn diagnostics_can_be_taken() {
        let rt = Runtime::default();
        rt.report(Diagnostic::Instantiation {
            type_name: "Div".into(),
            reason: "not virtual".into(),
        });
        assert_eq!(rt.diagnostics().len(), 1);
        assert_eq!(rt.take_diagnostics().len(), 1);
        assert!(rt.diagnostics().is_empty());
    }
}
