//! Computation Implementation
//!
//! A computation is a re-runnable unit of work (a render function or a
//! watch) whose cell reads are tracked. When one of those cells changes the
//! computation becomes dirty and is handed to the update scheduler, which
//! decides when it actually re-runs.
//!
//! # Run Protocol
//!
//! 1. `run()` clears the dirty flag and executes the body inside a tracking
//!    frame. The dependency set recorded by that frame replaces the previous
//!    one.
//!
//! 2. An invalidation that arrives while the computation is running (it
//!    wrote a cell it had read) is deferred: the computation stays dirty and
//!    `run()` reports it, so the scheduler can decide on another run after
//!    the current one has finished.
//!
//! 3. A held computation only records dirtiness; whoever holds it re-runs it
//!    explicitly (used while the reconciler injects new properties).
//!
//! 4. A disposed computation never runs again and holds no read records.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::id::{ComputationId, ObjectId};
use super::runtime::Runtime;
use crate::instance::Disposable;
use crate::scheduler::UpdateMode;

#[derive(Debug, Default)]
struct RunState {
    dirty: bool,
    running: bool,
    /// Invalidated during the current run.
    deferred: bool,
    /// A coalesced update for this computation sits in the task queue.
    queued: bool,
    held: u32,
    /// Re-runs since the computation last stabilized.
    consecutive: u32,
    runs: u64,
    disposed: bool,
}

pub(crate) struct ComputationInner {
    id: ComputationId,
    label: Arc<str>,
    owner: Option<ObjectId>,
    mode: UpdateMode,
    runtime: Runtime,
    body: Box<dyn Fn() + Send + Sync>,
    state: Mutex<RunState>,
}

impl ComputationInner {
    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }
}

impl Drop for ComputationInner {
    fn drop(&mut self) {
        self.runtime.unregister(self.id);
    }
}

/// Handle to a tracked computation. Clones share the same computation.
#[derive(Clone)]
pub struct Computation {
    inner: Arc<ComputationInner>,
}

impl Computation {
    /// Create a computation. It does not run until [`start`](Self::start).
    pub fn new<F>(runtime: &Runtime, label: impl Into<Arc<str>>, mode: UpdateMode, body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(runtime, None, label.into(), mode, Box::new(body))
    }

    pub(crate) fn owned<F>(
        runtime: &Runtime,
        owner: ObjectId,
        label: impl Into<Arc<str>>,
        mode: UpdateMode,
        body: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(runtime, Some(owner), label.into(), mode, Box::new(body))
    }

    fn build(
        runtime: &Runtime,
        owner: Option<ObjectId>,
        label: Arc<str>,
        mode: UpdateMode,
        body: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        let inner = Arc::new(ComputationInner {
            id: ComputationId::new(),
            label,
            owner,
            mode,
            runtime: runtime.clone(),
            body,
            state: Mutex::new(RunState::default()),
        });
        runtime.register(&inner);
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<ComputationInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ComputationInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Label used in diagnostics, usually the owning type's name.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.inner.owner
    }

    pub fn mode(&self) -> UpdateMode {
        self.inner.mode
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Run for the first time, establishing the initial dependencies.
    ///
    /// A self-invalidation during this run is handed to the scheduler like
    /// any other invalidation.
    pub fn start(&self) {
        if self.run() {
            self.inner.runtime.inner().scheduler.force_update(self);
        }
    }

    /// Execute the body once inside a tracking frame.
    ///
    /// Returns whether the computation was invalidated while it ran.
    pub(crate) fn run(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return false;
            }
            state.running = true;
            state.dirty = false;
            state.deferred = false;
        }

        let guard = RunningGuard(self);
        self.inner.runtime.track(self, || (self.inner.body)());
        drop(guard);

        let mut state = self.inner.state.lock();
        state.runs += 1;
        state.deferred && !state.disposed
    }

    /// Mark dirty in response to a dependency change.
    pub(crate) fn invalidate(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.dirty = true;
            if state.running {
                state.deferred = true;
                return;
            }
            if state.held > 0 {
                return;
            }
        }
        self.inner.runtime.inner().scheduler.force_update(self);
    }

    /// Suspend scheduling until the returned guard is dropped. Invalidations
    /// in the meantime only mark the computation dirty.
    pub(crate) fn hold(&self) -> HoldGuard<'_> {
        self.inner.state.lock().held += 1;
        HoldGuard(self)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Number of completed runs, the initial one included.
    pub fn run_count(&self) -> u64 {
        self.inner.state.lock().runs
    }

    /// Number of distinct cells read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .runtime
            .inner()
            .tracker
            .lock()
            .dependency_count(self.inner.id)
    }

    /// Set the queued flag. Returns false if an update was already queued.
    pub(crate) fn try_enqueue(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.queued || state.disposed {
            return false;
        }
        state.queued = true;
        true
    }

    /// Clear the queued flag; returns whether the queued update should run.
    pub(crate) fn take_queued(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.queued = false;
        state.dirty && !state.disposed
    }

    /// Count one more consecutive re-run, or return the count if the limit
    /// has been reached.
    pub(crate) fn begin_rerun(&self, limit: u32) -> Result<(), u32> {
        let mut state = self.inner.state.lock();
        if state.consecutive >= limit {
            return Err(state.consecutive);
        }
        state.consecutive += 1;
        Ok(())
    }

    pub(crate) fn reset_consecutive(&self) {
        self.inner.state.lock().consecutive = 0;
    }

    /// Give up on stabilizing: keep the last result and stop the cycle.
    pub(crate) fn freeze(&self) {
        let mut state = self.inner.state.lock();
        state.dirty = false;
        state.deferred = false;
        state.consecutive = 0;
    }
}

impl Disposable for Computation {
    fn dispose(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.dirty = false;
        }
        self.inner.runtime.unregister(self.inner.id);
    }

    fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Computation {}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("mode", &self.inner.mode)
            .field("dirty", &state.dirty)
            .field("runs", &state.runs)
            .field("disposed", &state.disposed)
            .finish()
    }
}

struct RunningGuard<'a>(&'a Computation);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.state.lock().running = false;
    }
}

pub(crate) struct HoldGuard<'a>(&'a Computation);

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.inner.state.lock();
        state.held = state.held.saturating_sub(1);
    }
}
