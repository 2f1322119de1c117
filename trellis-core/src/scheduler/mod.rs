//! Update Scheduler
//!
//! The scheduler decides when a dirty computation actually re-runs.
//!
//! # Modes
//!
//! - [`UpdateMode::Throttled`] (default): the first invalidation in a frame
//!   re-runs synchronously, so user-visible state such as a text cursor
//!   stays accurate. Further invalidations in the same frame are coalesced
//!   into one queued update that runs when the host drains the queue.
//! - [`UpdateMode::Immediate`]: every invalidation re-runs synchronously.
//!
//! A frame ends at the next call to [`Runtime::drain_pending_updates`]. The
//! scheduler never sets timers of its own.
//!
//! # Loop Guard
//!
//! A computation whose runs keep invalidating it again is re-run at most
//! `loop_limit` consecutive times before the host regains control. Past
//! that, the scheduler reports [`Diagnostic::UnboundedUpdateLoop`] once,
//! keeps the last result, and stops the cycle. The computation stays live
//! and reacts to later changes normally.
//!
//! [`Runtime::drain_pending_updates`]: crate::Runtime::drain_pending_updates
//! [`Diagnostic::UnboundedUpdateLoop`]: crate::Diagnostic::UnboundedUpdateLoop

mod queue;

use parking_lot::Mutex;

use crate::error::Diagnostic;
use crate::instance::Disposable;
use crate::reactive::Computation;
use queue::TaskQueue;

/// When a computation re-runs after one of its dependencies changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Re-run on the first invalidation of a frame, coalesce the rest.
    #[default]
    Throttled,
    /// Re-run on every invalidation.
    Immediate,
}

impl UpdateMode {
    /// Map a type's `throttle_updates` flag to a mode.
    pub fn from_throttle(throttle_updates: bool) -> Self {
        if throttle_updates {
            Self::Throttled
        } else {
            Self::Immediate
        }
    }
}

pub(crate) struct UpdateScheduler {
    queue: Mutex<TaskQueue>,
    loop_limit: u32,
}

impl UpdateScheduler {
    pub(crate) fn new(loop_limit: u32) -> Self {
        Self {
            queue: Mutex::new(TaskQueue::default()),
            loop_limit,
        }
    }

    /// React to an invalidation of `computation`.
    pub(crate) fn force_update(&self, computation: &Computation) {
        match computation.mode() {
            UpdateMode::Immediate => {
                self.run_until_stable(computation);
            }
            UpdateMode::Throttled => {
                if computation.try_enqueue() {
                    self.queue.lock().push(computation.downgrade());
                    self.run_until_stable(computation);
                } else {
                    tracing::trace!(label = computation.label(), "update coalesced");
                }
            }
        }
    }

    /// Re-run `computation` until it stops invalidating itself, its update
    /// is coalesced into the queue, or the loop guard trips.
    ///
    /// Returns the number of runs performed.
    pub(crate) fn run_until_stable(&self, computation: &Computation) -> usize {
        let mut runs = 0;
        loop {
            if computation.is_disposed() {
                return runs;
            }
            if let Err(consecutive) = computation.begin_rerun(self.loop_limit) {
                computation.freeze();
                computation.runtime().report(Diagnostic::UnboundedUpdateLoop {
                    label: computation.label().to_string(),
                    owner: computation.owner(),
                    runs: consecutive,
                });
                return runs;
            }

            runs += 1;
            if !computation.run() {
                computation.reset_consecutive();
                return runs;
            }

            match computation.mode() {
                UpdateMode::Immediate => {}
                UpdateMode::Throttled => {
                    if computation.try_enqueue() {
                        self.queue.lock().push(computation.downgrade());
                    } else {
                        return runs;
                    }
                }
            }
        }
    }

    /// Run the coalesced updates queued before this call.
    pub(crate) fn drain(&self) -> usize {
        let tasks = self.queue.lock().take();
        let queued = tasks.len();
        let mut runs = 0;
        let mut ran = Vec::new();

        for task in tasks {
            let Some(inner) = task.upgrade() else {
                continue;
            };
            let computation = Computation::from_inner(inner);
            if !computation.take_queued() {
                continue;
            }
            runs += self.run_until_stable(&computation);
            ran.push(computation);
        }

        // The host regains control here.
        for computation in &ran {
            computation.reset_consecutive();
        }

        tracing::debug!(queued, runs, "drained pending updates");
        runs
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Cell, Runtime};
    use crate::RuntimeConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn reader(rt: &Runtime, mode: UpdateMode, cell: &Cell<i32>) -> (Computation, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let (cell, runs_clone) = (cell.clone(), runs.clone());
        let computation = Computation::new(rt, "reader", mode, move || {
            cell.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        computation.start();
        (computation, runs)
    }

    #[test]
    fn throttled_first_invalidation_runs_synchronously() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let (_computation, runs) = reader(&rt, UpdateMode::Throttled, &cell);

        cell.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(rt.pending_updates(), 1);

        // Nothing changed since: the queued update has nothing to do.
        assert_eq!(rt.drain_pending_updates(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn throttled_coalesces_within_a_frame() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let (_computation, runs) = reader(&rt, UpdateMode::Throttled, &cell);

        cell.set(1);
        cell.set(2);
        cell.set(3);
        cell.set(4);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert_eq!(rt.drain_pending_updates(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(rt.pending_updates(), 0);

        // New frame: the first invalidation is synchronous again.
        cell.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn immediate_never_queues() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let (_computation, runs) = reader(&rt, UpdateMode::Immediate, &cell);

        cell.set(1);
        cell.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(rt.pending_updates(), 0);
    }

    #[test]
    fn drain_skips_disposed_computations() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let (computation, runs) = reader(&rt, UpdateMode::Throttled, &cell);

        cell.set(1);
        cell.set(2);
        computation.dispose();

        assert_eq!(rt.drain_pending_updates(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn self_invalidating_immediate_computation_trips_the_guard() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let runs = Arc::new(AtomicU32::new(0));
        let computation = {
            let (cell, runs) = (cell.clone(), runs.clone());
            Computation::new(&rt, "Runaway", UpdateMode::Immediate, move || {
                runs.fetch_add(1, Ordering::SeqCst);
                let value = cell.get();
                cell.set(value + 1);
            })
        };

        computation.start();

        // One initial run plus exactly fifty re-runs.
        assert_eq!(runs.load(Ordering::SeqCst), 51);
        assert_eq!(
            rt.diagnostics(),
            vec![Diagnostic::UnboundedUpdateLoop {
                label: "Runaway".into(),
                owner: None,
                runs: 50,
            }]
        );
        assert!(!computation.is_dirty());
        assert!(!computation.is_disposed());
    }

    #[test]
    fn loop_limit_is_configurable() {
        let rt = Runtime::new(RuntimeConfig {
            loop_limit: 3,
            ..RuntimeConfig::default()
        });
        let cell = Cell::new(&rt, 0);
        let computation = {
            let cell = cell.clone();
            Computation::new(&rt, "Runaway", UpdateMode::Immediate, move || {
                let value = cell.get();
                cell.set(value + 1);
            })
        };

        computation.start();
        assert_eq!(computation.run_count(), 4);
        assert_eq!(rt.diagnostics().len(), 1);
    }

    #[test]
    fn throttled_self_invalidation_runs_twice_per_frame() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        let computation = {
            let cell = cell.clone();
            Computation::new(&rt, "Busy", UpdateMode::Throttled, move || {
                let value = cell.get();
                cell.set(value + 1);
            })
        };

        computation.start();
        // Initial run, then the synchronous first update of the frame.
        assert_eq!(computation.run_count(), 2);

        assert_eq!(rt.drain_pending_updates(), 2);
        assert_eq!(computation.run_count(), 4);
        assert!(rt.diagnostics().is_empty());
    }
}
