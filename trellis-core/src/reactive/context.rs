//! Tracking Context
//!
//! A guard over one frame of the runtime's active-computation stack. While
//! the guard lives, reads are attributed to its computation (or dropped,
//! for an untracked frame). Dropping the guard pops the frame, so the stack
//! stays balanced even if the tracked code panics.

use indexmap::IndexSet;

use super::id::ComputationId;
use super::ledger::CellKey;
use super::runtime::RuntimeInner;

pub(crate) struct TrackingContext<'a> {
    runtime: &'a RuntimeInner,
    computation: Option<ComputationId>,
    popped: bool,
}

impl<'a> TrackingContext<'a> {
    /// Enter a frame for `computation`, or an untracked frame for `None`.
    pub(crate) fn enter(runtime: &'a RuntimeInner, computation: Option<ComputationId>) -> Self {
        runtime.tracker.lock().push(computation);
        Self {
            runtime,
            computation,
            popped: false,
        }
    }

    /// Leave the frame and return the cells read inside it.
    pub(crate) fn finish(mut self) -> IndexSet<CellKey> {
        self.popped = true;
        self.runtime.tracker.lock().pop(self.computation)
    }
}

impl Drop for TrackingContext<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.runtime.tracker.lock().pop(self.computation);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::reactive::{Cell, Runtime};

    #[test]
    fn untracked_region_hides_reads() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 1);

        let value = rt.untracked(|| cell.get());

        assert_eq!(value, 1);
        assert!(!rt.is_tracking());
    }

    #[test]
    fn frame_is_popped_after_panic() {
        let rt = Runtime::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.untracked(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(rt.inner().tracker.lock().current(), None);
    }
}
