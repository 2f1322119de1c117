//! Task Queue
//!
//! Ordered queue of coalesced updates, drained once per host frame. Entries
//! are weak so a queued update never keeps a disposed instance alive; the
//! drain checks liveness and disposal before running anything.

use std::collections::VecDeque;
use std::sync::Weak;

use crate::reactive::ComputationInner;

#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Weak<ComputationInner>>,
}

impl TaskQueue {
    pub(crate) fn push(&mut self, task: Weak<ComputationInner>) {
        self.tasks.push_back(task);
    }

    /// Take every queued task, leaving the queue empty for the next frame.
    pub(crate) fn take(&mut self) -> VecDeque<Weak<ComputationInner>> {
        std::mem::take(&mut self.tasks)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Computation, Runtime};
    use crate::scheduler::UpdateMode;

    #[test]
    fn take_empties_the_queue_in_order() {
        let rt = Runtime::default();
        let a = Computation::new(&rt, "a", UpdateMode::Throttled, || {});
        let b = Computation::new(&rt, "b", UpdateMode::Throttled, || {});

        let mut queue = TaskQueue::default();
        queue.push(a.downgrade());
        queue.push(b.downgrade());
        assert_eq!(queue.len(), 2);

        let tasks: Vec<_> = queue.take().into_iter().collect();
        assert_eq!(queue.len(), 0);
        let first = Computation::from_inner(tasks[0].upgrade().unwrap());
        assert_eq!(first, a);
    }

    #[test]
    fn entries_do_not_keep_computations_alive() {
        let rt = Runtime::default();
        let a = Computation::new(&rt, "a", UpdateMode::Throttled, || {});

        let mut queue = TaskQueue::default();
        queue.push(a.downgrade());
        drop(a);

        assert!(queue.take().pop_front().unwrap().upgrade().is_none());
    }
}
