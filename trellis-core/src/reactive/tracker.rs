//! Dependency Tracker
//!
//! The tracker records which cells each computation read during its last
//! run, and answers the reverse question when a cell is written: which
//! computations must be dirtied?
//!
//! # Structure
//!
//! - An explicit stack of active frames. Only the top frame collects reads;
//!   a frame pushed for untracked work has no computation and swallows them.
//! - A forward index `computation -> cells read` used to replace a
//!   computation's dependency set wholesale after every run.
//! - A reverse index `owner -> path -> readers` used by notification.
//!
//! Dependency sets are replaced, never merged, so a computation that stops
//! reading a cell on a branch change stops being notified for it.

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::id::{ComputationId, ObjectId};
use super::ledger::{CellKey, Path};

type Readers = SmallVec<[ComputationId; 4]>;

/// An entry on the active-computation stack.
#[derive(Debug)]
struct Frame {
    computation: Option<ComputationId>,
    /// Cells read so far in this run, each recorded once.
    reads: IndexSet<CellKey>,
}

#[derive(Debug, Default)]
pub(crate) struct Tracker {
    stack: Vec<Frame>,
    dependencies: HashMap<ComputationId, IndexSet<CellKey>>,
    readers: HashMap<ObjectId, HashMap<Path, Readers>>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push a frame. `None` starts an untracked region.
    pub(crate) fn push(&mut self, computation: Option<ComputationId>) {
        self.stack.push(Frame {
            computation,
            reads: IndexSet::new(),
        });
    }

    /// Pop the top frame and return the reads it collected.
    pub(crate) fn pop(&mut self, computation: Option<ComputationId>) -> IndexSet<CellKey> {
        match self.stack.pop() {
            Some(frame) => {
                debug_assert_eq!(
                    frame.computation, computation,
                    "tracking frame mismatch: expected {:?}, got {:?}",
                    computation, frame.computation
                );
                frame.reads
            }
            None => IndexSet::new(),
        }
    }

    /// The computation currently collecting reads, if any.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.stack.last().and_then(|frame| frame.computation)
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.current().is_some()
    }

    /// Record a read in the top frame. No-op outside a tracked frame.
    pub(crate) fn record_read(&mut self, key: CellKey) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.computation.is_some() {
                frame.reads.insert(key);
            }
        }
    }

    /// Replace a computation's dependency set with `reads`.
    pub(crate) fn replace_dependencies(&mut self, id: ComputationId, reads: IndexSet<CellKey>) {
        self.clear_dependencies(id);
        for key in &reads {
            let readers = self
                .readers
                .entry(key.owner)
                .or_default()
                .entry(key.path.clone())
                .or_default();
            if !readers.contains(&id) {
                readers.push(id);
            }
        }
        self.dependencies.insert(id, reads);
    }

    /// Remove every read record of a computation.
    pub(crate) fn clear_dependencies(&mut self, id: ComputationId) {
        let Some(previous) = self.dependencies.remove(&id) else {
            return;
        };
        for key in previous {
            if let Some(paths) = self.readers.get_mut(&key.owner) {
                if let Some(readers) = paths.get_mut(&key.path) {
                    readers.retain(|reader| *reader != id);
                    if readers.is_empty() {
                        paths.remove(&key.path);
                    }
                }
                if paths.is_empty() {
                    self.readers.remove(&key.owner);
                }
            }
        }
    }

    /// Drop every read record pointing at cells owned by `owner`.
    pub(crate) fn forget_owner(&mut self, owner: ObjectId) {
        let Some(paths) = self.readers.remove(&owner) else {
            return;
        };
        for (path, readers) in paths {
            let key = CellKey::new(owner, path);
            for reader in readers {
                if let Some(deps) = self.dependencies.get_mut(&reader) {
                    deps.shift_remove(&key);
                }
            }
        }
    }

    /// Computations affected by a write of `path` on `owner`.
    ///
    /// Includes readers from completed runs as well as computations on the
    /// active stack that read a related cell earlier in their current run.
    pub(crate) fn affected(&self, owner: ObjectId, path: &Path) -> IndexSet<ComputationId> {
        let mut affected = IndexSet::new();

        if let Some(paths) = self.readers.get(&owner) {
            for (read_path, readers) in paths {
                if read_path.is_related(path) {
                    affected.extend(readers.iter().copied());
                }
            }
        }

        for frame in &self.stack {
            let Some(id) = frame.computation else {
                continue;
            };
            let touched = frame
                .reads
                .iter()
                .any(|key| key.owner == owner && key.path.is_related(path));
            if touched {
                affected.insert(id);
            }
        }

        affected
    }

    pub(crate) fn dependency_count(&self, id: ComputationId) -> usize {
        self.dependencies.get(&id).map_or(0, IndexSet::len)
    }

    pub(crate) fn depends_on(&self, id: ComputationId, key: &CellKey) -> bool {
        self.dependencies
            .get(&id)
            .is_some_and(|deps| deps.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(owner: ObjectId, path: &str) -> CellKey {
        CellKey::new(owner, Path::parse(path).unwrap())
    }

    #[test]
    fn reads_are_recorded_once_per_run() {
        let mut tracker = Tracker::new();
        let id = ComputationId::new();
        let owner = ObjectId::new();

        tracker.push(Some(id));
        tracker.record_read(key(owner, "name"));
        tracker.record_read(key(owner, "name"));
        tracker.record_read(key(owner, "age"));
        let reads = tracker.pop(Some(id));

        assert_eq!(reads.len(), 2);
    }

    #[test]
    fn reads_outside_tracking_are_ignored() {
        let mut tracker = Tracker::new();
        let owner = ObjectId::new();

        tracker.record_read(key(owner, "name"));
        tracker.push(None);
        tracker.record_read(key(owner, "name"));
        let reads = tracker.pop(None);

        assert!(reads.is_empty());
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn nested_frames_collect_separately() {
        let mut tracker = Tracker::new();
        let outer = ComputationId::new();
        let inner = ComputationId::new();
        let owner = ObjectId::new();

        tracker.push(Some(outer));
        tracker.record_read(key(owner, "a"));
        tracker.push(Some(inner));
        assert_eq!(tracker.current(), Some(inner));
        tracker.record_read(key(owner, "b"));
        let inner_reads = tracker.pop(Some(inner));
        assert_eq!(tracker.current(), Some(outer));
        let outer_reads = tracker.pop(Some(outer));

        assert!(inner_reads.contains(&key(owner, "b")));
        assert!(!inner_reads.contains(&key(owner, "a")));
        assert!(outer_reads.contains(&key(owner, "a")));
        assert!(!outer_reads.contains(&key(owner, "b")));
    }

    #[test]
    fn replacing_dependencies_drops_stale_readers() {
        let mut tracker = Tracker::new();
        let id = ComputationId::new();
        let owner = ObjectId::new();
        let first = Path::parse("first").unwrap();
        let second = Path::parse("second").unwrap();

        tracker.replace_dependencies(id, [key(owner, "first")].into_iter().collect());
        assert!(tracker.affected(owner, &first).contains(&id));

        tracker.replace_dependencies(id, [key(owner, "second")].into_iter().collect());
        assert!(!tracker.affected(owner, &first).contains(&id));
        assert!(tracker.affected(owner, &second).contains(&id));
        assert_eq!(tracker.dependency_count(id), 1);
    }

    #[test]
    fn bag_change_reaches_every_sub_field_reader() {
        let mut tracker = Tracker::new();
        let name_reader = ComputationId::new();
        let title_reader = ComputationId::new();
        let owner = ObjectId::new();

        tracker.replace_dependencies(name_reader, [key(owner, "props.name")].into_iter().collect());
        tracker.replace_dependencies(title_reader, [key(owner, "props.title")].into_iter().collect());

        let by_name = tracker.affected(owner, &Path::parse("props.name").unwrap());
        assert!(by_name.contains(&name_reader));
        assert!(!by_name.contains(&title_reader));

        let by_bag = tracker.affected(owner, &Path::parse("props").unwrap());
        assert!(by_bag.contains(&name_reader));
        assert!(by_bag.contains(&title_reader));
    }

    #[test]
    fn active_frame_reads_count_as_affected() {
        let mut tracker = Tracker::new();
        let id = ComputationId::new();
        let owner = ObjectId::new();

        tracker.push(Some(id));
        tracker.record_read(key(owner, "count"));
        let affected = tracker.affected(owner, &Path::parse("count").unwrap());
        tracker.pop(Some(id));

        assert!(affected.contains(&id));
    }

    #[test]
    fn forgetting_an_owner_clears_its_readers() {
        let mut tracker = Tracker::new();
        let id = ComputationId::new();
        let owner = ObjectId::new();
        let other = ObjectId::new();

        tracker.replace_dependencies(
            id,
            [key(owner, "a"), key(other, "b")].into_iter().collect(),
        );
        tracker.forget_owner(owner);

        assert!(tracker.affected(owner, &Path::parse("a").unwrap()).is_empty());
        assert!(tracker.depends_on(id, &key(other, "b")));
        assert_eq!(tracker.dependency_count(id), 1);
    }
}
